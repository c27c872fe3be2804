//! Manual sort orders, applied one item at a time.
//!
//! A batch is not atomic: each item succeeds or fails on its own and the
//! caller gets one [`SortOutcome`] per item, in input order.

use omate_core::{Classify as _, content::ContentType, repository::ContentRepository};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortItem {
  pub id:         i64,
  pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortOutcome {
  pub id:         i64,
  pub success:    bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sort_order: Option<i32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error:      Option<String>,
}

impl SortOutcome {
  fn applied(id: i64, sort_order: Option<i32>) -> Self {
    Self { id, success: true, sort_order, error: None }
  }

  fn failed(id: i64, error: impl Into<String>) -> Self {
    Self { id, success: false, sort_order: None, error: Some(error.into()) }
  }
}

pub struct SortOrderMaintainer<'r, R> {
  repo: &'r R,
}

impl<'r, R: ContentRepository> SortOrderMaintainer<'r, R> {
  pub fn new(repo: &'r R) -> Self { Self { repo } }

  pub async fn apply_order(&self, items: &[SortItem]) -> Vec<SortOutcome> {
    let mut outcomes = Vec::with_capacity(items.len());
    for item in items {
      let outcome = match self.repo.set_sort_order(item.id, item.sort_order).await {
        Ok(Some(content)) => SortOutcome::applied(content.id, content.sort_order),
        Ok(None) => SortOutcome::failed(item.id, "content not found"),
        Err(e) => {
          tracing::warn!(id = item.id, error = %e, "failed to set sort order");
          SortOutcome::failed(item.id, e.kind().as_str())
        }
      };
      outcomes.push(outcome);
    }
    let applied = outcomes.iter().filter(|o| o.success).count();
    tracing::info!(requested = items.len(), applied, "applied sort orders");
    outcomes
  }

  /// Return every item of `content_type` to the default recency order.
  pub async fn reset(&self, content_type: ContentType) -> Result<u64> {
    self
      .repo
      .reset_sort_order(content_type)
      .await
      .map_err(Error::repository)
  }
}
