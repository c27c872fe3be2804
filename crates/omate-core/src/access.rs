//! Access-log records: the append-only audit trail of content reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted access-log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLog {
  pub id:          i64,
  pub content_id:  i64,
  /// Free-form tag, e.g. `"view"` or `"download"`.
  pub access_type: String,
  pub ip_address:  Option<String>,
  pub user_agent:  Option<String>,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::repository::ContentRepository::log_access`].
#[derive(Debug, Clone)]
pub struct NewAccessLog {
  pub content_id:  i64,
  pub access_type: String,
  pub ip_address:  Option<String>,
  pub user_agent:  Option<String>,
}

impl NewAccessLog {
  pub fn new(content_id: i64, access_type: impl Into<String>) -> Self {
    Self {
      content_id,
      access_type: access_type.into(),
      ip_address: None,
      user_agent: None,
    }
  }

  pub fn view(content_id: i64) -> Self { Self::new(content_id, "view") }
}
