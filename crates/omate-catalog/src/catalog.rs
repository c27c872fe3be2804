//! [`Catalog`]: the content workflows the HTTP layer calls.
//!
//! Ordering rules between the repository and the object store:
//!
//! - publishing uploads first and deletes the fresh objects again if the
//!   row cannot be written;
//! - removal deletes the row first and only then its objects, so a failure
//!   leaves an orphaned object rather than a row pointing at nothing.

use omate_blob::{ObjectBackend, ObjectStore, UploadRequest};
use omate_core::{
  access::NewAccessLog,
  content::{Content, ContentPatch, ContentType, NewContent},
  metadata::ContentMetadata,
  repository::ContentRepository,
};

use crate::{
  Error, Result,
  feed::{Feed, format_cards},
  ordering::{SortItem, SortOrderMaintainer, SortOutcome},
  relations::RelationResolver,
};

/// A file to publish together with the record describing it.
#[derive(Debug, Clone)]
pub struct NewUpload {
  pub name:          String,
  pub description:   Option<String>,
  pub content_type:  ContentType,
  pub bytes:         Vec<u8>,
  /// Client-side file name; its extension is kept for untyped payloads.
  pub original_name: Option<String>,
  pub metadata:      Option<ContentMetadata>,
  pub tags:          Vec<String>,
}

impl NewUpload {
  pub fn new(name: impl Into<String>, content_type: ContentType, bytes: Vec<u8>) -> Self {
    Self {
      name: name.into(),
      description: None,
      content_type,
      bytes,
      original_name: None,
      metadata: None,
      tags: Vec::new(),
    }
  }
}

pub struct Catalog<R, B> {
  repo:  R,
  store: ObjectStore<B>,
}

impl<R, B> Catalog<R, B>
where
  R: ContentRepository,
  B: ObjectBackend,
{
  pub fn new(repo: R, store: ObjectStore<B>) -> Self { Self { repo, store } }

  pub fn repository(&self) -> &R { &self.repo }

  pub fn store(&self) -> &ObjectStore<B> { &self.store }

  /// Connect the repository and bring its schema up to date.
  pub async fn init(&self) -> Result<()> {
    self.repo.connect().await.map_err(Error::repository)?;
    self.repo.ensure_schema().await.map_err(Error::repository)
  }

  // ── Content ───────────────────────────────────────────────────────────────

  /// Store the payload (and its thumbnail) and create the record for it.
  pub async fn publish(&self, upload: NewUpload) -> Result<Content> {
    let stored = self
      .store
      .upload(UploadRequest {
        bytes:          upload.bytes,
        content_type:   upload.content_type,
        original_name:  upload.original_name,
        suggested_name: None,
      })
      .await?;

    let input = NewContent {
      name:          upload.name,
      description:   upload.description,
      content_type:  upload.content_type,
      blob_url:      stored.url.clone(),
      thumbnail_url: stored.thumbnail_url.clone(),
      metadata:      upload.metadata,
      tags:          upload.tags,
    };
    match self.repo.create(input).await {
      Ok(content) => {
        tracing::info!(id = content.id, content_type = %content.content_type, "published content");
        Ok(content)
      }
      Err(e) => {
        tracing::warn!(url = %stored.url, error = %e, "record insert failed; removing uploaded objects");
        self.store.delete(&stored.url).await;
        if let Some(thumb) = stored.thumbnail_url.as_deref().filter(|t| *t != stored.url) {
          self.store.delete(thumb).await;
        }
        Err(Error::repository(e))
      }
    }
  }

  pub async fn get(&self, id: i64) -> Result<Content> {
    self
      .repo
      .get(id)
      .await
      .map_err(Error::repository)?
      .ok_or(Error::NotFound(id))
  }

  pub async fn list(&self, content_type: Option<ContentType>) -> Result<Vec<Content>> {
    self.repo.list(content_type).await.map_err(Error::repository)
  }

  pub async fn edit(&self, id: i64, patch: ContentPatch) -> Result<Content> {
    self
      .repo
      .update(id, patch)
      .await
      .map_err(Error::repository)?
      .ok_or(Error::NotFound(id))
  }

  /// Delete the record, then every object it owned. Object failures are
  /// logged by the store and do not fail the call.
  pub async fn remove(&self, id: i64) -> Result<Content> {
    let content = self
      .repo
      .delete(id)
      .await
      .map_err(Error::repository)?
      .ok_or(Error::NotFound(id))?;

    let mut removed = 0;
    for url in content.owned_urls() {
      if self.store.delete(url).await {
        removed += 1;
      }
    }
    tracing::info!(id, objects = removed, "removed content");
    Ok(content)
  }

  // ── Feed ──────────────────────────────────────────────────────────────────

  /// Every character card with its relations, shaped for clients.
  pub async fn feed(&self) -> Result<Feed> {
    let cards = self
      .repo
      .list(Some(ContentType::CharacterCard))
      .await
      .map_err(Error::repository)?;
    let resolved = RelationResolver::new(&self.repo).resolve_cards(cards).await;
    Ok(Feed { cards: format_cards(resolved.cards) })
  }

  // ── Access log ────────────────────────────────────────────────────────────

  /// Record a view. Best effort: failures are logged and swallowed.
  pub async fn record_view(
    &self,
    content_id: i64,
    ip_address: Option<String>,
    user_agent: Option<String>,
  ) {
    let entry = NewAccessLog { ip_address, user_agent, ..NewAccessLog::view(content_id) };
    if let Err(e) = self.repo.log_access(entry).await {
      tracing::warn!(content_id, error = %e, "failed to record access");
    }
  }

  // ── Ordering ──────────────────────────────────────────────────────────────

  pub async fn reorder(&self, items: &[SortItem]) -> Vec<SortOutcome> {
    SortOrderMaintainer::new(&self.repo).apply_order(items).await
  }

  pub async fn reset_order(&self, content_type: ContentType) -> Result<u64> {
    SortOrderMaintainer::new(&self.repo).reset(content_type).await
  }
}
