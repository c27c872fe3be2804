//! The `ContentRepository` trait.
//!
//! The trait is implemented by storage backends (`omate-store-sqlite`,
//! `omate-store-postgres`). The catalog layer and the CLI depend on this
//! abstraction, never on a concrete backend.
//!
//! Every backend must agree on: null ordering in [`ContentRepository::list`],
//! access-log cleanup on delete, and idempotent schema bootstrap. The shared
//! conformance suite in `omate-test-utils` checks exactly that.

use std::future::Future;

use crate::{
  Classify,
  access::{AccessLog, NewAccessLog},
  content::{Content, ContentPatch, ContentType, NewContent},
  settings::{SiteSettings, SiteSettingsPatch},
};

/// The schema version this code creates and understands.
pub const SCHEMA_VERSION: u32 = 1;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a content store backend.
///
/// A fresh instance is inert: every data method fails with
/// [`ErrorKind::NotInitialized`](crate::ErrorKind::NotInitialized) until
/// [`connect`](Self::connect) and [`ensure_schema`](Self::ensure_schema) have
/// both succeeded.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait ContentRepository: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Lifecycle ─────────────────────────────────────────────────────────

  /// Acquire the underlying connection. Calling it again is a no-op.
  fn connect(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Release the connection. Safe on an already-disconnected instance.
  fn disconnect(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Create every table, constraint, index and the default settings row if
  /// they are missing, then record [`SCHEMA_VERSION`]. Repeated and
  /// concurrent calls are safe. This is the only migration step; it runs at
  /// startup, never on a request path.
  fn ensure_schema(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The schema version recorded in the database, `None` if it was never
  /// bootstrapped. Requires `connect()` only.
  fn schema_version(
    &self,
  ) -> impl Future<Output = Result<Option<u32>, Self::Error>> + Send + '_;

  // ── Content ───────────────────────────────────────────────────────────

  /// All content, optionally of one type, ordered by `sort_order` ascending
  /// (unordered last), then `updated_at` descending, then `id` descending.
  fn list(
    &self,
    content_type: Option<ContentType>,
  ) -> impl Future<Output = Result<Vec<Content>, Self::Error>> + Send + '_;

  fn get(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Content>, Self::Error>> + Send + '_;

  /// Fetch many records in one round trip. Ids that are not integers or do
  /// not exist are skipped; the result order is unspecified.
  fn get_many<'a>(
    &'a self,
    ids: &'a [String],
  ) -> impl Future<Output = Result<Vec<Content>, Self::Error>> + Send + 'a;

  /// Insert a record. Assigns the id, external id and both timestamps;
  /// `description` defaults to empty, `tags` to an empty list.
  fn create(
    &self,
    input: NewContent,
  ) -> impl Future<Output = Result<Content, Self::Error>> + Send + '_;

  /// Apply the supplied fields, refresh `updated_at`, and return the row as
  /// re-read from storage. `None` if `id` does not exist.
  fn update(
    &self,
    id: i64,
    patch: ContentPatch,
  ) -> impl Future<Output = Result<Option<Content>, Self::Error>> + Send + '_;

  /// Delete the record and its access-log rows. Returns the record as it was
  /// before deletion so the caller can clean up its blobs.
  fn delete(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Content>, Self::Error>> + Send + '_;

  fn set_sort_order(
    &self,
    id: i64,
    sort_order: i32,
  ) -> impl Future<Output = Result<Option<Content>, Self::Error>> + Send + '_;

  /// Clear `sort_order` on every record of `content_type`. Returns the
  /// number of rows touched.
  fn reset_sort_order(
    &self,
    content_type: ContentType,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Access log ────────────────────────────────────────────────────────

  /// Append an access-log row. Returns `Ok(None)` without touching storage
  /// when access logging is disabled for this repository.
  fn log_access(
    &self,
    entry: NewAccessLog,
  ) -> impl Future<Output = Result<Option<i64>, Self::Error>> + Send + '_;

  /// Access-log rows for one content id, oldest first.
  fn access_logs(
    &self,
    content_id: i64,
  ) -> impl Future<Output = Result<Vec<AccessLog>, Self::Error>> + Send + '_;

  // ── Site settings ─────────────────────────────────────────────────────

  fn site_settings(
    &self,
  ) -> impl Future<Output = Result<SiteSettings, Self::Error>> + Send + '_;

  fn update_site_settings(
    &self,
    patch: SiteSettingsPatch,
  ) -> impl Future<Output = Result<SiteSettings, Self::Error>> + Send + '_;
}

// ─── Helpers shared by backends ──────────────────────────────────────────────

/// Turn caller-supplied id strings into distinct numeric ids, keeping first
/// occurrence order. Anything that is not an integer is dropped.
pub fn parse_ids(ids: &[String]) -> Vec<i64> {
  let mut out: Vec<i64> = Vec::with_capacity(ids.len());
  for raw in ids {
    match raw.trim().parse::<i64>() {
      Ok(id) if !out.contains(&id) => out.push(id),
      Ok(_) => {}
      Err(_) => tracing::debug!(id = %raw, "skipping non-numeric content id"),
    }
  }
  out
}
