//! A [`ContentRepository`] wrapper that counts calls per method.

use std::{
  collections::BTreeMap,
  sync::{Arc, Mutex},
};

use omate_core::{
  access::{AccessLog, NewAccessLog},
  content::{Content, ContentPatch, ContentType, NewContent},
  repository::ContentRepository,
  settings::{SiteSettings, SiteSettingsPatch},
};

/// Delegates every call to `inner` and remembers how often each method was
/// invoked. Lets tests pin round-trip budgets, e.g. "relation resolution is
/// two queries however many cards there are".
pub struct CountingRepository<R> {
  inner: R,
  calls: Arc<Mutex<BTreeMap<&'static str, usize>>>,
}

impl<R> CountingRepository<R> {
  pub fn new(inner: R) -> Self { Self { inner, calls: Arc::default() } }

  pub fn inner(&self) -> &R { &self.inner }

  fn hit(&self, method: &'static str) {
    let mut calls = self.calls.lock().unwrap_or_else(|p| p.into_inner());
    *calls.entry(method).or_default() += 1;
  }

  /// Calls to `method` since the last [`reset`](Self::reset).
  pub fn count(&self, method: &str) -> usize {
    let calls = self.calls.lock().unwrap_or_else(|p| p.into_inner());
    calls.get(method).copied().unwrap_or(0)
  }

  /// Calls to any method since the last [`reset`](Self::reset).
  pub fn total(&self) -> usize {
    let calls = self.calls.lock().unwrap_or_else(|p| p.into_inner());
    calls.values().sum()
  }

  pub fn reset(&self) { self.calls.lock().unwrap_or_else(|p| p.into_inner()).clear(); }
}

impl<R: ContentRepository> ContentRepository for CountingRepository<R> {
  type Error = R::Error;

  async fn connect(&self) -> Result<(), R::Error> {
    self.hit("connect");
    self.inner.connect().await
  }

  async fn disconnect(&self) -> Result<(), R::Error> {
    self.hit("disconnect");
    self.inner.disconnect().await
  }

  async fn ensure_schema(&self) -> Result<(), R::Error> {
    self.hit("ensure_schema");
    self.inner.ensure_schema().await
  }

  async fn schema_version(&self) -> Result<Option<u32>, R::Error> {
    self.hit("schema_version");
    self.inner.schema_version().await
  }

  async fn list(&self, content_type: Option<ContentType>) -> Result<Vec<Content>, R::Error> {
    self.hit("list");
    self.inner.list(content_type).await
  }

  async fn get(&self, id: i64) -> Result<Option<Content>, R::Error> {
    self.hit("get");
    self.inner.get(id).await
  }

  async fn get_many<'a>(&'a self, ids: &'a [String]) -> Result<Vec<Content>, R::Error> {
    self.hit("get_many");
    self.inner.get_many(ids).await
  }

  async fn create(&self, input: NewContent) -> Result<Content, R::Error> {
    self.hit("create");
    self.inner.create(input).await
  }

  async fn update(&self, id: i64, patch: ContentPatch) -> Result<Option<Content>, R::Error> {
    self.hit("update");
    self.inner.update(id, patch).await
  }

  async fn delete(&self, id: i64) -> Result<Option<Content>, R::Error> {
    self.hit("delete");
    self.inner.delete(id).await
  }

  async fn set_sort_order(&self, id: i64, sort_order: i32) -> Result<Option<Content>, R::Error> {
    self.hit("set_sort_order");
    self.inner.set_sort_order(id, sort_order).await
  }

  async fn reset_sort_order(&self, content_type: ContentType) -> Result<u64, R::Error> {
    self.hit("reset_sort_order");
    self.inner.reset_sort_order(content_type).await
  }

  async fn log_access(&self, entry: NewAccessLog) -> Result<Option<i64>, R::Error> {
    self.hit("log_access");
    self.inner.log_access(entry).await
  }

  async fn access_logs(&self, content_id: i64) -> Result<Vec<AccessLog>, R::Error> {
    self.hit("access_logs");
    self.inner.access_logs(content_id).await
  }

  async fn site_settings(&self) -> Result<SiteSettings, R::Error> {
    self.hit("site_settings");
    self.inner.site_settings().await
  }

  async fn update_site_settings(&self, patch: SiteSettingsPatch) -> Result<SiteSettings, R::Error> {
    self.hit("update_site_settings");
    self.inner.update_site_settings(patch).await
  }
}
