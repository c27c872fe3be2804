//! Recording in-memory object backend.

use std::{
  collections::BTreeMap,
  sync::{Arc, Mutex, MutexGuard},
};

use omate_blob::{Error, ObjectBackend, Result};

const BASE_URL: &str = "mem://bucket";

#[derive(Default)]
struct Inner {
  objects:      BTreeMap<String, Vec<u8>>,
  removed:      Vec<String>,
  fail_puts:    bool,
  fail_removes: bool,
}

/// An [`ObjectBackend`] that keeps objects in a map and remembers every
/// `remove` call, successful or not.
///
/// Clones share state, so a test can keep a handle after moving one into an
/// `ObjectStore`.
#[derive(Clone, Default)]
pub struct MemoryBackend {
  inner: Arc<Mutex<Inner>>,
}

impl MemoryBackend {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Make every subsequent `put` fail with a 503.
  pub fn fail_puts(&self, fail: bool) { self.lock().fail_puts = fail; }

  /// Make every subsequent `remove` fail with a 503 (the call is still
  /// recorded).
  pub fn fail_removes(&self, fail: bool) { self.lock().fail_removes = fail; }

  pub fn url_for(key: &str) -> String { format!("{BASE_URL}/{key}") }

  /// Keys currently stored.
  pub fn keys(&self) -> Vec<String> { self.lock().objects.keys().cloned().collect() }

  pub fn contains_url(&self, url: &str) -> bool {
    let Ok(key) = self.key_for_url(url) else { return false };
    self.lock().objects.contains_key(&key)
  }

  pub fn get(&self, key: &str) -> Option<Vec<u8>> { self.lock().objects.get(key).cloned() }

  /// URLs passed to `remove`, in call order.
  pub fn removed(&self) -> Vec<String> { self.lock().removed.clone() }
}

impl ObjectBackend for MemoryBackend {
  fn name(&self) -> &'static str { "memory" }

  async fn put<'a>(&'a self, key: &'a str, bytes: Vec<u8>, _mime: &'a str) -> Result<String> {
    let mut inner = self.lock();
    if inner.fail_puts {
      return Err(Error::Status { status: 503, key: key.to_owned() });
    }
    inner.objects.insert(key.to_owned(), bytes);
    Ok(Self::url_for(key))
  }

  async fn remove<'a>(&'a self, url: &'a str) -> Result<()> {
    let key = self.key_for_url(url);
    let mut inner = self.lock();
    inner.removed.push(url.to_owned());
    let key = key?;
    if inner.fail_removes {
      return Err(Error::Status { status: 503, key });
    }
    match inner.objects.remove(&key) {
      Some(_) => Ok(()),
      None => Err(Error::Status { status: 404, key }),
    }
  }

  fn key_for_url(&self, url: &str) -> Result<String> {
    url
      .strip_prefix(BASE_URL)
      .and_then(|rest| rest.strip_prefix('/'))
      .filter(|key| !key.is_empty())
      .map(str::to_owned)
      .ok_or_else(|| Error::UnknownUrl(url.to_owned()))
  }
}
