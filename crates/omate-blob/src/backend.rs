//! The `ObjectBackend` trait and the runtime-selected [`AnyBackend`].

use std::future::Future;

use crate::{
  Error, HttpBackend, LocalBackend, Result, S3Backend,
  settings::{StorageKind, StorageSettings},
};

/// Moves bytes to and from one storage service. Naming, extensions and
/// thumbnails are decided by [`crate::ObjectStore`]; a backend only stores
/// what it is given under the key it is given.
pub trait ObjectBackend: Send + Sync {
  /// Short name for logs.
  fn name(&self) -> &'static str;

  /// Store `bytes` under `key` and return the public URL.
  fn put<'a>(
    &'a self,
    key: &'a str,
    bytes: Vec<u8>,
    mime: &'a str,
  ) -> impl Future<Output = Result<String>> + Send + 'a;

  /// Delete the object a URL previously returned by [`put`](Self::put)
  /// points at.
  fn remove<'a>(&'a self, url: &'a str) -> impl Future<Output = Result<()>> + Send + 'a;

  /// Resolve a public URL back to the storage-relative key.
  fn key_for_url(&self, url: &str) -> Result<String>;
}

/// The key behind a URL on a bucket served from `public_base`.
///
/// The base only matches on a path boundary; any other URL falls back to its
/// path, so objects written under an older public host still resolve.
pub(crate) fn key_under(public_base: &str, url: &str) -> Result<String> {
  let key = match url
    .strip_prefix(public_base)
    .filter(|rest| rest.is_empty() || rest.starts_with('/'))
  {
    Some(rest) => rest.trim_start_matches('/').to_owned(),
    None => reqwest::Url::parse(url)
      .map_err(|_| Error::UnknownUrl(url.to_owned()))?
      .path()
      .trim_start_matches('/')
      .to_owned(),
  };
  if key.is_empty() {
    return Err(Error::UnknownUrl(url.to_owned()));
  }
  Ok(key)
}

// ─── AnyBackend ──────────────────────────────────────────────────────────────

/// A backend chosen from configuration at startup.
pub enum AnyBackend {
  Local(LocalBackend),
  Http(HttpBackend),
  S3(S3Backend),
}

impl AnyBackend {
  pub fn from_settings(settings: &StorageSettings) -> Result<Self> {
    Ok(match settings.kind {
      StorageKind::Local => Self::Local(LocalBackend::new(
        &settings.local.dir,
        &settings.local.url_prefix,
      )),
      StorageKind::Http => {
        Self::Http(HttpBackend::new(&settings.http, settings.timeout())?)
      }
      StorageKind::S3 => Self::S3(S3Backend::new(&settings.s3, settings.timeout())?),
    })
  }
}

impl ObjectBackend for AnyBackend {
  fn name(&self) -> &'static str {
    match self {
      Self::Local(b) => b.name(),
      Self::Http(b) => b.name(),
      Self::S3(b) => b.name(),
    }
  }

  async fn put<'a>(&'a self, key: &'a str, bytes: Vec<u8>, mime: &'a str) -> Result<String> {
    match self {
      Self::Local(b) => b.put(key, bytes, mime).await,
      Self::Http(b) => b.put(key, bytes, mime).await,
      Self::S3(b) => b.put(key, bytes, mime).await,
    }
  }

  async fn remove<'a>(&'a self, url: &'a str) -> Result<()> {
    match self {
      Self::Local(b) => b.remove(url).await,
      Self::Http(b) => b.remove(url).await,
      Self::S3(b) => b.remove(url).await,
    }
  }

  fn key_for_url(&self, url: &str) -> Result<String> {
    match self {
      Self::Local(b) => b.key_for_url(url),
      Self::Http(b) => b.key_for_url(url),
      Self::S3(b) => b.key_for_url(url),
    }
  }
}
