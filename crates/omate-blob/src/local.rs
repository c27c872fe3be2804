//! Filesystem backend. Objects live under a root directory that the web
//! tier serves at a URL prefix.

use std::path::{Component, Path, PathBuf};

use crate::{Error, ObjectBackend, Result};

#[derive(Debug, Clone)]
pub struct LocalBackend {
  root:       PathBuf,
  url_prefix: String,
}

impl LocalBackend {
  pub fn new(root: impl Into<PathBuf>, url_prefix: impl AsRef<str>) -> Self {
    Self {
      root:       root.into(),
      url_prefix: url_prefix.as_ref().trim_end_matches('/').to_owned(),
    }
  }

  pub fn root(&self) -> &Path { &self.root }

  /// Whether the root directory can be created and written to.
  pub async fn is_available(&self) -> bool {
    let result = probe(&self.root).await;
    if let Err(e) = &result {
      tracing::warn!(root = %self.root.display(), error = %e, "local storage unavailable");
    }
    result.is_ok()
  }

  fn url_for(&self, key: &str) -> String { format!("{}/{key}", self.url_prefix) }

  /// Join a relative key onto the root, refusing anything that could
  /// escape it lexically.
  fn path_for(&self, key: &str) -> Result<PathBuf> {
    let rel = Path::new(key);
    let plain = rel
      .components()
      .all(|c| matches!(c, Component::Normal(_)));
    if key.is_empty() || !plain {
      return Err(Error::InvalidKey(key.to_owned()));
    }
    Ok(self.root.join(rel))
  }

  /// Canonicalise `path` and check it is still below the root, which catches
  /// symlinks pointing elsewhere.
  async fn contained(&self, path: &Path, key: &str) -> Result<PathBuf> {
    let root = tokio::fs::canonicalize(&self.root).await?;
    let canonical = tokio::fs::canonicalize(path).await?;
    if !canonical.starts_with(&root) {
      return Err(Error::InvalidKey(key.to_owned()));
    }
    Ok(canonical)
  }
}

async fn probe(root: &Path) -> std::io::Result<()> {
  let file = root.join(".omate-probe");
  tokio::fs::create_dir_all(root).await?;
  tokio::fs::write(&file, b"probe").await?;
  tokio::fs::remove_file(&file).await
}

impl ObjectBackend for LocalBackend {
  fn name(&self) -> &'static str { "local" }

  async fn put<'a>(&'a self, key: &'a str, bytes: Vec<u8>, _mime: &'a str) -> Result<String> {
    let path = self.path_for(key)?;
    let parent = path.parent().unwrap_or(self.root.as_path());
    tokio::fs::create_dir_all(parent).await?;
    self.contained(parent, key).await?;

    tokio::fs::write(&path, bytes).await?;
    tracing::debug!(key, path = %path.display(), "stored object");
    Ok(self.url_for(key))
  }

  async fn remove<'a>(&'a self, url: &'a str) -> Result<()> {
    let key = self.key_for_url(url)?;
    let path = self.contained(&self.path_for(&key)?, &key).await?;
    tokio::fs::remove_file(&path).await?;
    tracing::debug!(key, "removed object");
    Ok(())
  }

  /// Accepts `http://host/uploads/a/b.png`, `/uploads/a/b.png`, or a bare
  /// key when no URL prefix is configured.
  fn key_for_url(&self, url: &str) -> Result<String> {
    let path = match url.find("://") {
      Some(_) => reqwest::Url::parse(url)
        .map_err(|_| Error::UnknownUrl(url.to_owned()))?
        .path()
        .to_owned(),
      None => url.split(['?', '#']).next().unwrap_or_default().to_owned(),
    };

    let key = if self.url_prefix.is_empty() {
      path.trim_start_matches('/')
    } else {
      path
        .strip_prefix(&self.url_prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(|| Error::UnknownUrl(url.to_owned()))?
    };

    self.path_for(key)?;
    Ok(key.to_owned())
  }
}

#[cfg(test)]
mod tests {
  use omate_core::{Classify as _, ErrorKind};

  use super::*;

  fn backend(dir: &tempfile::TempDir) -> LocalBackend {
    LocalBackend::new(dir.path().join("uploads"), "/uploads/")
  }

  #[tokio::test]
  async fn put_writes_below_the_root_and_returns_a_prefixed_url() {
    let dir = tempfile::tempdir().unwrap();
    let b = backend(&dir);

    let url = b.put("oshare/a.json", b"{}".to_vec(), "application/json").await.unwrap();
    assert_eq!(url, "/uploads/oshare/a.json");
    let on_disk = std::fs::read(dir.path().join("uploads/oshare/a.json")).unwrap();
    assert_eq!(on_disk, b"{}");

    b.remove(&url).await.unwrap();
    assert!(!dir.path().join("uploads/oshare/a.json").exists());
  }

  #[tokio::test]
  async fn removing_a_missing_object_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let b = backend(&dir);
    std::fs::create_dir_all(b.root()).unwrap();
    let err = b.remove("/uploads/nope.png").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
  }

  #[test]
  fn key_resolution_accepts_absolute_and_relative_urls() {
    let b = LocalBackend::new("/srv/uploads", "/uploads");
    assert_eq!(b.key_for_url("/uploads/oshare/x.png").unwrap(), "oshare/x.png");
    assert_eq!(
      b.key_for_url("https://share.example/uploads/x.png?v=2").unwrap(),
      "x.png"
    );
    assert!(matches!(b.key_for_url("/elsewhere/x.png"), Err(Error::UnknownUrl(_))));
    assert!(matches!(b.key_for_url("/uploadsx/x.png"), Err(Error::UnknownUrl(_))));
  }

  #[test]
  fn traversal_and_absolute_keys_are_rejected() {
    let b = LocalBackend::new("/srv/uploads", "/uploads");
    for url in ["/uploads/../etc/passwd", "/uploads/a/../../b", "/uploads/", "/uploads//etc"] {
      let err = b.key_for_url(url).unwrap_err();
      assert!(matches!(err, Error::InvalidKey(_)), "{url}: {err:?}");
    }
    assert!(matches!(b.path_for("/etc/passwd"), Err(Error::InvalidKey(_))));
  }

  #[tokio::test]
  async fn availability_probe_creates_the_root() {
    let dir = tempfile::tempdir().unwrap();
    let b = backend(&dir);
    assert!(b.is_available().await);
    assert!(b.root().is_dir());
    assert!(!b.root().join(".omate-probe").exists());
  }
}
