//! [`ObjectStore`]: naming, thumbnails and best-effort deletion on top of an
//! [`ObjectBackend`].

use std::path::Path;

use omate_core::content::ContentType;
use uuid::Uuid;

use crate::{
  ObjectBackend, Result,
  settings::{DEFAULT_PREFIX, StorageSettings},
  thumbnail::{ThumbnailOptions, make_thumbnail},
};

/// Extensions whose payload is itself usable as a preview.
const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "svg"];

/// One file to store.
#[derive(Debug, Clone)]
pub struct UploadRequest {
  pub bytes:          Vec<u8>,
  pub content_type:   ContentType,
  /// Client-side file name; only its extension is used.
  pub original_name:  Option<String>,
  /// Explicit object name (before the prefix). Generated when absent.
  pub suggested_name: Option<String>,
}

impl UploadRequest {
  pub fn new(content_type: ContentType, bytes: Vec<u8>) -> Self {
    Self { bytes, content_type, original_name: None, suggested_name: None }
  }

  pub fn with_original_name(mut self, name: impl Into<String>) -> Self {
    self.original_name = Some(name.into());
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
  pub url:           String,
  pub thumbnail_url: Option<String>,
}

pub struct ObjectStore<B> {
  backend:   B,
  prefix:    String,
  thumbnail: ThumbnailOptions,
}

impl<B: ObjectBackend> ObjectStore<B> {
  pub fn new(backend: B) -> Self {
    Self {
      backend,
      prefix: DEFAULT_PREFIX.to_owned(),
      thumbnail: ThumbnailOptions::default(),
    }
  }

  /// Build from configuration, keeping `backend` as given.
  pub fn from_settings(backend: B, settings: &StorageSettings) -> Self {
    Self::new(backend)
      .with_prefix(&settings.prefix)
      .with_thumbnail_options(settings.thumbnail)
  }

  pub fn with_prefix(mut self, prefix: &str) -> Self {
    let prefix = prefix.trim_matches('/');
    self.prefix = if prefix.is_empty() { String::new() } else { format!("{prefix}/") };
    self
  }

  pub fn with_thumbnail_options(mut self, opts: ThumbnailOptions) -> Self {
    self.thumbnail = opts;
    self
  }

  pub fn backend(&self) -> &B { &self.backend }

  pub fn prefix(&self) -> &str { &self.prefix }

  /// Store the payload and, where applicable, a preview.
  ///
  /// Character cards always get a generated JPEG thumbnail; if that fails the
  /// primary URL doubles as the thumbnail. Other images use themselves.
  pub async fn upload(&self, req: UploadRequest) -> Result<Uploaded> {
    let ext = extension_for(req.content_type, req.original_name.as_deref());
    let ct = req.content_type.as_str();
    let name = req
      .suggested_name
      .clone()
      .unwrap_or_else(|| format!("{ct}_{}.{ext}", Uuid::new_v4().simple()));
    let key = format!("{}{name}", self.prefix);

    let source = (req.content_type == ContentType::CharacterCard).then(|| req.bytes.clone());
    let url = self.backend.put(&key, req.bytes, mime_for(&ext)).await?;
    tracing::info!(key, backend = self.backend.name(), "uploaded object");

    let thumbnail_url = match source {
      Some(bytes) => Some(self.card_thumbnail(ct, bytes).await.unwrap_or_else(|e| {
        tracing::warn!(key, error = %e, "thumbnail failed; using the original image");
        url.clone()
      })),
      None if IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
        Some(url.clone())
      }
      None => None,
    };

    Ok(Uploaded { url, thumbnail_url })
  }

  async fn card_thumbnail(&self, content_type: &str, bytes: Vec<u8>) -> Result<String> {
    let opts = self.thumbnail;
    let jpeg = tokio::task::spawn_blocking(move || make_thumbnail(&bytes, opts)).await??;
    let key = format!(
      "{}thumbnail_{content_type}_{}.jpg",
      self.prefix,
      Uuid::new_v4().simple()
    );
    self.backend.put(&key, jpeg, "image/jpeg").await
  }

  /// Delete the object behind `url`. Never fails: problems are logged and
  /// reported as `false`, since an orphaned blob is recoverable.
  pub async fn delete(&self, url: &str) -> bool {
    if url.trim().is_empty() {
      return false;
    }
    match self.backend.remove(url).await {
      Ok(()) => {
        tracing::debug!(url, "deleted object");
        true
      }
      Err(e) => {
        tracing::warn!(url, error = %e, "failed to delete object");
        false
      }
    }
  }
}

/// The stored extension: fixed for typed payloads, otherwise taken from the
/// client's file name, otherwise `bin`.
pub fn extension_for(content_type: ContentType, original_name: Option<&str>) -> String {
  match content_type {
    ContentType::CharacterCard => "png".into(),
    ContentType::KnowledgeBase | ContentType::EventBook | ContentType::PromptInjection => {
      "json".into()
    }
    ContentType::StoryBook | ContentType::Other => original_name
      .and_then(|n| Path::new(n).extension())
      .and_then(|e| e.to_str())
      .filter(|e| !e.is_empty())
      .map_or_else(|| "bin".into(), str::to_owned),
  }
}

fn mime_for(ext: &str) -> &'static str {
  match ext.to_ascii_lowercase().as_str() {
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "svg" => "image/svg+xml",
    "json" => "application/json",
    "txt" | "md" => "text/plain; charset=utf-8",
    _ => "application/octet-stream",
  }
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use image::{ImageFormat, Rgba, RgbaImage};

  use super::*;
  use crate::LocalBackend;

  fn png() -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    RgbaImage::from_pixel(1000, 500, Rgba([10, 20, 30, 255]))
      .write_to(&mut out, ImageFormat::Png)
      .unwrap();
    out.into_inner()
  }

  fn store(dir: &tempfile::TempDir) -> ObjectStore<LocalBackend> {
    ObjectStore::new(LocalBackend::new(dir.path(), "/uploads"))
  }

  #[test]
  fn extensions_follow_the_content_type_first() {
    use ContentType::*;
    assert_eq!(extension_for(CharacterCard, Some("x.webp")), "png");
    assert_eq!(extension_for(KnowledgeBase, Some("x.txt")), "json");
    assert_eq!(extension_for(EventBook, None), "json");
    assert_eq!(extension_for(PromptInjection, None), "json");
    assert_eq!(extension_for(StoryBook, Some("tale.md")), "md");
    assert_eq!(extension_for(Other, Some("archive")), "bin");
    assert_eq!(extension_for(Other, None), "bin");
  }

  #[test]
  fn prefix_is_normalised() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(store(&dir).prefix(), "oshare/");
    assert_eq!(store(&dir).with_prefix("media").prefix(), "media/");
    assert_eq!(store(&dir).with_prefix("/a/b/").prefix(), "a/b/");
    assert_eq!(store(&dir).with_prefix("").prefix(), "");
  }

  #[tokio::test]
  async fn character_cards_get_a_separate_jpeg_thumbnail() {
    let dir = tempfile::tempdir().unwrap();
    let s = store(&dir);

    let up = s
      .upload(UploadRequest::new(ContentType::CharacterCard, png()))
      .await
      .unwrap();
    assert!(up.url.starts_with("/uploads/oshare/character_card_"));
    assert!(up.url.ends_with(".png"));

    let thumb = up.thumbnail_url.unwrap();
    assert!(thumb.starts_with("/uploads/oshare/thumbnail_character_card_"));
    assert!(thumb.ends_with(".jpg"));

    let key = s.backend().key_for_url(&thumb).unwrap();
    let bytes = std::fs::read(dir.path().join(key)).unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
  }

  #[tokio::test]
  async fn undecodable_card_falls_back_to_the_original_url() {
    let dir = tempfile::tempdir().unwrap();
    let up = store(&dir)
      .upload(UploadRequest::new(ContentType::CharacterCard, b"not an image".to_vec()))
      .await
      .unwrap();
    assert_eq!(up.thumbnail_url.as_deref(), Some(up.url.as_str()));
  }

  #[tokio::test]
  async fn thumbnails_for_other_types() {
    let dir = tempfile::tempdir().unwrap();
    let s = store(&dir);

    let json = s
      .upload(UploadRequest::new(ContentType::KnowledgeBase, b"{}".to_vec()))
      .await
      .unwrap();
    assert!(json.url.ends_with(".json"));
    assert_eq!(json.thumbnail_url, None);

    let pic = s
      .upload(UploadRequest::new(ContentType::Other, vec![0; 4]).with_original_name("cover.WEBP"))
      .await
      .unwrap();
    assert!(pic.url.ends_with(".WEBP"));
    assert_eq!(pic.thumbnail_url.as_deref(), Some(pic.url.as_str()));
  }

  #[tokio::test]
  async fn suggested_names_are_kept() {
    let dir = tempfile::tempdir().unwrap();
    let up = store(&dir)
      .with_prefix("")
      .upload(UploadRequest {
        suggested_name: Some("fixed.json".into()),
        ..UploadRequest::new(ContentType::EventBook, b"[]".to_vec())
      })
      .await
      .unwrap();
    assert_eq!(up.url, "/uploads/fixed.json");
  }

  #[tokio::test]
  async fn delete_reports_instead_of_failing() {
    let dir = tempfile::tempdir().unwrap();
    let s = store(&dir);
    let up = s
      .upload(UploadRequest::new(ContentType::KnowledgeBase, b"{}".to_vec()))
      .await
      .unwrap();

    assert!(s.delete(&up.url).await);
    assert!(!s.delete(&up.url).await);
    assert!(!s.delete("").await);
    assert!(!s.delete("/uploads/../../etc/passwd").await);
  }
}
