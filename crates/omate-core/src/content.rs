//! Content: the single polymorphic entity behind every uploaded asset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{Error, Result, metadata::ContentMetadata};

// ─── ContentType ─────────────────────────────────────────────────────────────

/// The closed set of content categories. Fixed once a record is created.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContentType {
  CharacterCard,
  KnowledgeBase,
  EventBook,
  PromptInjection,
  StoryBook,
  Other,
}

impl ContentType {
  /// Every variant, in declaration order. Used to build enum/check
  /// constraints and to verify them against an existing schema.
  pub const ALL: [ContentType; 6] = [
    Self::CharacterCard,
    Self::KnowledgeBase,
    Self::EventBook,
    Self::PromptInjection,
    Self::StoryBook,
    Self::Other,
  ];

  /// The string stored in the `content_type` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::CharacterCard => "character_card",
      Self::KnowledgeBase => "knowledge_base",
      Self::EventBook => "event_book",
      Self::PromptInjection => "prompt_injection",
      Self::StoryBook => "story_book",
      Self::Other => "other",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    s.parse()
      .map_err(|_| Error::UnknownContentType(s.to_owned()))
  }
}

// ─── Content ─────────────────────────────────────────────────────────────────

/// A persisted content record as every backend presents it: metadata and tags
/// are already parsed, timestamps are UTC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
  pub id:            i64,
  /// Public-facing identifier; generated at creation, never changes.
  pub external_id:   String,
  pub name:          String,
  pub description:   String,
  pub content_type:  ContentType,
  pub blob_url:      String,
  pub thumbnail_url: Option<String>,
  pub metadata:      Option<ContentMetadata>,
  pub tags:          Vec<String>,
  /// Manual ordering key. `None` sorts after every ordered item.
  pub sort_order:    Option<i32>,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

impl Content {
  /// The thumbnail URL when it points at a different object than the
  /// primary blob. Both need deleting when the record goes away.
  pub fn distinct_thumbnail(&self) -> Option<&str> {
    self
      .thumbnail_url
      .as_deref()
      .filter(|t| !t.is_empty() && *t != self.blob_url)
  }

  /// Every object-store URL owned by this record.
  pub fn owned_urls(&self) -> Vec<&str> {
    let mut urls = vec![self.blob_url.as_str()];
    urls.extend(self.distinct_thumbnail());
    urls
  }
}

// ─── NewContent ──────────────────────────────────────────────────────────────

/// Input to [`crate::repository::ContentRepository::create`]. The id, external
/// id and timestamps are assigned by the repository.
#[derive(Debug, Clone)]
pub struct NewContent {
  pub name:          String,
  pub description:   Option<String>,
  pub content_type:  ContentType,
  pub blob_url:      String,
  pub thumbnail_url: Option<String>,
  pub metadata:      Option<ContentMetadata>,
  pub tags:          Vec<String>,
}

impl NewContent {
  /// Convenience constructor with all optional fields left empty.
  pub fn new(
    name: impl Into<String>,
    content_type: ContentType,
    blob_url: impl Into<String>,
  ) -> Self {
    Self {
      name: name.into(),
      description: None,
      content_type,
      blob_url: blob_url.into(),
      thumbnail_url: None,
      metadata: None,
      tags: Vec::new(),
    }
  }

  /// Check required fields and bring the metadata in line with the content
  /// type. Backends call this before writing.
  pub fn validated(mut self) -> Result<Self> {
    if self.name.trim().is_empty() {
      return Err(Error::InvalidContent("name is required".into()));
    }
    if self.blob_url.trim().is_empty() {
      return Err(Error::InvalidContent("blob_url is required".into()));
    }
    self.metadata = self
      .metadata
      .map(|m| m.conform(self.content_type))
      .transpose()?;
    Ok(self)
  }
}

// ─── ContentPatch ────────────────────────────────────────────────────────────

/// Partial update. `None` leaves a field untouched; for nullable columns
/// `Some(None)` clears the value. The content type cannot be patched.
#[derive(Debug, Clone, Default)]
pub struct ContentPatch {
  pub name:          Option<String>,
  pub description:   Option<String>,
  pub blob_url:      Option<String>,
  pub thumbnail_url: Option<Option<String>>,
  pub metadata:      Option<Option<ContentMetadata>>,
  pub tags:          Option<Vec<String>>,
}

impl ContentPatch {
  pub fn is_empty(&self) -> bool {
    self.name.is_none()
      && self.description.is_none()
      && self.blob_url.is_none()
      && self.thumbnail_url.is_none()
      && self.metadata.is_none()
      && self.tags.is_none()
  }

  /// Validate against the stored record's content type.
  pub fn validated(mut self, content_type: ContentType) -> Result<Self> {
    if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
      return Err(Error::InvalidContent("name cannot be empty".into()));
    }
    if self.blob_url.as_deref().is_some_and(|u| u.trim().is_empty()) {
      return Err(Error::InvalidContent("blob_url cannot be empty".into()));
    }
    self.metadata = match self.metadata {
      Some(Some(m)) => Some(Some(m.conform(content_type)?)),
      other => other,
    };
    Ok(self)
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use serde_json::json;
  use strum::IntoEnumIterator as _;

  use super::*;

  #[test]
  fn content_type_strings_match_the_column_values() {
    for ty in ContentType::iter() {
      assert_eq!(ty.to_string(), ty.as_str());
      assert_eq!(ContentType::parse(ty.as_str()).unwrap(), ty);
      assert_eq!(
        serde_json::to_value(ty).unwrap(),
        json!(ty.as_str()),
      );
    }
    assert_eq!(ContentType::iter().count(), ContentType::ALL.len());
  }

  #[test]
  fn unknown_content_type_is_rejected() {
    let err = ContentType::parse("lorebook").unwrap_err();
    assert!(matches!(err, Error::UnknownContentType(ref s) if s == "lorebook"));
  }

  fn record(blob: &str, thumb: Option<&str>) -> Content {
    Content {
      id:            1,
      external_id:   "x".into(),
      name:          "Aria".into(),
      description:   String::new(),
      content_type:  ContentType::CharacterCard,
      blob_url:      blob.into(),
      thumbnail_url: thumb.map(str::to_owned),
      metadata:      None,
      tags:          vec![],
      sort_order:    None,
      created_at:    Utc::now(),
      updated_at:    Utc::now(),
    }
  }

  #[test]
  fn owned_urls_skip_a_shared_thumbnail() {
    assert_eq!(record("a.png", Some("a.png")).owned_urls(), ["a.png"]);
    assert_eq!(record("a.png", None).owned_urls(), ["a.png"]);
    assert_eq!(
      record("a.png", Some("t.jpg")).owned_urls(),
      ["a.png", "t.jpg"],
    );
  }

  #[test]
  fn new_content_requires_name_and_blob() {
    let err = NewContent::new("  ", ContentType::Other, "u")
      .validated()
      .unwrap_err();
    assert!(matches!(err, Error::InvalidContent(_)));

    let err = NewContent::new("n", ContentType::Other, "")
      .validated()
      .unwrap_err();
    assert!(matches!(err, Error::InvalidContent(_)));
  }

  #[test]
  fn empty_patch_is_detected() {
    assert!(ContentPatch::default().is_empty());
    let patch = ContentPatch {
      thumbnail_url: Some(None),
      ..Default::default()
    };
    assert!(!patch.is_empty());
  }
}
