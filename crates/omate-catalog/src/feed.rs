//! The public `cards` feed read by client applications.
//!
//! Key names are part of the client contract and must not change.

use std::path::Path;

use omate_core::metadata::ContentMetadata;
use serde::Serialize;
use serde_json::Value;

use crate::relations::{EnrichedCard, RelatedItem, iso_time};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Feed {
  pub cards: Vec<FeedCard>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedCard {
  pub id:                String,
  pub name:              String,
  pub file_name:         String,
  pub file_path:         String,
  pub cover_path:        String,
  pub file_type:         String,
  pub upload_time:       String,
  pub gender:            String,
  pub intro:             String,
  /// Same as `intro`; older clients read this key.
  pub description:       String,
  pub personality:       String,
  pub tags:              Vec<String>,
  pub stories:           Vec<RelatedItem>,
  pub knowledge_bases:   Vec<RelatedItem>,
  pub event_books:       Vec<RelatedItem>,
  pub prompt_injections: Vec<RelatedItem>,
}

pub fn format_cards(cards: Vec<EnrichedCard>) -> Vec<FeedCard> {
  cards.into_iter().map(format_card).collect()
}

pub fn format_card(enriched: EnrichedCard) -> FeedCard {
  let EnrichedCard { card, relations } = enriched;
  let meta = card.metadata.as_ref();

  let intro = meta
    .and_then(|m| m.get_str("intro"))
    .filter(|s| !s.is_empty())
    .map_or_else(|| card.description.clone(), str::to_owned);
  let personality = meta
    .and_then(|m| m.get_str("personality"))
    .unwrap_or_default()
    .to_owned();
  let tags = if card.tags.is_empty() {
    meta.map(metadata_tags).unwrap_or_default()
  } else {
    card.tags.clone()
  };
  let gender = gender_for(&tags, meta);

  let file_name = file_name(&card.blob_url).to_owned();
  let file_type = Path::new(&file_name)
    .extension()
    .and_then(|e| e.to_str())
    .unwrap_or_default()
    .to_owned();

  FeedCard {
    id: card.id.to_string(),
    upload_time: iso_time(&card),
    cover_path: card
      .thumbnail_url
      .clone()
      .filter(|t| !t.is_empty())
      .unwrap_or_else(|| card.blob_url.clone()),
    name: card.name,
    file_path: card.blob_url,
    file_name,
    file_type,
    gender,
    description: intro.clone(),
    intro,
    personality,
    tags,
    stories: relations.stories,
    knowledge_bases: relations.knowledge_bases,
    event_books: relations.event_books,
    prompt_injections: relations.prompt_injections,
  }
}

/// Last path segment of a URL or path, ignoring any query or fragment.
fn file_name(url: &str) -> &str {
  let path = url.split(['?', '#']).next().unwrap_or_default();
  path.rsplit('/').next().unwrap_or_default()
}

fn metadata_tags(meta: &ContentMetadata) -> Vec<String> {
  meta
    .get("tags")
    .and_then(Value::as_array)
    .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_owned).collect())
    .unwrap_or_default()
}

/// Tags win over metadata; anything unrecognised is `other`.
fn gender_for(tags: &[String], meta: Option<&ContentMetadata>) -> String {
  let has = |wanted: [&str; 2]| tags.iter().any(|t| wanted.contains(&t.to_lowercase().as_str()));
  if has(["male", "男"]) {
    return "male".into();
  }
  if has(["female", "女"]) {
    return "female".into();
  }
  meta
    .and_then(|m| m.get_str("gender"))
    .filter(|g| !g.is_empty())
    .unwrap_or("other")
    .to_owned()
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use omate_core::content::{Content, ContentType};
  use serde_json::json;

  use super::*;
  use crate::relations::Relations;

  fn card(metadata: Value, tags: &[&str]) -> Content {
    let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
    Content {
      id: 7,
      external_id: "abc".into(),
      name: "Aria".into(),
      description: "from description".into(),
      content_type: ContentType::CharacterCard,
      blob_url: "https://cdn.example/oshare/aria.png?v=2".into(),
      thumbnail_url: None,
      metadata: ContentMetadata::parse(ContentType::CharacterCard, metadata).unwrap(),
      tags: tags.iter().map(|t| t.to_string()).collect(),
      sort_order: None,
      created_at: at,
      updated_at: at,
    }
  }

  fn format(c: Content) -> FeedCard { format_card(EnrichedCard::bare(c)) }

  #[test]
  fn feed_keys_match_the_client_contract() {
    let value = serde_json::to_value(Feed {
      cards: vec![format(card(json!(null), &[]))],
    })
    .unwrap();
    let keys: Vec<&str> = value["cards"][0]
      .as_object()
      .unwrap()
      .keys()
      .map(String::as_str)
      .collect();
    for key in [
      "id", "name", "fileName", "filePath", "coverPath", "fileType", "uploadTime",
      "gender", "intro", "description", "personality", "tags", "stories",
      "knowledgeBases", "eventBooks", "promptInjections",
    ] {
      assert!(keys.contains(&key), "missing {key}");
    }
    assert_eq!(value["cards"][0]["id"], json!("7"));
    assert_eq!(value["cards"][0]["uploadTime"], json!("2025-01-02T03:04:05.000Z"));
  }

  #[test]
  fn file_fields_come_from_the_blob_url() {
    let f = format(card(json!(null), &[]));
    assert_eq!(f.file_name, "aria.png");
    assert_eq!(f.file_type, "png");
    assert_eq!(f.cover_path, f.file_path);

    let mut bare = card(json!(null), &[]);
    bare.blob_url = "/uploads/README".into();
    bare.thumbnail_url = Some("/uploads/thumb.jpg".into());
    let f = format(bare);
    assert_eq!(f.file_type, "");
    assert_eq!(f.cover_path, "/uploads/thumb.jpg");
  }

  #[test]
  fn intro_falls_back_to_the_description() {
    let f = format(card(json!({ "personality": "calm" }), &[]));
    assert_eq!(f.intro, "from description");
    assert_eq!(f.description, f.intro);
    assert_eq!(f.personality, "calm");

    let f = format(card(json!({ "intro": "A bard." }), &[]));
    assert_eq!(f.intro, "A bard.");
    assert_eq!(f.description, "A bard.");
  }

  #[test]
  fn gender_prefers_tags_then_metadata() {
    assert_eq!(format(card(json!({ "gender": "female" }), &["男"])).gender, "male");
    assert_eq!(format(card(json!(null), &["Female"])).gender, "female");
    assert_eq!(format(card(json!({ "gender": "nonbinary" }), &["x"])).gender, "nonbinary");
    assert_eq!(format(card(json!(null), &[])).gender, "other");
  }

  #[test]
  fn record_tags_win_over_metadata_tags() {
    let f = format(card(json!({ "tags": ["女", 3, "old"] }), &[]));
    assert_eq!(f.tags, ["女", "old"]);
    assert_eq!(f.gender, "female");

    let f = format(card(json!({ "tags": ["old"] }), &["new"]));
    assert_eq!(f.tags, ["new"]);
  }

  #[test]
  fn relations_are_carried_over() {
    let story = RelatedItem {
      path:        "s://story".into(),
      name:        "Story".into(),
      upload_time: "2025-01-01T00:00:00.000Z".into(),
    };
    let f = format_card(EnrichedCard {
      card:      card(json!(null), &[]),
      relations: Relations { stories: vec![story.clone()], ..Default::default() },
    });
    assert_eq!(f.stories, [story]);
    assert!(f.knowledge_bases.is_empty());
  }
}
