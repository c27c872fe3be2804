//! Type-specific metadata carried by a [`Content`](crate::content::Content).
//!
//! Character cards have a known schema: an intro and four ordered lists of
//! related content ids. Every other content type carries an opaque JSON
//! object that is stored and returned untouched. Unknown keys on a card are
//! preserved as well, so older or newer clients never lose data on a
//! round-trip.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result, content::ContentType};

// ─── Relation ────────────────────────────────────────────────────────────────

/// One of the four relation lists a character card declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
  StoryBooks,
  KnowledgeBases,
  EventBooks,
  PromptInjections,
}

impl Relation {
  pub const ALL: [Relation; 4] = [
    Self::StoryBooks,
    Self::KnowledgeBases,
    Self::EventBooks,
    Self::PromptInjections,
  ];

  /// The content type every id in this list must resolve to.
  pub fn content_type(self) -> ContentType {
    match self {
      Self::StoryBooks => ContentType::StoryBook,
      Self::KnowledgeBases => ContentType::KnowledgeBase,
      Self::EventBooks => ContentType::EventBook,
      Self::PromptInjections => ContentType::PromptInjection,
    }
  }

  /// The metadata key the list is stored under.
  pub fn key(self) -> &'static str {
    match self {
      Self::StoryBooks => "selectedStoryBooks",
      Self::KnowledgeBases => "selectedKnowledgeBases",
      Self::EventBooks => "selectedEventBooks",
      Self::PromptInjections => "selectedPromptInjections",
    }
  }
}

// ─── CharacterCardMetadata ───────────────────────────────────────────────────

/// The validated metadata bag of a `character_card`.
///
/// Relation lists hold `Content.id` values as strings. They are not foreign
/// keys: ids may dangle and resolve to nothing. An absent list stays absent
/// on the way back out; an empty one is kept as `[]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterCardMetadata {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub intro:                      Option<String>,
  #[serde(
    default,
    deserialize_with = "id_list",
    skip_serializing_if = "Option::is_none"
  )]
  pub selected_story_books:       Option<Vec<String>>,
  #[serde(
    default,
    deserialize_with = "id_list",
    skip_serializing_if = "Option::is_none"
  )]
  pub selected_knowledge_bases:   Option<Vec<String>>,
  #[serde(
    default,
    deserialize_with = "id_list",
    skip_serializing_if = "Option::is_none"
  )]
  pub selected_event_books:       Option<Vec<String>>,
  #[serde(
    default,
    deserialize_with = "id_list",
    skip_serializing_if = "Option::is_none"
  )]
  pub selected_prompt_injections: Option<Vec<String>>,
  /// Keys outside the known schema (`personality`, `gender`, ...).
  #[serde(flatten)]
  pub extra:                      Map<String, Value>,
}

impl CharacterCardMetadata {
  /// The ids declared under `relation`, in author order.
  pub fn ids(&self, relation: Relation) -> &[String] {
    let ids = match relation {
      Relation::StoryBooks => &self.selected_story_books,
      Relation::KnowledgeBases => &self.selected_knowledge_bases,
      Relation::EventBooks => &self.selected_event_books,
      Relation::PromptInjections => &self.selected_prompt_injections,
    };
    ids.as_deref().unwrap_or_default()
  }

  /// The list under `relation`, created empty if it was absent.
  pub fn ids_mut(&mut self, relation: Relation) -> &mut Vec<String> {
    let ids = match relation {
      Relation::StoryBooks => &mut self.selected_story_books,
      Relation::KnowledgeBases => &mut self.selected_knowledge_bases,
      Relation::EventBooks => &mut self.selected_event_books,
      Relation::PromptInjections => &mut self.selected_prompt_injections,
    };
    ids.get_or_insert_with(Vec::new)
  }

  /// A string-valued key outside the typed schema.
  pub fn extra_str(&self, key: &str) -> Option<&str> {
    self.extra.get(key).and_then(Value::as_str)
  }
}

/// Accepts `null` or an array. String elements are kept, integral numbers
/// are stringified, and anything else is skipped so one bad element does not
/// cost the card its other relations.
fn id_list<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
  D: Deserializer<'de>,
{
  let items: Option<Vec<Value>> = Option::deserialize(deserializer)?;
  Ok(items.map(|items| items.into_iter().filter_map(id_from_value).collect()))
}

fn id_from_value(value: Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s),
    Value::Number(n) => n
      .as_i64()
      .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
      .map(|id| id.to_string()),
    other => {
      tracing::debug!(element = %other, "skipping non-id relation element");
      None
    }
  }
}

// ─── ContentMetadata ─────────────────────────────────────────────────────────

/// Metadata tagged by the owning record's content type.
///
/// Serialises to the plain JSON object (no tag); the variant is always
/// re-derived from the record's `content_type` when reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContentMetadata {
  CharacterCard(CharacterCardMetadata),
  Opaque(Map<String, Value>),
}

impl ContentMetadata {
  /// Strictly parse caller-supplied JSON for a record of `content_type`.
  ///
  /// `null` means "no metadata". Anything other than an object is rejected,
  /// as is a card bag whose known keys have the wrong shape.
  pub fn parse(content_type: ContentType, value: Value) -> Result<Option<Self>> {
    let map = match value {
      Value::Null => return Ok(None),
      Value::Object(map) => map,
      other => {
        return Err(Error::InvalidMetadata(format!(
          "expected a JSON object, got {}",
          json_type_name(&other)
        )));
      }
    };

    match content_type {
      ContentType::CharacterCard => {
        let card = serde_json::from_value(Value::Object(map))
          .map_err(|e| Error::InvalidMetadata(e.to_string()))?;
        Ok(Some(Self::CharacterCard(card)))
      }
      _ => Ok(Some(Self::Opaque(map))),
    }
  }

  /// Parse metadata read back from storage.
  ///
  /// Unlike [`ContentMetadata::parse`] this never fails: a card bag that no
  /// longer validates is kept as an opaque object, and a non-object payload
  /// is dropped. Both cases are logged.
  pub fn from_stored(content_type: ContentType, value: Value) -> Option<Self> {
    match Self::parse(content_type, value.clone()) {
      Ok(parsed) => parsed,
      Err(e) => match value {
        Value::Object(map) => {
          tracing::warn!(%content_type, error = %e, "stored metadata failed validation; keeping it opaque");
          Some(Self::Opaque(map))
        }
        _ => {
          tracing::warn!(%content_type, error = %e, "discarding non-object metadata");
          None
        }
      },
    }
  }

  /// Re-shape this metadata for `content_type`: an opaque bag on a card is
  /// validated into the card schema, a card bag on any other type becomes
  /// opaque.
  pub fn conform(self, content_type: ContentType) -> Result<Self> {
    match (self, content_type) {
      (Self::Opaque(map), ContentType::CharacterCard) => {
        Self::parse(content_type, Value::Object(map))
          .map(|m| m.unwrap_or_else(|| Self::CharacterCard(Default::default())))
      }
      (Self::CharacterCard(card), ty) if ty != ContentType::CharacterCard => {
        Ok(Self::Opaque(card.into_map()?))
      }
      (same, _) => Ok(same),
    }
  }

  pub fn as_card(&self) -> Option<&CharacterCardMetadata> {
    match self {
      Self::CharacterCard(card) => Some(card),
      Self::Opaque(_) => None,
    }
  }

  /// A string-valued key, whichever variant this is.
  pub fn get_str(&self, key: &str) -> Option<&str> {
    match self {
      Self::CharacterCard(card) if key == "intro" => card.intro.as_deref(),
      Self::CharacterCard(card) => card.extra_str(key),
      Self::Opaque(map) => map.get(key).and_then(Value::as_str),
    }
  }

  /// A key outside the typed card schema, whichever variant this is.
  pub fn get(&self, key: &str) -> Option<&Value> {
    match self {
      Self::CharacterCard(card) => card.extra.get(key),
      Self::Opaque(map) => map.get(key),
    }
  }

  /// The raw JSON value, as written to the database.
  pub fn to_value(&self) -> Result<Value> {
    Ok(serde_json::to_value(self)?)
  }
}

impl CharacterCardMetadata {
  fn into_map(self) -> Result<Map<String, Value>> {
    match serde_json::to_value(self)? {
      Value::Object(map) => Ok(map),
      _ => Ok(Map::new()),
    }
  }
}

fn json_type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn card_metadata_parses_known_keys_and_keeps_the_rest() {
    let value = json!({
      "intro": "A wandering bard.",
      "selectedStoryBooks": ["12", 13],
      "selectedKnowledgeBases": null,
      "personality": "cheerful",
      "gender": "female",
    });

    let parsed = ContentMetadata::parse(ContentType::CharacterCard, value)
      .unwrap()
      .unwrap();
    let card = parsed.as_card().unwrap();

    assert_eq!(card.intro.as_deref(), Some("A wandering bard."));
    assert_eq!(card.ids(Relation::StoryBooks), ["12", "13"]);
    assert!(card.ids(Relation::KnowledgeBases).is_empty());
    assert_eq!(card.extra_str("personality"), Some("cheerful"));
    assert_eq!(parsed.get_str("gender"), Some("female"));
    assert_eq!(parsed.get_str("intro"), Some("A wandering bard."));
  }

  #[test]
  fn card_metadata_rejects_wrong_shapes() {
    let err = ContentMetadata::parse(
      ContentType::CharacterCard,
      json!({ "selectedEventBooks": "7" }),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidMetadata(_)));

    let err = ContentMetadata::parse(ContentType::CharacterCard, json!({ "intro": 5 }))
      .unwrap_err();
    assert!(matches!(err, Error::InvalidMetadata(_)));

    let err = ContentMetadata::parse(ContentType::Other, json!([1, 2])).unwrap_err();
    assert!(matches!(err, Error::InvalidMetadata(_)));
  }

  #[test]
  fn bad_relation_elements_are_skipped_not_fatal() {
    let value = json!({
      "selectedStoryBooks": ["1", null, 2.0, true, 3.5, { "id": 4 }, 5],
      "selectedEventBooks": ["9"],
    });
    let parsed = ContentMetadata::parse(ContentType::CharacterCard, value).unwrap().unwrap();
    let card = parsed.as_card().expect("still a card");
    assert_eq!(card.ids(Relation::StoryBooks), ["1", "2", "5"]);
    assert_eq!(card.ids(Relation::EventBooks), ["9"]);

    let stored = json!({ "selectedKnowledgeBases": [null, "7"] });
    let parsed = ContentMetadata::from_stored(ContentType::CharacterCard, stored).unwrap();
    assert_eq!(parsed.as_card().unwrap().ids(Relation::KnowledgeBases), ["7"]);
  }

  #[test]
  fn explicitly_empty_relation_lists_survive_a_round_trip() {
    let value = json!({ "selectedStoryBooks": [], "selectedEventBooks": ["3"] });
    let parsed = ContentMetadata::parse(ContentType::CharacterCard, value.clone())
      .unwrap()
      .unwrap();
    assert_eq!(parsed.to_value().unwrap(), value);
  }

  #[test]
  fn null_metadata_means_none() {
    assert!(
      ContentMetadata::parse(ContentType::StoryBook, Value::Null)
        .unwrap()
        .is_none()
    );
  }

  #[test]
  fn opaque_metadata_round_trips_verbatim() {
    let value = json!({ "entries": [{ "key": "k", "content": "c" }], "v": 2 });
    let parsed = ContentMetadata::parse(ContentType::KnowledgeBase, value.clone())
      .unwrap()
      .unwrap();
    assert!(parsed.as_card().is_none());
    assert_eq!(parsed.to_value().unwrap(), value);
  }

  #[test]
  fn card_serialisation_is_camel_case_and_preserves_extras() {
    let mut card = CharacterCardMetadata {
      intro: Some("hi".into()),
      ..Default::default()
    };
    card.ids_mut(Relation::PromptInjections).push("4".into());
    card.extra.insert("personality".into(), json!("shy"));

    let value = ContentMetadata::CharacterCard(card).to_value().unwrap();
    assert_eq!(
      value,
      json!({ "intro": "hi", "selectedPromptInjections": ["4"], "personality": "shy" }),
    );
  }

  #[test]
  fn stored_metadata_degrades_instead_of_failing() {
    let broken = json!({ "selectedStoryBooks": { "oops": true } });
    let parsed = ContentMetadata::from_stored(ContentType::CharacterCard, broken.clone());
    assert_eq!(parsed, Some(ContentMetadata::Opaque(broken.as_object().unwrap().clone())));

    assert_eq!(
      ContentMetadata::from_stored(ContentType::CharacterCard, json!("text")),
      None,
    );
  }

  #[test]
  fn conform_reshapes_between_variants() {
    let opaque = ContentMetadata::Opaque(
      json!({ "selectedStoryBooks": [1] }).as_object().unwrap().clone(),
    );
    let card = opaque.conform(ContentType::CharacterCard).unwrap();
    assert_eq!(card.as_card().unwrap().ids(Relation::StoryBooks), ["1"]);

    let back = card.conform(ContentType::StoryBook).unwrap();
    assert!(back.as_card().is_none());
    assert_eq!(back.to_value().unwrap(), json!({ "selectedStoryBooks": ["1"] }));
  }

  #[test]
  fn relations_map_to_their_content_types() {
    assert_eq!(Relation::StoryBooks.content_type(), ContentType::StoryBook);
    assert_eq!(Relation::EventBooks.key(), "selectedEventBooks");
  }
}
