//! Batch resolution of the content a character card points at.
//!
//! Relation ids live in card metadata and are not foreign keys, so they may
//! dangle or point at content of the wrong type. Both are skipped silently.
//! Story books also link to a card implicitly when their own tags name the
//! card; that rule exists for data created before explicit relation lists
//! and applies to story books only.

use std::collections::{HashMap, HashSet};

use chrono::SecondsFormat;
use omate_core::{
  Classify, ErrorKind,
  content::{Content, ContentType},
  metadata::Relation,
  repository::ContentRepository,
};
use serde::Serialize;

use crate::{Error, Result};

// ─── Types ───────────────────────────────────────────────────────────────────

/// One related resource as the feed presents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedItem {
  pub path:        String,
  pub name:        String,
  /// Creation time of the related record, ISO 8601 in UTC.
  pub upload_time: String,
}

impl RelatedItem {
  pub fn from_content(content: &Content) -> Self {
    Self {
      path:        content.blob_url.clone(),
      name:        content.name.clone(),
      upload_time: iso_time(content),
    }
  }
}

/// Creation time in the millisecond ISO form existing clients parse.
pub(crate) fn iso_time(content: &Content) -> String {
  content.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relations {
  pub stories:           Vec<RelatedItem>,
  pub knowledge_bases:   Vec<RelatedItem>,
  pub event_books:       Vec<RelatedItem>,
  pub prompt_injections: Vec<RelatedItem>,
}

impl Relations {
  pub fn get(&self, relation: Relation) -> &[RelatedItem] {
    match relation {
      Relation::StoryBooks => &self.stories,
      Relation::KnowledgeBases => &self.knowledge_bases,
      Relation::EventBooks => &self.event_books,
      Relation::PromptInjections => &self.prompt_injections,
    }
  }

  fn get_mut(&mut self, relation: Relation) -> &mut Vec<RelatedItem> {
    match relation {
      Relation::StoryBooks => &mut self.stories,
      Relation::KnowledgeBases => &mut self.knowledge_bases,
      Relation::EventBooks => &mut self.event_books,
      Relation::PromptInjections => &mut self.prompt_injections,
    }
  }

  pub fn is_empty(&self) -> bool {
    Relation::ALL.iter().all(|r| self.get(*r).is_empty())
  }
}

/// A card together with its resolved relations.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedCard {
  pub card:      Content,
  pub relations: Relations,
}

impl EnrichedCard {
  pub fn bare(card: Content) -> Self { Self { card, relations: Relations::default() } }
}

/// Why a resolution came back without relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Degraded {
  pub reason: String,
}

impl Classify for Degraded {
  fn kind(&self) -> ErrorKind { ErrorKind::Degraded }
}

/// Output of [`RelationResolver::resolve_cards`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
  pub cards:    Vec<EnrichedCard>,
  /// Set when the lookup failed and every card came back bare.
  pub degraded: Option<Degraded>,
}

// ─── Resolver ────────────────────────────────────────────────────────────────

pub struct RelationResolver<'r, R> {
  repo: &'r R,
}

impl<'r, R: ContentRepository> RelationResolver<'r, R> {
  pub fn new(repo: &'r R) -> Self { Self { repo } }

  /// Resolve relations for every card, degrading to empty relation lists if
  /// the repository fails. Never returns an error.
  pub async fn resolve_cards(&self, cards: Vec<Content>) -> Resolved {
    match self.lookup(&cards).await {
      Ok(lookup) => Resolved {
        cards:    cards.into_iter().map(|c| lookup.enrich(c)).collect(),
        degraded: None,
      },
      Err(e) => {
        tracing::warn!(error = %e, cards = cards.len(), "relation lookup failed; serving cards without relations");
        Resolved {
          cards:    cards.into_iter().map(EnrichedCard::bare).collect(),
          degraded: Some(Degraded { reason: e.to_string() }),
        }
      }
    }
  }

  /// Like [`resolve_cards`](Self::resolve_cards) but propagates repository
  /// errors.
  pub async fn try_resolve_cards(&self, cards: Vec<Content>) -> Result<Vec<EnrichedCard>> {
    let lookup = self.lookup(&cards).await?;
    Ok(cards.into_iter().map(|c| lookup.enrich(c)).collect())
  }

  /// Fetch everything the cards could relate to: one batched `get_many` for
  /// the declared ids and one listing of story books for the tag rule.
  async fn lookup(&self, cards: &[Content]) -> Result<Lookup> {
    let cards: Vec<&Content> = cards
      .iter()
      .filter(|c| c.content_type == ContentType::CharacterCard)
      .collect();
    if cards.is_empty() {
      return Ok(Lookup::default());
    }

    let mut seen = HashSet::new();
    let ids: Vec<String> = cards
      .iter()
      .filter_map(|c| c.metadata.as_ref()?.as_card())
      .flat_map(|meta| Relation::ALL.into_iter().flat_map(move |r| meta.ids(r).iter()))
      .map(|id| id.trim().to_owned())
      .filter(|id| seen.insert(id.clone()))
      .collect();

    let referenced = if ids.is_empty() {
      Vec::new()
    } else {
      self.repo.get_many(&ids).await.map_err(Error::repository)?
    };
    let story_books = self
      .repo
      .list(Some(ContentType::StoryBook))
      .await
      .map_err(Error::repository)?;

    tracing::debug!(
      cards = cards.len(),
      requested = ids.len(),
      resolved = referenced.len(),
      story_books = story_books.len(),
      "resolved card relations"
    );
    Ok(Lookup {
      by_id: referenced.into_iter().map(|c| (c.id, c)).collect(),
      story_books,
    })
  }
}

/// Content fetched for one resolution pass.
#[derive(Default)]
struct Lookup {
  by_id:       HashMap<i64, Content>,
  story_books: Vec<Content>,
}

impl Lookup {
  fn enrich(&self, card: Content) -> EnrichedCard {
    if card.content_type != ContentType::CharacterCard {
      return EnrichedCard::bare(card);
    }

    let mut relations = Relations::default();
    let mut linked_stories = HashSet::new();

    if let Some(meta) = card.metadata.as_ref().and_then(|m| m.as_card()) {
      for relation in Relation::ALL {
        let mut taken = HashSet::new();
        for raw in meta.ids(relation) {
          let Ok(id) = raw.trim().parse::<i64>() else { continue };
          let Some(target) = self.by_id.get(&id) else { continue };
          if target.content_type != relation.content_type() || !taken.insert(id) {
            continue;
          }
          relations.get_mut(relation).push(RelatedItem::from_content(target));
        }
        if relation == Relation::StoryBooks {
          linked_stories = taken;
        }
      }
    }

    let card_id = card.id.to_string();
    for story in &self.story_books {
      if story.content_type != ContentType::StoryBook {
        continue;
      }
      let tagged = story.tags.iter().any(|t| *t == card.name || *t == card_id);
      if tagged && linked_stories.insert(story.id) {
        relations.stories.push(RelatedItem::from_content(story));
      }
    }

    EnrichedCard { card, relations }
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use omate_core::metadata::{CharacterCardMetadata, ContentMetadata};

  use super::*;

  fn content(id: i64, name: &str, content_type: ContentType, tags: &[&str]) -> Content {
    let now = Utc::now();
    Content {
      id,
      external_id: format!("ext-{id}"),
      name: name.into(),
      description: String::new(),
      content_type,
      blob_url: format!("s://{name}"),
      thumbnail_url: None,
      metadata: None,
      tags: tags.iter().map(|t| t.to_string()).collect(),
      sort_order: None,
      created_at: now,
      updated_at: now,
    }
  }

  fn card_with(relation: Relation, ids: &[&str]) -> Content {
    let mut meta = CharacterCardMetadata::default();
    meta.ids_mut(relation).extend(ids.iter().map(|s| s.to_string()));
    Content {
      metadata: Some(ContentMetadata::CharacterCard(meta)),
      ..content(1, "Aria", ContentType::CharacterCard, &[])
    }
  }

  fn lookup(referenced: Vec<Content>, story_books: Vec<Content>) -> Lookup {
    Lookup {
      by_id: referenced.into_iter().map(|c| (c.id, c)).collect(),
      story_books,
    }
  }

  fn names(items: &[RelatedItem]) -> Vec<&str> {
    items.iter().map(|i| i.name.as_str()).collect()
  }

  #[test]
  fn declared_ids_resolve_in_order() {
    let a = content(10, "A", ContentType::KnowledgeBase, &[]);
    let b = content(11, "B", ContentType::KnowledgeBase, &[]);
    let out = lookup(vec![a, b], vec![])
      .enrich(card_with(Relation::KnowledgeBases, &["11", "404", "10", "11"]));
    assert_eq!(names(&out.relations.knowledge_bases), ["B", "A"]);
    assert!(out.relations.stories.is_empty());
  }

  #[test]
  fn ids_resolving_to_another_type_are_dropped() {
    let b = content(5, "B", ContentType::StoryBook, &[]);
    let out = lookup(vec![b.clone()], vec![]).enrich(card_with(Relation::StoryBooks, &["5"]));
    assert_eq!(names(&out.relations.stories), ["B"]);

    let retyped = Content { content_type: ContentType::KnowledgeBase, ..b };
    let out = lookup(vec![retyped], vec![]).enrich(card_with(Relation::StoryBooks, &["5"]));
    assert!(out.relations.is_empty());
  }

  #[test]
  fn story_books_tagged_with_the_card_are_linked() {
    let by_name = content(20, "ByName", ContentType::StoryBook, &["Aria"]);
    let by_id = content(21, "ById", ContentType::StoryBook, &["1"]);
    let other = content(22, "Other", ContentType::StoryBook, &["Aria2", "x"]);
    let out = lookup(vec![], vec![by_name, by_id, other])
      .enrich(content(1, "Aria", ContentType::CharacterCard, &[]));
    assert_eq!(names(&out.relations.stories), ["ByName", "ById"]);
  }

  #[test]
  fn declared_and_tagged_story_books_are_not_duplicated() {
    let s = content(30, "S", ContentType::StoryBook, &["Aria"]);
    let t = content(31, "T", ContentType::StoryBook, &["Aria"]);
    let out = lookup(vec![t.clone()], vec![s, t])
      .enrich(card_with(Relation::StoryBooks, &["31"]));
    assert_eq!(names(&out.relations.stories), ["T", "S"]);
  }

  #[test]
  fn tag_linking_is_for_story_books_only() {
    let kb = content(40, "KB", ContentType::KnowledgeBase, &["Aria"]);
    let out = lookup(vec![], vec![kb]).enrich(content(1, "Aria", ContentType::CharacterCard, &[]));
    assert!(out.relations.is_empty());
  }

  #[test]
  fn non_cards_pass_through_bare() {
    let s = content(50, "S", ContentType::StoryBook, &["Aria"]);
    let out = lookup(vec![], vec![s]).enrich(content(1, "Aria", ContentType::Other, &[]));
    assert!(out.relations.is_empty());
  }
}
