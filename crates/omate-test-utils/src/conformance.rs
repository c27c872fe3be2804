//! Behaviour every [`ContentRepository`] backend must share.
//!
//! Each check takes a connected, bootstrapped repository unless its
//! documentation says otherwise. Checks only assert on rows they create, so
//! they can run one after another against a shared database; [`run_all`]
//! does exactly that.

use std::{collections::BTreeSet, time::Duration};

use omate_core::{
  Classify, ErrorKind,
  access::NewAccessLog,
  content::{Content, ContentPatch, ContentType, NewContent},
  metadata::{CharacterCardMetadata, ContentMetadata, Relation},
  repository::{ContentRepository, SCHEMA_VERSION},
  settings::SiteSettingsPatch,
};
use serde_json::json;

/// Long enough for two writes to get distinct `updated_at` values.
const TICK: Duration = Duration::from_millis(15);

async fn tick() { tokio::time::sleep(TICK).await }

async fn create<R: ContentRepository>(repo: &R, input: NewContent) -> Content {
  repo.create(input).await.expect("create")
}

fn ids_of(rows: &[Content], wanted: &[i64]) -> Vec<i64> {
  rows.iter().map(|c| c.id).filter(|id| wanted.contains(id)).collect()
}

/// Run every check that works on a shared, bootstrapped repository.
pub async fn run_all<R: ContentRepository>(repo: &R) {
  ensure_schema_is_idempotent(repo).await;
  create_then_get_round_trips(repo).await;
  metadata_and_tags_are_structured(repo).await;
  invalid_input_is_a_constraint_violation(repo).await;
  get_many_skips_unresolvable_ids(repo).await;
  update_applies_only_supplied_fields(repo).await;
  delete_removes_row_and_access_logs(repo).await;
  list_orders_nulls_last_then_most_recent(repo).await;
  reset_sort_order_clears_one_type(repo).await;
  access_log_requires_existing_content(repo).await;
  site_settings_update_in_place(repo).await;
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// `repo` must be freshly constructed: not yet connected.
pub async fn uninitialised_calls_fail<R: ContentRepository>(repo: &R) {
  let err = repo.list(None).await.expect_err("list before connect");
  assert_eq!(err.kind(), ErrorKind::NotInitialized);

  repo.connect().await.expect("connect");
  repo.connect().await.expect("second connect is a no-op");
  let err = repo.get(1).await.expect_err("get before ensure_schema");
  assert_eq!(err.kind(), ErrorKind::NotInitialized);

  repo.ensure_schema().await.expect("ensure_schema");
  repo.list(None).await.expect("list after bootstrap");

  repo.disconnect().await.expect("disconnect");
  repo.disconnect().await.expect("second disconnect is a no-op");
  let err = repo.site_settings().await.expect_err("settings after disconnect");
  assert_eq!(err.kind(), ErrorKind::NotInitialized);
}

pub async fn ensure_schema_is_idempotent<R: ContentRepository>(repo: &R) {
  let before = repo.site_settings().await.expect("settings");
  repo.ensure_schema().await.expect("second ensure_schema");
  repo.ensure_schema().await.expect("third ensure_schema");

  let after = repo.site_settings().await.expect("settings after re-bootstrap");
  assert_eq!(before.id, after.id, "bootstrap must not insert another settings row");
  assert_eq!(
    repo.schema_version().await.expect("schema_version"),
    Some(SCHEMA_VERSION)
  );
}

/// `repo` must be freshly bootstrapped on an empty database.
pub async fn fresh_settings_have_defaults<R: ContentRepository>(repo: &R) {
  use omate_core::settings::*;
  let s = repo.site_settings().await.expect("settings");
  assert_eq!(s.site_name, DEFAULT_SITE_NAME);
  assert_eq!(s.show_download_link, DEFAULT_SHOW_DOWNLOAD_LINK);
  assert_eq!(s.page_title, DEFAULT_PAGE_TITLE);
  assert_eq!(s.meta_description, DEFAULT_META_DESCRIPTION);
}

// ─── Content ─────────────────────────────────────────────────────────────────

pub async fn create_then_get_round_trips<R: ContentRepository>(repo: &R) {
  let created = create(
    repo,
    NewContent::new("Round trip", ContentType::Other, "s://round.bin"),
  )
  .await;

  assert!(created.id > 0);
  assert!(!created.external_id.is_empty());
  assert_eq!(created.description, "");
  assert!(created.tags.is_empty());
  assert_eq!(created.sort_order, None);
  assert_eq!(created.created_at, created.updated_at);

  let fetched = repo.get(created.id).await.expect("get").expect("row exists");
  assert_eq!(fetched, created);

  let listed = repo.list(None).await.expect("list");
  assert_eq!(listed.iter().filter(|c| c.id == created.id).count(), 1);

  let other = create(repo, NewContent::new("Second", ContentType::Other, "s://2")).await;
  assert_ne!(other.id, created.id);
  assert_ne!(other.external_id, created.external_id);

  assert_eq!(repo.get(i64::MAX).await.expect("get missing"), None);
}

pub async fn metadata_and_tags_are_structured<R: ContentRepository>(repo: &R) {
  let mut card = CharacterCardMetadata {
    intro: Some("A wandering bard.".into()),
    ..Default::default()
  };
  card.ids_mut(Relation::StoryBooks).extend(["3".to_owned(), "1".to_owned()]);
  card.extra.insert("personality".into(), json!("cheerful"));
  card.extra.insert("legacy".into(), json!({ "nested": [1, 2] }));

  let created = create(
    repo,
    NewContent {
      description: Some("bard".into()),
      thumbnail_url: Some("s://aria.jpg".into()),
      metadata: Some(ContentMetadata::CharacterCard(card.clone())),
      tags: vec!["female".into(), "music".into(), "音乐".into()],
      ..NewContent::new("Aria", ContentType::CharacterCard, "s://aria.png")
    },
  )
  .await;

  let fetched = repo.get(created.id).await.expect("get").expect("row exists");
  assert_eq!(fetched.metadata, Some(ContentMetadata::CharacterCard(card)));
  assert_eq!(fetched.tags, ["female", "music", "音乐"]);
  assert_eq!(fetched.thumbnail_url.as_deref(), Some("s://aria.jpg"));

  let bag = json!({ "entries": [{ "k": "v" }], "version": 2 });
  let opaque = ContentMetadata::parse(ContentType::KnowledgeBase, bag.clone())
    .expect("parse")
    .expect("object");
  let kb = create(
    repo,
    NewContent {
      metadata: Some(opaque),
      ..NewContent::new("Lore", ContentType::KnowledgeBase, "s://lore.json")
    },
  )
  .await;
  let fetched = repo.get(kb.id).await.expect("get").expect("row exists");
  assert_eq!(fetched.metadata.expect("metadata").to_value().expect("json"), bag);
}

pub async fn invalid_input_is_a_constraint_violation<R: ContentRepository>(repo: &R) {
  let err = repo
    .create(NewContent::new("", ContentType::Other, "s://x"))
    .await
    .expect_err("empty name");
  assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

  let bad_card = ContentMetadata::Opaque(
    json!({ "selectedStoryBooks": "not a list" })
      .as_object()
      .cloned()
      .unwrap_or_default(),
  );
  let err = repo
    .create(NewContent {
      metadata: Some(bad_card),
      ..NewContent::new("Bad", ContentType::CharacterCard, "s://bad.png")
    })
    .await
    .expect_err("card metadata with the wrong shape");
  assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
}

pub async fn get_many_skips_unresolvable_ids<R: ContentRepository>(repo: &R) {
  let a = create(repo, NewContent::new("A", ContentType::StoryBook, "s://a")).await;
  let b = create(repo, NewContent::new("B", ContentType::EventBook, "s://b")).await;

  let ids: Vec<String> = vec![
    a.id.to_string(),
    "not-a-number".into(),
    b.id.to_string(),
    i64::MAX.to_string(),
    a.id.to_string(),
    String::new(),
  ];
  let found: BTreeSet<i64> = repo
    .get_many(&ids)
    .await
    .expect("get_many")
    .into_iter()
    .map(|c| c.id)
    .collect();
  assert_eq!(found, BTreeSet::from([a.id, b.id]));

  assert!(repo.get_many(&[]).await.expect("empty get_many").is_empty());
  assert!(
    repo
      .get_many(&["x".to_owned(), "1.5".to_owned()])
      .await
      .expect("garbage get_many")
      .is_empty()
  );
}

pub async fn update_applies_only_supplied_fields<R: ContentRepository>(repo: &R) {
  let created = create(
    repo,
    NewContent {
      description: Some("keep me".into()),
      thumbnail_url: Some("s://t.jpg".into()),
      tags: vec!["a".into()],
      ..NewContent::new("Before", ContentType::PromptInjection, "s://p.json")
    },
  )
  .await;

  let unchanged = repo
    .update(created.id, ContentPatch::default())
    .await
    .expect("empty update")
    .expect("row exists");
  assert_eq!(unchanged, created, "an empty patch is a no-op");

  tick().await;
  let updated = repo
    .update(
      created.id,
      ContentPatch {
        name: Some("After".into()),
        thumbnail_url: Some(None),
        tags: Some(vec!["b".into(), "c".into()]),
        ..Default::default()
      },
    )
    .await
    .expect("update")
    .expect("row exists");

  assert_eq!(updated.name, "After");
  assert_eq!(updated.description, "keep me");
  assert_eq!(updated.thumbnail_url, None);
  assert_eq!(updated.tags, ["b", "c"]);
  assert_eq!(updated.blob_url, created.blob_url);
  assert_eq!(updated.content_type, created.content_type);
  assert_eq!(updated.external_id, created.external_id);
  assert_eq!(updated.created_at, created.created_at);
  assert!(updated.updated_at > created.updated_at);

  let fetched = repo.get(created.id).await.expect("get").expect("row exists");
  assert_eq!(fetched, updated, "update returns the row as stored");

  let missing = repo
    .update(i64::MAX, ContentPatch { name: Some("x".into()), ..Default::default() })
    .await
    .expect("update missing");
  assert_eq!(missing, None);
}

pub async fn delete_removes_row_and_access_logs<R: ContentRepository>(repo: &R) {
  let c = create(repo, NewContent::new("Doomed", ContentType::Other, "s://d")).await;
  let keep = create(repo, NewContent::new("Kept", ContentType::Other, "s://k")).await;

  for content_id in [c.id, c.id, keep.id] {
    let logged = repo
      .log_access(NewAccessLog {
        ip_address: Some("127.0.0.1".into()),
        user_agent: Some("conformance".into()),
        ..NewAccessLog::view(content_id)
      })
      .await
      .expect("log_access");
    assert!(logged.is_some(), "access logging is enabled for this check");
  }
  let logs = repo.access_logs(c.id).await.expect("access_logs");
  assert_eq!(logs.len(), 2);
  assert!(logs[0].id < logs[1].id);
  assert_eq!(logs[0].access_type, "view");
  assert_eq!(logs[0].user_agent.as_deref(), Some("conformance"));

  let deleted = repo.delete(c.id).await.expect("delete").expect("row existed");
  assert_eq!(deleted, c);
  assert_eq!(repo.get(c.id).await.expect("get"), None);
  assert!(repo.access_logs(c.id).await.expect("access_logs").is_empty());
  assert_eq!(repo.access_logs(keep.id).await.expect("access_logs").len(), 1);

  assert_eq!(repo.delete(c.id).await.expect("second delete"), None);
}

// ─── Ordering ────────────────────────────────────────────────────────────────

pub async fn list_orders_nulls_last_then_most_recent<R: ContentRepository>(repo: &R) {
  let ty = ContentType::EventBook;
  let mut ids = Vec::new();
  for name in ["x", "y", "z", "w", "v"] {
    ids.push(create(repo, NewContent::new(name, ty, format!("s://{name}"))).await.id);
    tick().await;
  }
  let &[x, y, z, w, v] = ids.as_slice() else { unreachable!() };

  repo.set_sort_order(z, 1).await.expect("order z").expect("z exists");
  tick().await;
  repo.set_sort_order(x, 2).await.expect("order x").expect("x exists");
  tick().await;
  // Equal explicit orders fall back to the most recently updated.
  repo.set_sort_order(w, 2).await.expect("order w").expect("w exists");

  let listed = repo.list(Some(ty)).await.expect("list");
  assert!(listed.iter().all(|c| c.content_type == ty));
  assert_eq!(ids_of(&listed, &ids), [z, w, x, v, y]);

  let all = repo.list(None).await.expect("list all");
  assert_eq!(ids_of(&all, &ids), [z, w, x, v, y]);

  let missing = repo.set_sort_order(i64::MAX, 1).await.expect("order missing");
  assert_eq!(missing, None);
}

pub async fn reset_sort_order_clears_one_type<R: ContentRepository>(repo: &R) {
  let a = create(repo, NewContent::new("a", ContentType::StoryBook, "s://a")).await;
  let b = create(repo, NewContent::new("b", ContentType::StoryBook, "s://b")).await;
  let other = create(repo, NewContent::new("o", ContentType::KnowledgeBase, "s://o")).await;

  let ordered = repo.set_sort_order(a.id, 3).await.expect("order").expect("exists");
  assert_eq!(ordered.sort_order, Some(3));
  assert!(ordered.updated_at >= a.updated_at);
  repo.set_sort_order(b.id, 4).await.expect("order").expect("exists");
  repo.set_sort_order(other.id, 5).await.expect("order").expect("exists");

  let cleared = repo.reset_sort_order(ContentType::StoryBook).await.expect("reset");
  assert!(cleared >= 2);

  let books = repo.list(Some(ContentType::StoryBook)).await.expect("list");
  assert!(books.iter().all(|c| c.sort_order.is_none()));
  let kept = repo.get(other.id).await.expect("get").expect("exists");
  assert_eq!(kept.sort_order, Some(5));
}

// ─── Access log ──────────────────────────────────────────────────────────────

pub async fn access_log_requires_existing_content<R: ContentRepository>(repo: &R) {
  let err = repo
    .log_access(NewAccessLog::view(i64::MAX))
    .await
    .expect_err("log for missing content");
  assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
}

/// `repo` must have access logging switched off.
pub async fn disabled_access_log_is_a_no_op<R: ContentRepository>(repo: &R) {
  let c = create(repo, NewContent::new("Quiet", ContentType::Other, "s://q")).await;
  let logged = repo.log_access(NewAccessLog::view(c.id)).await.expect("log_access");
  assert_eq!(logged, None);
  assert!(repo.access_logs(c.id).await.expect("access_logs").is_empty());
}

// ─── Site settings ───────────────────────────────────────────────────────────

pub async fn site_settings_update_in_place<R: ContentRepository>(repo: &R) {
  let original = repo.site_settings().await.expect("settings");

  let unchanged = repo
    .update_site_settings(SiteSettingsPatch::default())
    .await
    .expect("empty settings update");
  assert_eq!(unchanged, original);

  tick().await;
  let updated = repo
    .update_site_settings(SiteSettingsPatch {
      site_name: Some("Test Share".into()),
      show_download_link: Some(!original.show_download_link),
      ..Default::default()
    })
    .await
    .expect("settings update");
  assert_eq!(updated.id, original.id);
  assert_eq!(updated.site_name, "Test Share");
  assert_eq!(updated.show_download_link, !original.show_download_link);
  assert_eq!(updated.page_title, original.page_title);
  assert!(updated.updated_at > original.updated_at);
  assert_eq!(repo.site_settings().await.expect("settings"), updated);

  repo
    .update_site_settings(SiteSettingsPatch {
      site_name: Some(original.site_name.clone()),
      show_download_link: Some(original.show_download_link),
      ..Default::default()
    })
    .await
    .expect("restore settings");
}
