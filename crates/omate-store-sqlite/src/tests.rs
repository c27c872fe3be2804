//! Integration tests for `SqliteRepository`, in memory and on disk.

use omate_core::{
  Classify as _, ErrorKind,
  config::SqliteLocation,
  content::{ContentType, NewContent},
  metadata::Relation,
  repository::{ContentRepository, SCHEMA_VERSION},
};
use omate_test_utils::conformance;

use crate::{Error, SqliteRepository};

async fn store() -> SqliteRepository {
  SqliteRepository::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn card_names(repo: &SqliteRepository) -> Vec<String> {
  repo
    .list(Some(ContentType::CharacterCard))
    .await
    .unwrap()
    .into_iter()
    .map(|c| c.name)
    .collect()
}

/// Prepare a database file by hand, bypassing the repository.
fn raw(path: &std::path::Path, sql: &str) {
  let conn = rusqlite::Connection::open(path).expect("raw open");
  conn.execute_batch(sql).expect("raw sql");
}

// ─── Conformance ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn uninitialised_calls_fail() {
  conformance::uninitialised_calls_fail(&SqliteRepository::new(SqliteLocation::Memory)).await;
}

#[tokio::test]
async fn fresh_settings_have_defaults() {
  conformance::fresh_settings_have_defaults(&store().await).await;
}

#[tokio::test]
async fn ensure_schema_is_idempotent() {
  conformance::ensure_schema_is_idempotent(&store().await).await;
}

#[tokio::test]
async fn create_then_get_round_trips() {
  conformance::create_then_get_round_trips(&store().await).await;
}

#[tokio::test]
async fn metadata_and_tags_are_structured() {
  conformance::metadata_and_tags_are_structured(&store().await).await;
}

#[tokio::test]
async fn invalid_input_is_a_constraint_violation() {
  conformance::invalid_input_is_a_constraint_violation(&store().await).await;
}

#[tokio::test]
async fn get_many_skips_unresolvable_ids() {
  conformance::get_many_skips_unresolvable_ids(&store().await).await;
}

#[tokio::test]
async fn update_applies_only_supplied_fields() {
  conformance::update_applies_only_supplied_fields(&store().await).await;
}

#[tokio::test]
async fn delete_removes_row_and_access_logs() {
  conformance::delete_removes_row_and_access_logs(&store().await).await;
}

#[tokio::test]
async fn list_orders_nulls_last_then_most_recent() {
  conformance::list_orders_nulls_last_then_most_recent(&store().await).await;
}

#[tokio::test]
async fn reset_sort_order_clears_one_type() {
  conformance::reset_sort_order_clears_one_type(&store().await).await;
}

#[tokio::test]
async fn access_log_requires_existing_content() {
  conformance::access_log_requires_existing_content(&store().await).await;
}

#[tokio::test]
async fn disabled_access_log_is_a_no_op() {
  let repo = SqliteRepository::new(SqliteLocation::Memory).with_access_log(false);
  repo.connect().await.unwrap();
  repo.ensure_schema().await.unwrap();
  conformance::disabled_access_log_is_a_no_op(&repo).await;
}

#[tokio::test]
async fn site_settings_update_in_place() {
  conformance::site_settings_update_in_place(&store().await).await;
}

#[tokio::test]
async fn full_suite_on_a_file() {
  let dir = tempfile::tempdir().unwrap();
  let repo = SqliteRepository::open(dir.path().join("nested/omate.db"))
    .await
    .unwrap();
  conformance::run_all(&repo).await;
}

// ─── File-backed behaviour ───────────────────────────────────────────────────

#[tokio::test]
async fn data_survives_reconnect() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("omate.db");

  let repo = SqliteRepository::open(&path).await.unwrap();
  let c = repo
    .create(NewContent::new("Kept", ContentType::StoryBook, "s://kept"))
    .await
    .unwrap();
  repo.disconnect().await.unwrap();

  repo.connect().await.unwrap();
  repo.ensure_schema().await.unwrap();
  assert_eq!(repo.get(c.id).await.unwrap(), Some(c));
}

#[tokio::test]
async fn concurrent_cold_starts_bootstrap_once() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("omate.db");

  let mut set = tokio::task::JoinSet::new();
  for _ in 0..4 {
    let path = path.clone();
    set.spawn(async move {
      let repo = SqliteRepository::new(SqliteLocation::File(path));
      repo.connect().await?;
      repo.ensure_schema().await?;
      repo.site_settings().await.map(|s| s.id)
    });
  }

  let mut ids = Vec::new();
  while let Some(joined) = set.join_next().await {
    ids.push(joined.expect("task panicked").expect("bootstrap"));
  }
  assert_eq!(ids.len(), 4);
  assert!(ids.windows(2).all(|w| w[0] == w[1]));

  let conn = rusqlite::Connection::open(&path).unwrap();
  let rows: i64 = conn
    .query_row("SELECT COUNT(*) FROM site_settings", [], |r| r.get(0))
    .unwrap();
  assert_eq!(rows, 1);
}

// ─── Legacy databases ────────────────────────────────────────────────────────

const LEGACY_SCHEMA: &str = "
CREATE TABLE contents (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  uuid TEXT UNIQUE,
  name TEXT NOT NULL,
  description TEXT,
  content_type TEXT NOT NULL CHECK (content_type IN (
    'character_card',
    'knowledge_base',
    'event_book',
    'prompt_injection',
    'story_book',
    'other'
  )),
  blob_url TEXT NOT NULL,
  thumbnail_url TEXT,
  metadata TEXT,
  tags TEXT,
  sort_order INTEGER,
  created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
  updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE access_logs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  content_id INTEGER REFERENCES contents(id),
  access_type TEXT NOT NULL,
  ip_address TEXT,
  user_agent TEXT,
  created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE site_settings (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  site_name TEXT DEFAULT 'OMateShare',
  show_download_link INTEGER DEFAULT 1,
  page_title TEXT DEFAULT 'OMateShare',
  meta_description TEXT,
  created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
  updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
INSERT INTO site_settings (site_name, show_download_link, page_title)
VALUES ('Legacy Share', 0, 'Legacy');
INSERT INTO contents (name, content_type, blob_url, metadata, tags, created_at, updated_at)
VALUES ('Old card', 'character_card', '/uploads/old.png',
        '{\"selectedStoryBooks\":[2],\"gender\":\"male\"}', '[\"男\"]',
        '2024-05-01 10:00:00', '2024-05-02 11:30:00');
";

#[tokio::test]
async fn legacy_database_is_adopted() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("legacy.db");
  raw(&path, LEGACY_SCHEMA);

  let repo = SqliteRepository::new(SqliteLocation::File(path.clone()));
  repo.connect().await.unwrap();
  assert_eq!(repo.schema_version().await.unwrap(), None);
  repo.ensure_schema().await.unwrap();
  assert_eq!(repo.schema_version().await.unwrap(), Some(SCHEMA_VERSION));

  let settings = repo.site_settings().await.unwrap();
  assert_eq!(settings.site_name, "Legacy Share");
  assert!(!settings.show_download_link);

  let cards = repo.list(Some(ContentType::CharacterCard)).await.unwrap();
  assert_eq!(cards.len(), 1);
  let old = &cards[0];
  // No uuid was stored; the row id stands in.
  assert_eq!(old.external_id, old.id.to_string());
  assert_eq!(old.tags, ["男"]);
  assert_eq!(
    old.metadata.as_ref().and_then(|m| m.as_card()).map(|c| c.ids(Relation::StoryBooks).to_vec()),
    Some(vec!["2".to_owned()])
  );
  assert_eq!(old.updated_at.to_rfc3339(), "2024-05-02T11:30:00+00:00");

  let conn = rusqlite::Connection::open(&path).unwrap();
  let index: Option<String> = conn
    .query_row(
      "SELECT name FROM sqlite_master WHERE type = 'index' AND name = 'idx_contents_sort_order'",
      [],
      |r| r.get(0),
    )
    .ok();
  assert!(index.is_some(), "adoption adds missing indexes");
}

#[tokio::test]
async fn legacy_and_new_timestamps_order_together() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("legacy.db");
  raw(&path, LEGACY_SCHEMA);

  let repo = SqliteRepository::new(SqliteLocation::File(path.clone()));
  repo.connect().await.unwrap();
  repo.ensure_schema().await.unwrap();
  let new = repo
    .create(NewContent::new("New", ContentType::CharacterCard, "s://new.png"))
    .await
    .unwrap();

  // The legacy web tier writes CURRENT_TIMESTAMP text on update.
  let stamp = |offset: chrono::Duration| {
    (new.updated_at + offset).format("%Y-%m-%d %H:%M:%S").to_string()
  };

  raw(
    &path,
    &format!(
      "UPDATE contents SET updated_at = '{}' WHERE name = 'Old card'",
      stamp(chrono::Duration::hours(1))
    ),
  );
  assert_eq!(card_names(&repo).await, ["Old card", "New"]);

  raw(
    &path,
    &format!(
      "UPDATE contents SET updated_at = '{}' WHERE name = 'Old card'",
      stamp(chrono::Duration::hours(-1))
    ),
  );
  assert_eq!(card_names(&repo).await, ["New", "Old card"]);
}

#[tokio::test]
async fn missing_content_type_fails_loudly() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("old.db");
  raw(
    &path,
    "CREATE TABLE contents (
       id INTEGER PRIMARY KEY AUTOINCREMENT,
       name TEXT NOT NULL,
       content_type TEXT NOT NULL CHECK (content_type IN ('character_card', 'knowledge_base')),
       blob_url TEXT NOT NULL
     );",
  );

  let repo = SqliteRepository::new(SqliteLocation::File(path));
  repo.connect().await.unwrap();
  let err = repo.ensure_schema().await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
  match err {
    Error::MissingContentTypes(missing) => {
      assert!(missing.contains(&"story_book".to_owned()));
      assert!(missing.contains(&"event_book".to_owned()));
    }
    other => panic!("unexpected error: {other:?}"),
  }

  let err = repo.list(None).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotInitialized);
}

#[tokio::test]
async fn newer_schema_version_is_refused() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("future.db");
  raw(&path, &format!("PRAGMA user_version = {};", SCHEMA_VERSION + 1));

  let repo = SqliteRepository::new(SqliteLocation::File(path));
  repo.connect().await.unwrap();
  let err = repo.ensure_schema().await.unwrap_err();
  assert!(matches!(err, Error::UnsupportedSchemaVersion { .. }));
  assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
}

#[tokio::test]
async fn unreadable_stored_values_degrade() {
  let repo = store().await;
  let c = repo
    .create(NewContent::new("Odd", ContentType::Other, "s://odd"))
    .await
    .unwrap();

  let conn = repo.ready().await.unwrap();
  let id = c.id;
  conn
    .call(move |conn| {
      conn.execute(
        "UPDATE contents SET tags = 'not json', metadata = '[1,2]' WHERE id = ?1",
        [id],
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let odd = repo.get(c.id).await.unwrap().unwrap();
  assert!(odd.tags.is_empty());
  assert_eq!(odd.metadata, None);
}
