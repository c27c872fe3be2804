//! SQL schema for the OMateShare SQLite store.
//!
//! Applied by `ensure_schema()` inside a `BEGIN IMMEDIATE` transaction and
//! versioned with `PRAGMA user_version`. Every statement is idempotent, so a
//! second run (or a second process racing the first) changes nothing.
//!
//! Column names and defaults match databases created by the earlier
//! deployment so those files can be adopted in place.

use std::time::Duration;

use omate_core::{
  content::ContentType,
  repository::SCHEMA_VERSION,
  settings::{
    DEFAULT_META_DESCRIPTION, DEFAULT_PAGE_TITLE, DEFAULT_SHOW_DOWNLOAD_LINK,
    DEFAULT_SITE_NAME,
  },
};

/// How long a writer waits on a locked database before giving up.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Journal mode for file-backed databases. Returns a row, so it is run with
/// `query_row` and never inside a transaction.
pub const JOURNAL_MODE: &str = "PRAGMA journal_mode = WAL";

pub const TABLE_EXISTS: &str =
  "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'contents'";

/// Full bootstrap DDL.
pub fn bootstrap_sql() -> String {
  let content_types = ContentType::ALL
    .iter()
    .map(|t| format!("'{}'", t.as_str()))
    .collect::<Vec<_>>()
    .join(", ");
  let show_download = i32::from(DEFAULT_SHOW_DOWNLOAD_LINK);

  format!(
    "
CREATE TABLE IF NOT EXISTS contents (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid          TEXT UNIQUE,
    name          TEXT NOT NULL,
    description   TEXT,
    content_type  TEXT NOT NULL CHECK (content_type IN ({content_types})),
    blob_url      TEXT NOT NULL,
    thumbnail_url TEXT,
    metadata      TEXT,              -- JSON object or NULL
    tags          TEXT,              -- JSON array of strings
    sort_order    INTEGER,           -- NULL sorts last
    created_at    DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at    DATETIME DEFAULT CURRENT_TIMESTAMP
);

-- Rows are removed explicitly before their content row; no cascade.
CREATE TABLE IF NOT EXISTS access_logs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    content_id  INTEGER REFERENCES contents(id),
    access_type TEXT NOT NULL,
    ip_address  TEXT,
    user_agent  TEXT,
    created_at  DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS site_settings (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    site_name          TEXT DEFAULT '{DEFAULT_SITE_NAME}',
    show_download_link INTEGER DEFAULT {show_download},
    page_title         TEXT DEFAULT '{DEFAULT_PAGE_TITLE}',
    meta_description   TEXT DEFAULT '{DEFAULT_META_DESCRIPTION}',
    created_at         DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at         DATETIME DEFAULT CURRENT_TIMESTAMP
);

INSERT INTO site_settings (site_name, show_download_link, page_title, meta_description)
SELECT '{DEFAULT_SITE_NAME}', {show_download}, '{DEFAULT_PAGE_TITLE}', '{DEFAULT_META_DESCRIPTION}'
WHERE NOT EXISTS (SELECT 1 FROM site_settings);

CREATE INDEX IF NOT EXISTS idx_contents_content_type  ON contents(content_type);
CREATE INDEX IF NOT EXISTS idx_contents_created_at    ON contents(created_at);
CREATE INDEX IF NOT EXISTS idx_contents_updated_at    ON contents(updated_at);
CREATE INDEX IF NOT EXISTS idx_contents_sort_order    ON contents(sort_order);
CREATE INDEX IF NOT EXISTS idx_access_logs_content_id ON access_logs(content_id);

PRAGMA user_version = {SCHEMA_VERSION};
"
  )
}

/// Content types absent from an existing table's `CHECK` constraint.
///
/// `table_sql` is the `CREATE TABLE` text SQLite keeps in `sqlite_master`.
pub fn missing_content_types(table_sql: &str) -> Vec<String> {
  ContentType::ALL
    .iter()
    .map(|t| t.as_str())
    .filter(|t| !table_sql.contains(&format!("'{t}'")))
    .map(str::to_owned)
    .collect()
}

/// Every column of `contents`, in the order `encode::raw_content` reads them.
pub const CONTENT_COLUMNS: &str = "id, uuid, name, description, content_type, blob_url, \
   thumbnail_url, metadata, tags, sort_order, created_at, updated_at";

/// Ordering shared by every listing query.
pub const CONTENT_ORDER: &str = "ORDER BY CASE WHEN sort_order IS NULL THEN 1 ELSE 0 END, \
   sort_order ASC, updated_at DESC, id DESC";

pub const SETTINGS_COLUMNS: &str = "id, site_name, show_download_link, page_title, \
   meta_description, created_at, updated_at";

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bootstrap_lists_every_content_type() {
    let sql = bootstrap_sql();
    assert!(missing_content_types(&sql).is_empty());
    assert!(sql.contains("PRAGMA user_version = 1;"));
  }

  #[test]
  fn legacy_constraint_without_story_book_is_detected() {
    let legacy = "CREATE TABLE contents (content_type TEXT CHECK (content_type IN \
                  ('character_card', 'knowledge_base', 'event_book', 'prompt_injection')))";
    assert_eq!(missing_content_types(legacy), ["story_book", "other"]);
  }
}
