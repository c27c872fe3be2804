//! SQL schema for the OMateShare PostgreSQL store.
//!
//! Applied by `ensure_schema()` in one transaction that first takes a
//! transaction-scoped advisory lock, so concurrent cold starts serialise and
//! the losers find everything already in place. Every statement is
//! idempotent. The version is recorded in `omate_schema_version`.
//!
//! Table and column definitions match databases created by the earlier
//! deployment, which can therefore be adopted in place.

use omate_core::{
  content::ContentType,
  repository::SCHEMA_VERSION,
  settings::{
    DEFAULT_META_DESCRIPTION, DEFAULT_PAGE_TITLE, DEFAULT_SHOW_DOWNLOAD_LINK,
    DEFAULT_SITE_NAME,
  },
};

/// Advisory lock key held while bootstrapping ("omate" in ASCII).
pub const BOOTSTRAP_LOCK: i64 = 0x6f_6d_61_74_65;

pub const VERSION_TABLE_EXISTS: &str =
  "SELECT to_regclass('omate_schema_version') IS NOT NULL";

pub const CONTENTS_EXISTS: &str = "SELECT to_regclass('contents') IS NOT NULL";

pub const CURRENT_VERSION: &str = "SELECT MAX(version) FROM omate_schema_version";

/// Labels of the `content_type` enum, empty when the type does not exist.
pub const ENUM_LABELS: &str = "SELECT e.enumlabel::text
   FROM pg_enum e JOIN pg_type t ON t.oid = e.enumtypid
   WHERE t.typname = 'content_type'
   ORDER BY e.enumsortorder";

/// Full bootstrap DDL, run with the simple query protocol.
pub fn bootstrap_sql() -> String {
  let content_types = ContentType::ALL
    .iter()
    .map(|t| format!("'{}'", t.as_str()))
    .collect::<Vec<_>>()
    .join(", ");

  format!(
    "
DO $$
BEGIN
    IF NOT EXISTS (SELECT 1 FROM pg_type WHERE typname = 'content_type') THEN
        CREATE TYPE content_type AS ENUM ({content_types});
    END IF;
END$$;

CREATE TABLE IF NOT EXISTS contents (
    id            SERIAL PRIMARY KEY,
    uuid          VARCHAR(36) UNIQUE,
    name          VARCHAR(255) NOT NULL,
    description   TEXT,
    content_type  content_type NOT NULL,
    blob_url      TEXT NOT NULL,
    thumbnail_url TEXT,
    metadata      JSONB,
    tags          TEXT[],
    sort_order    INTEGER,
    created_at    TIMESTAMP WITH TIME ZONE DEFAULT CURRENT_TIMESTAMP,
    updated_at    TIMESTAMP WITH TIME ZONE DEFAULT CURRENT_TIMESTAMP
);

-- Rows are removed explicitly before their content row; no cascade.
CREATE TABLE IF NOT EXISTS access_logs (
    id          SERIAL PRIMARY KEY,
    content_id  INTEGER REFERENCES contents(id),
    access_type VARCHAR(50) NOT NULL,
    ip_address  VARCHAR(100),
    user_agent  TEXT,
    created_at  TIMESTAMP WITH TIME ZONE DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS site_settings (
    id                 SERIAL PRIMARY KEY,
    site_name          VARCHAR(255) DEFAULT '{DEFAULT_SITE_NAME}',
    show_download_link BOOLEAN DEFAULT {DEFAULT_SHOW_DOWNLOAD_LINK},
    page_title         VARCHAR(255) DEFAULT '{DEFAULT_PAGE_TITLE}',
    meta_description   TEXT DEFAULT '{DEFAULT_META_DESCRIPTION}',
    created_at         TIMESTAMP WITH TIME ZONE DEFAULT CURRENT_TIMESTAMP,
    updated_at         TIMESTAMP WITH TIME ZONE DEFAULT CURRENT_TIMESTAMP
);

INSERT INTO site_settings (site_name, show_download_link, page_title, meta_description)
SELECT '{DEFAULT_SITE_NAME}', {DEFAULT_SHOW_DOWNLOAD_LINK}, '{DEFAULT_PAGE_TITLE}', '{DEFAULT_META_DESCRIPTION}'
WHERE NOT EXISTS (SELECT 1 FROM site_settings);

CREATE INDEX IF NOT EXISTS idx_contents_content_type  ON contents(content_type);
CREATE INDEX IF NOT EXISTS idx_contents_created_at    ON contents(created_at);
CREATE INDEX IF NOT EXISTS idx_contents_updated_at    ON contents(updated_at);
CREATE INDEX IF NOT EXISTS idx_contents_sort_order    ON contents(sort_order);
CREATE INDEX IF NOT EXISTS idx_access_logs_content_id ON access_logs(content_id);

CREATE TABLE IF NOT EXISTS omate_schema_version (
    version    INTEGER PRIMARY KEY,
    applied_at TIMESTAMP WITH TIME ZONE DEFAULT CURRENT_TIMESTAMP
);

INSERT INTO omate_schema_version (version) VALUES ({SCHEMA_VERSION})
ON CONFLICT (version) DO NOTHING;
"
  )
}

/// Content types absent from the labels of an existing enum.
pub fn missing_content_types(labels: &[String]) -> Vec<String> {
  ContentType::ALL
    .iter()
    .map(|t| t.as_str())
    .filter(|t| !labels.iter().any(|l| l == t))
    .map(str::to_owned)
    .collect()
}

/// Every column of `contents`, in the order `decode::raw_content` reads them.
/// Ids are widened to `BIGINT` and the enum is read back as text.
pub const CONTENT_COLUMNS: &str = "id::int8 AS id, uuid, name, description, \
   content_type::text AS content_type, blob_url, thumbnail_url, metadata, tags, \
   sort_order, created_at, updated_at";

/// Ordering shared by every listing query.
pub const CONTENT_ORDER: &str =
  "ORDER BY sort_order ASC NULLS LAST, updated_at DESC, id DESC";

pub const SETTINGS_COLUMNS: &str = "id::int8 AS id, site_name, show_download_link, \
   page_title, meta_description, created_at, updated_at";

pub const ACCESS_LOG_COLUMNS: &str = "id::int8 AS id, content_id::int8 AS content_id, \
   access_type, ip_address, user_agent, created_at";

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bootstrap_creates_every_content_type_and_records_the_version() {
    let sql = bootstrap_sql();
    for t in ContentType::ALL {
      assert!(sql.contains(&format!("'{}'", t.as_str())), "{t} missing");
    }
    assert!(sql.contains(&format!("VALUES ({SCHEMA_VERSION})")));
    assert!(sql.contains("show_download_link BOOLEAN DEFAULT true"));
  }

  #[test]
  fn missing_types_are_detected_from_enum_labels() {
    let labels: Vec<String> = ["character_card", "knowledge_base", "event_book", "other"]
      .into_iter()
      .map(String::from)
      .collect();
    assert_eq!(
      missing_content_types(&labels),
      vec!["prompt_injection".to_owned(), "story_book".to_owned()]
    );
    let all: Vec<String> = ContentType::ALL.iter().map(|t| t.as_str().to_owned()).collect();
    assert!(missing_content_types(&all).is_empty());
  }
}
