//! Row decoding from Postgres values into domain types.
//!
//! Timestamps arrive as `TIMESTAMPTZ`, metadata as `JSONB` and tags as
//! `TEXT[]`, so no string parsing happens here. Legacy rows may carry
//! `NULL` in columns the domain treats as required; those fall back to
//! defaults the same way the SQLite backend does.

use chrono::{DateTime, Utc};
use omate_core::{
  access::AccessLog,
  content::{Content, ContentType},
  metadata::ContentMetadata,
  settings::SiteSettings,
};
use serde_json::Value;
use sqlx::{Row as _, postgres::PgRow};

use crate::{Error, Result};

fn required_dt(dt: Option<DateTime<Utc>>, column: &'static str) -> Result<DateTime<Utc>> {
  dt.ok_or(Error::MissingTimestamp { column })
}

// ─── contents ────────────────────────────────────────────────────────────────

/// Raw values read from a `contents` row.
pub struct RawContent {
  pub id:            i64,
  pub uuid:          Option<String>,
  pub name:          String,
  pub description:   Option<String>,
  pub content_type:  String,
  pub blob_url:      String,
  pub thumbnail_url: Option<String>,
  pub metadata:      Option<Value>,
  pub tags:          Option<Vec<Option<String>>>,
  pub sort_order:    Option<i32>,
  pub created_at:    Option<DateTime<Utc>>,
  pub updated_at:    Option<DateTime<Utc>>,
}

/// Read a row selected with [`crate::schema::CONTENT_COLUMNS`].
pub fn raw_content(row: &PgRow) -> sqlx::Result<RawContent> {
  Ok(RawContent {
    id:            row.try_get("id")?,
    uuid:          row.try_get("uuid")?,
    name:          row.try_get("name")?,
    description:   row.try_get("description")?,
    content_type:  row.try_get("content_type")?,
    blob_url:      row.try_get("blob_url")?,
    thumbnail_url: row.try_get("thumbnail_url")?,
    metadata:      row.try_get("metadata")?,
    tags:          row.try_get("tags")?,
    sort_order:    row.try_get("sort_order")?,
    created_at:    row.try_get("created_at")?,
    updated_at:    row.try_get("updated_at")?,
  })
}

impl RawContent {
  pub fn into_content(self) -> Result<Content> {
    let content_type = ContentType::parse(&self.content_type)?;
    Ok(Content {
      id: self.id,
      external_id: self.uuid.unwrap_or_else(|| self.id.to_string()),
      name: self.name,
      description: self.description.unwrap_or_default(),
      content_type,
      blob_url: self.blob_url,
      thumbnail_url: self.thumbnail_url,
      metadata: self
        .metadata
        .and_then(|value| ContentMetadata::from_stored(content_type, value)),
      // Array elements may be NULL in hand-edited rows.
      tags: self.tags.unwrap_or_default().into_iter().flatten().collect(),
      sort_order: self.sort_order,
      created_at: required_dt(self.created_at, "created_at")?,
      updated_at: required_dt(self.updated_at, "updated_at")?,
    })
  }
}

// ─── site_settings ───────────────────────────────────────────────────────────

pub struct RawSettings {
  pub id:                 i64,
  pub site_name:          Option<String>,
  pub show_download_link: Option<bool>,
  pub page_title:         Option<String>,
  pub meta_description:   Option<String>,
  pub created_at:         Option<DateTime<Utc>>,
  pub updated_at:         Option<DateTime<Utc>>,
}

pub fn raw_settings(row: &PgRow) -> sqlx::Result<RawSettings> {
  Ok(RawSettings {
    id:                 row.try_get("id")?,
    site_name:          row.try_get("site_name")?,
    show_download_link: row.try_get("show_download_link")?,
    page_title:         row.try_get("page_title")?,
    meta_description:   row.try_get("meta_description")?,
    created_at:         row.try_get("created_at")?,
    updated_at:         row.try_get("updated_at")?,
  })
}

impl RawSettings {
  pub fn into_settings(self) -> Result<SiteSettings> {
    use omate_core::settings::*;
    Ok(SiteSettings {
      id:                 self.id,
      site_name:          self.site_name.unwrap_or_else(|| DEFAULT_SITE_NAME.into()),
      show_download_link: self.show_download_link.unwrap_or(DEFAULT_SHOW_DOWNLOAD_LINK),
      page_title:         self.page_title.unwrap_or_else(|| DEFAULT_PAGE_TITLE.into()),
      meta_description:   self
        .meta_description
        .unwrap_or_else(|| DEFAULT_META_DESCRIPTION.into()),
      created_at:         required_dt(self.created_at, "created_at")?,
      updated_at:         required_dt(self.updated_at, "updated_at")?,
    })
  }
}

// ─── access_logs ─────────────────────────────────────────────────────────────

pub struct RawAccessLog {
  pub id:          i64,
  pub content_id:  i64,
  pub access_type: String,
  pub ip_address:  Option<String>,
  pub user_agent:  Option<String>,
  pub created_at:  Option<DateTime<Utc>>,
}

pub fn raw_access_log(row: &PgRow) -> sqlx::Result<RawAccessLog> {
  Ok(RawAccessLog {
    id:          row.try_get("id")?,
    content_id:  row.try_get("content_id")?,
    access_type: row.try_get("access_type")?,
    ip_address:  row.try_get("ip_address")?,
    user_agent:  row.try_get("user_agent")?,
    created_at:  row.try_get("created_at")?,
  })
}

impl RawAccessLog {
  pub fn into_access_log(self) -> Result<AccessLog> {
    Ok(AccessLog {
      id:          self.id,
      content_id:  self.content_id,
      access_type: self.access_type,
      ip_address:  self.ip_address,
      user_agent:  self.user_agent,
      created_at:  required_dt(self.created_at, "created_at")?,
    })
  }
}
