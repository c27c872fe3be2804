//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are written in UTC as `YYYY-MM-DD HH:MM:SS.ffffff`, which
//! extends SQLite's `CURRENT_TIMESTAMP` format (still written by the earlier
//! deployment) so both compare correctly as text in `ORDER BY`. RFC 3339 is
//! accepted on read. Metadata and tags are compact JSON.

use chrono::{DateTime, NaiveDateTime, Utc};
use omate_core::{
  access::AccessLog,
  content::{Content, ContentType},
  metadata::ContentMetadata,
  settings::SiteSettings,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

const DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.format(DT_FORMAT).to_string() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
    .map(|naive| naive.and_utc())
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_required_dt(s: Option<&str>, column: &str) -> Result<DateTime<Utc>> {
  s.map(decode_dt)
    .transpose()?
    .ok_or_else(|| Error::DateParse(format!("{column} is NULL")))
}

// ─── Metadata & tags ─────────────────────────────────────────────────────────

pub fn encode_metadata(m: Option<&ContentMetadata>) -> Result<Option<String>> {
  m.map(|m| Ok(m.to_value()?.to_string())).transpose()
}

pub fn decode_metadata(
  content_type: ContentType,
  s: Option<&str>,
) -> Option<ContentMetadata> {
  let raw = s?;
  match serde_json::from_str(raw) {
    Ok(value) => ContentMetadata::from_stored(content_type, value),
    Err(e) => {
      tracing::warn!(error = %e, "metadata column is not valid JSON; ignoring");
      None
    }
  }
}

pub fn encode_tags(tags: &[String]) -> Result<String> {
  Ok(serde_json::to_string(tags)?)
}

pub fn decode_tags(s: Option<&str>) -> Vec<String> {
  let Some(raw) = s else { return Vec::new() };
  serde_json::from_str(raw).unwrap_or_else(|e| {
    tracing::warn!(error = %e, "tags column is not a JSON string array; ignoring");
    Vec::new()
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `contents` row.
pub struct RawContent {
  pub id:            i64,
  pub uuid:          Option<String>,
  pub name:          String,
  pub description:   Option<String>,
  pub content_type:  String,
  pub blob_url:      String,
  pub thumbnail_url: Option<String>,
  pub metadata:      Option<String>,
  pub tags:          Option<String>,
  pub sort_order:    Option<i32>,
  pub created_at:    Option<String>,
  pub updated_at:    Option<String>,
}

/// Read a row selected with [`crate::schema::CONTENT_COLUMNS`].
pub fn raw_content(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawContent> {
  Ok(RawContent {
    id:            row.get(0)?,
    uuid:          row.get(1)?,
    name:          row.get(2)?,
    description:   row.get(3)?,
    content_type:  row.get(4)?,
    blob_url:      row.get(5)?,
    thumbnail_url: row.get(6)?,
    metadata:      row.get(7)?,
    tags:          row.get(8)?,
    sort_order:    row.get(9)?,
    created_at:    row.get(10)?,
    updated_at:    row.get(11)?,
  })
}

impl RawContent {
  pub fn into_content(self) -> Result<Content> {
    let content_type = ContentType::parse(&self.content_type)?;
    Ok(Content {
      id: self.id,
      // Legacy rows may predate the external id; fall back to the row id.
      external_id: self.uuid.unwrap_or_else(|| self.id.to_string()),
      name: self.name,
      description: self.description.unwrap_or_default(),
      content_type,
      blob_url: self.blob_url,
      thumbnail_url: self.thumbnail_url,
      metadata: decode_metadata(content_type, self.metadata.as_deref()),
      tags: decode_tags(self.tags.as_deref()),
      sort_order: self.sort_order,
      created_at: decode_required_dt(self.created_at.as_deref(), "created_at")?,
      updated_at: decode_required_dt(self.updated_at.as_deref(), "updated_at")?,
    })
  }
}

/// Raw values read directly from a `site_settings` row.
pub struct RawSettings {
  pub id:                 i64,
  pub site_name:          Option<String>,
  pub show_download_link: Option<i64>,
  pub page_title:         Option<String>,
  pub meta_description:   Option<String>,
  pub created_at:         Option<String>,
  pub updated_at:         Option<String>,
}

/// Read a row selected with [`crate::schema::SETTINGS_COLUMNS`].
pub fn raw_settings(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSettings> {
  Ok(RawSettings {
    id:                 row.get(0)?,
    site_name:          row.get(1)?,
    show_download_link: row.get(2)?,
    page_title:         row.get(3)?,
    meta_description:   row.get(4)?,
    created_at:         row.get(5)?,
    updated_at:         row.get(6)?,
  })
}

impl RawSettings {
  pub fn into_settings(self) -> Result<SiteSettings> {
    use omate_core::settings::*;
    Ok(SiteSettings {
      id:                 self.id,
      site_name:          self.site_name.unwrap_or_else(|| DEFAULT_SITE_NAME.into()),
      show_download_link: self
        .show_download_link
        .map_or(DEFAULT_SHOW_DOWNLOAD_LINK, |v| v != 0),
      page_title:         self.page_title.unwrap_or_else(|| DEFAULT_PAGE_TITLE.into()),
      meta_description:   self
        .meta_description
        .unwrap_or_else(|| DEFAULT_META_DESCRIPTION.into()),
      created_at:         decode_required_dt(self.created_at.as_deref(), "created_at")?,
      updated_at:         decode_required_dt(self.updated_at.as_deref(), "updated_at")?,
    })
  }
}

/// Raw values read directly from an `access_logs` row.
pub struct RawAccessLog {
  pub id:          i64,
  pub content_id:  i64,
  pub access_type: String,
  pub ip_address:  Option<String>,
  pub user_agent:  Option<String>,
  pub created_at:  Option<String>,
}

pub fn raw_access_log(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawAccessLog> {
  Ok(RawAccessLog {
    id:          row.get(0)?,
    content_id:  row.get(1)?,
    access_type: row.get(2)?,
    ip_address:  row.get(3)?,
    user_agent:  row.get(4)?,
    created_at:  row.get(5)?,
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
      created_at:  decode_required_dt(self.created_at.as_deref(), "created_at")?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Timelike};

  use super::*;

  #[test]
  fn timestamps_round_trip_with_microseconds() {
    let dt = Utc.with_ymd_and_hms(2025, 3, 9, 12, 30, 5).unwrap()
      + chrono::Duration::microseconds(123_456);
    let encoded = encode_dt(dt);
    assert_eq!(encoded, "2025-03-09 12:30:05.123456");
    assert_eq!(decode_dt(&encoded).unwrap(), dt);
    assert_eq!(decode_dt("2025-03-09T12:30:05.123456Z").unwrap(), dt);
  }

  #[test]
  fn encoded_timestamps_sort_with_legacy_text() {
    let earlier = Utc.with_ymd_and_hms(2026, 10, 18, 5, 50, 25).unwrap()
      + chrono::Duration::microseconds(161_053);
    let legacy_later = "2026-10-18 06:50:25";
    assert!(encode_dt(earlier).as_str() < legacy_later);

    let same_second = Utc.with_ymd_and_hms(2026, 10, 18, 6, 50, 25).unwrap()
      + chrono::Duration::microseconds(1);
    assert!(encode_dt(same_second).as_str() > legacy_later);
  }

  #[test]
  fn legacy_current_timestamp_format_is_accepted() {
    let dt = decode_dt("2024-11-02 08:15:00").unwrap();
    assert_eq!(dt.hour(), 8);
    assert_eq!(dt, Utc.with_ymd_and_hms(2024, 11, 2, 8, 15, 0).unwrap());
  }

  #[test]
  fn garbage_timestamps_are_errors() {
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
  }

  #[test]
  fn broken_tags_and_metadata_decode_to_empty() {
    assert!(decode_tags(Some("not json")).is_empty());
    assert!(decode_tags(None).is_empty());
    assert_eq!(decode_tags(Some(r#"["a","b"]"#)), ["a", "b"]);
    assert!(decode_metadata(ContentType::Other, Some("{oops")).is_none());
  }
}
