//! [`SqliteRepository`]: the SQLite implementation of [`ContentRepository`].

use std::path::Path;

use chrono::Utc;
use omate_core::{
  access::{AccessLog, NewAccessLog},
  config::SqliteLocation,
  content::{Content, ContentPatch, ContentType, NewContent},
  repository::{ContentRepository, SCHEMA_VERSION, parse_ids},
  settings::{SiteSettings, SiteSettingsPatch},
};
use rusqlite::{OptionalExtension as _, TransactionBehavior, types::Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RawAccessLog, RawContent, encode_dt, encode_metadata, encode_tags,
    raw_access_log, raw_content, raw_settings,
  },
  schema::{
    BUSY_TIMEOUT, CONTENT_COLUMNS, CONTENT_ORDER, JOURNAL_MODE,
    SETTINGS_COLUMNS, TABLE_EXISTS, bootstrap_sql, missing_content_types,
  },
};

/// Upper bound on bound parameters per `IN (…)` query.
const IN_CHUNK: usize = 500;

// ─── Repository ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct State {
  conn:  Option<tokio_rusqlite::Connection>,
  ready: bool,
}

/// An OMateShare content repository backed by one SQLite database.
///
/// Construction does no I/O. Call [`connect`](ContentRepository::connect)
/// and [`ensure_schema`](ContentRepository::ensure_schema) before use, or use
/// [`SqliteRepository::open`] which does both.
///
/// An in-memory database lives exactly as long as its connection; a
/// `disconnect()` discards it.
pub struct SqliteRepository {
  location:   SqliteLocation,
  access_log: bool,
  state:      RwLock<State>,
}

impl SqliteRepository {
  pub fn new(location: SqliteLocation) -> Self {
    Self {
      location,
      access_log: true,
      state: RwLock::new(State::default()),
    }
  }

  /// Enable or disable writes to `access_logs`. Enabled by default.
  pub fn with_access_log(mut self, enabled: bool) -> Self {
    self.access_log = enabled;
    self
  }

  /// Open (or create) a repository at `path`, connect and bootstrap it.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let repo = Self::new(SqliteLocation::File(path.as_ref().to_path_buf()));
    repo.connect().await?;
    repo.ensure_schema().await?;
    Ok(repo)
  }

  /// Open a bootstrapped in-memory repository, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let repo = Self::new(SqliteLocation::Memory);
    repo.connect().await?;
    repo.ensure_schema().await?;
    Ok(repo)
  }

  pub fn location(&self) -> &SqliteLocation { &self.location }

  /// The open connection, whether or not the schema is ready.
  async fn connection(&self) -> Result<tokio_rusqlite::Connection> {
    self
      .state
      .read()
      .await
      .conn
      .clone()
      .ok_or(Error::NotInitialized)
  }

  /// The open connection of a fully initialised repository.
  pub(crate) async fn ready(&self) -> Result<tokio_rusqlite::Connection> {
    let state = self.state.read().await;
    match (&state.conn, state.ready) {
      (Some(conn), true) => Ok(conn.clone()),
      _ => Err(Error::NotInitialized),
    }
  }

  async fn open_connection(&self) -> Result<tokio_rusqlite::Connection> {
    let (conn, on_disk) = match &self.location {
      SqliteLocation::Memory => {
        (tokio_rusqlite::Connection::open_in_memory().await?, false)
      }
      SqliteLocation::File(path) => {
        create_parent_dir(path).await?;
        (tokio_rusqlite::Connection::open(path).await?, true)
      }
    };

    conn
      .call(move |conn| {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        if on_disk {
          let _mode: String = conn.query_row(JOURNAL_MODE, [], |r| r.get(0))?;
        }
        Ok(())
      })
      .await?;
    Ok(conn)
  }

  async fn fetch(&self, id: i64) -> Result<Option<Content>> {
    let conn = self.ready().await?;
    let raw = conn
      .call(move |conn| Ok(select_content(conn, id)?))
      .await?;
    raw.map(RawContent::into_content).transpose()
  }
}

async fn create_parent_dir(path: &Path) -> Result<()> {
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    tokio::fs::create_dir_all(parent).await?;
  }
  Ok(())
}

fn select_content(
  conn: &rusqlite::Connection,
  id: i64,
) -> rusqlite::Result<Option<RawContent>> {
  conn
    .query_row(
      &format!("SELECT {CONTENT_COLUMNS} FROM contents WHERE id = ?1"),
      rusqlite::params![id],
      raw_content,
    )
    .optional()
}

fn text_or_null(value: Option<String>) -> Value {
  value.map_or(Value::Null, Value::Text)
}

/// What `ensure_schema` found before applying the bootstrap DDL.
enum Bootstrap {
  Fresh,
  Adopted { from_version: u32 },
  Current,
  TooNew(u32),
  MissingTypes(Vec<String>),
}

// ─── ContentRepository impl ──────────────────────────────────────────────────

impl ContentRepository for SqliteRepository {
  type Error = Error;

  // ── Lifecycle ─────────────────────────────────────────────────────────────

  async fn connect(&self) -> Result<()> {
    let mut state = self.state.write().await;
    if state.conn.is_some() {
      return Ok(());
    }
    state.conn = Some(self.open_connection().await?);
    tracing::info!(location = ?self.location, "connected to sqlite");
    Ok(())
  }

  async fn disconnect(&self) -> Result<()> {
    let mut state = self.state.write().await;
    state.ready = false;
    if let Some(conn) = state.conn.take() {
      conn.close().await?;
      tracing::info!(location = ?self.location, "disconnected from sqlite");
    }
    Ok(())
  }

  async fn ensure_schema(&self) -> Result<()> {
    let conn = self.connection().await?;

    let outcome = conn
      .call(|conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let version: u32 =
          tx.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        if version > SCHEMA_VERSION {
          return Ok(Bootstrap::TooNew(version));
        }

        let existing: Option<String> = tx
          .query_row(TABLE_EXISTS, [], |r| r.get(0))
          .optional()?;
        if let Some(table_sql) = &existing {
          let missing = missing_content_types(table_sql);
          if !missing.is_empty() {
            return Ok(Bootstrap::MissingTypes(missing));
          }
        }

        tx.execute_batch(&bootstrap_sql())?;
        tx.commit()?;

        Ok(match (existing, version) {
          (None, _) => Bootstrap::Fresh,
          (Some(_), v) if v == SCHEMA_VERSION => Bootstrap::Current,
          (Some(_), v) => Bootstrap::Adopted { from_version: v },
        })
      })
      .await?;

    match outcome {
      Bootstrap::TooNew(found) => {
        return Err(Error::UnsupportedSchemaVersion {
          found,
          supported: SCHEMA_VERSION,
        });
      }
      Bootstrap::MissingTypes(missing) => {
        tracing::error!(?missing, "contents table rejects known content types");
        return Err(Error::MissingContentTypes(missing));
      }
      Bootstrap::Fresh => tracing::info!(version = SCHEMA_VERSION, "created schema"),
      Bootstrap::Adopted { from_version } => tracing::info!(
        from_version,
        version = SCHEMA_VERSION,
        "adopted existing schema"
      ),
      Bootstrap::Current => tracing::debug!("schema already current"),
    }

    let mut state = self.state.write().await;
    if state.conn.is_some() {
      state.ready = true;
    }
    Ok(())
  }

  async fn schema_version(&self) -> Result<Option<u32>> {
    let conn = self.connection().await?;
    let version: u32 = conn
      .call(|conn| Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?))
      .await?;
    Ok((version > 0).then_some(version))
  }

  // ── Content ───────────────────────────────────────────────────────────────

  async fn list(&self, content_type: Option<ContentType>) -> Result<Vec<Content>> {
    let conn = self.ready().await?;
    let type_str = content_type.map(ContentType::as_str);

    let raws: Vec<RawContent> = conn
      .call(move |conn| {
        let rows = if let Some(t) = type_str {
          let mut stmt = conn.prepare(&format!(
            "SELECT {CONTENT_COLUMNS} FROM contents WHERE content_type = ?1 {CONTENT_ORDER}"
          ))?;
          stmt
            .query_map(rusqlite::params![t], raw_content)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn
            .prepare(&format!("SELECT {CONTENT_COLUMNS} FROM contents {CONTENT_ORDER}"))?;
          stmt
            .query_map([], raw_content)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContent::into_content).collect()
  }

  async fn get(&self, id: i64) -> Result<Option<Content>> { self.fetch(id).await }

  async fn get_many<'a>(&'a self, ids: &'a [String]) -> Result<Vec<Content>> {
    let conn = self.ready().await?;
    let ids = parse_ids(ids);
    if ids.is_empty() {
      return Ok(Vec::new());
    }

    let raws: Vec<RawContent> = conn
      .call(move |conn| {
        let mut out = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(IN_CHUNK) {
          let placeholders = vec!["?"; chunk.len()].join(", ");
          let mut stmt = conn.prepare(&format!(
            "SELECT {CONTENT_COLUMNS} FROM contents WHERE id IN ({placeholders})"
          ))?;
          let rows = stmt
            .query_map(rusqlite::params_from_iter(chunk.iter()), raw_content)?;
          for row in rows {
            out.push(row?);
          }
        }
        Ok(out)
      })
      .await?;

    raws.into_iter().map(RawContent::into_content).collect()
  }

  async fn create(&self, input: NewContent) -> Result<Content> {
    let conn = self.ready().await?;
    let input = input.validated()?;

    let uuid          = Uuid::new_v4().simple().to_string();
    let now           = encode_dt(Utc::now());
    let content_type  = input.content_type.as_str();
    let metadata_str  = encode_metadata(input.metadata.as_ref())?;
    let tags_str      = encode_tags(&input.tags)?;
    let description   = input.description.unwrap_or_default();
    let name          = input.name;
    let blob_url      = input.blob_url;
    let thumbnail_url = input.thumbnail_url;

    let raw: RawContent = conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO contents (
             uuid, name, description, content_type, blob_url, thumbnail_url,
             metadata, tags, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
          rusqlite::params![
            uuid,
            name,
            description,
            content_type,
            blob_url,
            thumbnail_url,
            metadata_str,
            tags_str,
            now,
          ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(conn.query_row(
          &format!("SELECT {CONTENT_COLUMNS} FROM contents WHERE id = ?1"),
          rusqlite::params![id],
          raw_content,
        )?)
      })
      .await?;

    let content = raw.into_content()?;
    tracing::debug!(id = content.id, content_type = %content.content_type, "created content");
    Ok(content)
  }

  async fn update(&self, id: i64, patch: ContentPatch) -> Result<Option<Content>> {
    let Some(current) = self.fetch(id).await? else {
      return Ok(None);
    };
    if patch.is_empty() {
      return Ok(Some(current));
    }
    let patch = patch.validated(current.content_type)?;

    let mut sets: Vec<&'static str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    if let Some(name) = patch.name {
      sets.push("name = ?");
      values.push(Value::Text(name));
    }
    if let Some(description) = patch.description {
      sets.push("description = ?");
      values.push(Value::Text(description));
    }
    if let Some(blob_url) = patch.blob_url {
      sets.push("blob_url = ?");
      values.push(Value::Text(blob_url));
    }
    if let Some(thumbnail_url) = patch.thumbnail_url {
      sets.push("thumbnail_url = ?");
      values.push(text_or_null(thumbnail_url));
    }
    if let Some(metadata) = patch.metadata {
      sets.push("metadata = ?");
      values.push(text_or_null(encode_metadata(metadata.as_ref())?));
    }
    if let Some(tags) = patch.tags {
      sets.push("tags = ?");
      values.push(Value::Text(encode_tags(&tags)?));
    }
    sets.push("updated_at = ?");
    values.push(Value::Text(encode_dt(Utc::now())));
    values.push(Value::Integer(id));

    let sql = format!("UPDATE contents SET {} WHERE id = ?", sets.join(", "));
    let conn = self.ready().await?;
    let raw: Option<RawContent> = conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(&sql, rusqlite::params_from_iter(values))?;
        let raw = if changed == 0 { None } else { select_content(&tx, id)? };
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawContent::into_content).transpose()
  }

  async fn delete(&self, id: i64) -> Result<Option<Content>> {
    let conn = self.ready().await?;

    let raw: Option<RawContent> = conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(raw) = select_content(&tx, id)? else {
          return Ok(None);
        };
        tx.execute(
          "DELETE FROM access_logs WHERE content_id = ?1",
          rusqlite::params![id],
        )?;
        tx.execute("DELETE FROM contents WHERE id = ?1", rusqlite::params![id])?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    let content = raw.map(RawContent::into_content).transpose()?;
    if content.is_some() {
      tracing::debug!(id, "deleted content");
    }
    Ok(content)
  }

  async fn set_sort_order(&self, id: i64, sort_order: i32) -> Result<Option<Content>> {
    let conn = self.ready().await?;
    let now = encode_dt(Utc::now());

    let raw: Option<RawContent> = conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE contents SET sort_order = ?1, updated_at = ?2 WHERE id = ?3",
          rusqlite::params![sort_order, now, id],
        )?;
        let raw = if changed == 0 { None } else { select_content(&tx, id)? };
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawContent::into_content).transpose()
  }

  async fn reset_sort_order(&self, content_type: ContentType) -> Result<u64> {
    let conn = self.ready().await?;
    let type_str = content_type.as_str();

    let changed = conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE contents SET sort_order = NULL
           WHERE content_type = ?1 AND sort_order IS NOT NULL",
          rusqlite::params![type_str],
        )?)
      })
      .await?;

    tracing::info!(%content_type, changed, "reset sort order");
    Ok(changed as u64)
  }

  // ── Access log ────────────────────────────────────────────────────────────

  async fn log_access(&self, entry: NewAccessLog) -> Result<Option<i64>> {
    if !self.access_log {
      return Ok(None);
    }
    let conn = self.ready().await?;
    let now = encode_dt(Utc::now());

    let id = conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO access_logs (content_id, access_type, ip_address, user_agent, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            entry.content_id,
            entry.access_type,
            entry.ip_address,
            entry.user_agent,
            now,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Some(id))
  }

  async fn access_logs(&self, content_id: i64) -> Result<Vec<AccessLog>> {
    let conn = self.ready().await?;

    let raws: Vec<RawAccessLog> = conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, content_id, access_type, ip_address, user_agent, created_at
           FROM access_logs WHERE content_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![content_id], raw_access_log)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAccessLog::into_access_log).collect()
  }

  // ── Site settings ─────────────────────────────────────────────────────────

  async fn site_settings(&self) -> Result<SiteSettings> {
    let conn = self.ready().await?;
    let raw = conn
      .call(|conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {SETTINGS_COLUMNS} FROM site_settings ORDER BY id LIMIT 1"),
            [],
            raw_settings,
          )
          .optional()?)
      })
      .await?;

    raw.ok_or(Error::MissingSettings)?.into_settings()
  }

  async fn update_site_settings(&self, patch: SiteSettingsPatch) -> Result<SiteSettings> {
    let current = self.site_settings().await?;
    if patch.is_empty() {
      return Ok(current);
    }

    let mut sets: Vec<&'static str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    if let Some(site_name) = patch.site_name {
      sets.push("site_name = ?");
      values.push(Value::Text(site_name));
    }
    if let Some(show) = patch.show_download_link {
      sets.push("show_download_link = ?");
      values.push(Value::Integer(i64::from(show)));
    }
    if let Some(page_title) = patch.page_title {
      sets.push("page_title = ?");
      values.push(Value::Text(page_title));
    }
    if let Some(meta_description) = patch.meta_description {
      sets.push("meta_description = ?");
      values.push(Value::Text(meta_description));
    }
    sets.push("updated_at = ?");
    values.push(Value::Text(encode_dt(Utc::now())));
    values.push(Value::Integer(current.id));

    let sql = format!("UPDATE site_settings SET {} WHERE id = ?", sets.join(", "));
    let conn = self.ready().await?;
    let raw = conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(&sql, rusqlite::params_from_iter(values))?;
        let raw = tx
          .query_row(
            &format!("SELECT {SETTINGS_COLUMNS} FROM site_settings WHERE id = ?1"),
            rusqlite::params![current.id],
            raw_settings,
          )
          .optional()?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.ok_or(Error::MissingSettings)?.into_settings()
  }
}
