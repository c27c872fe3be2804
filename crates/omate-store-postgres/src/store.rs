//! [`PostgresRepository`]: the PostgreSQL implementation of
//! [`ContentRepository`].

use std::time::Duration;

use chrono::Utc;
use omate_core::{
  access::{AccessLog, NewAccessLog},
  content::{Content, ContentPatch, ContentType, NewContent},
  repository::{ContentRepository, SCHEMA_VERSION, parse_ids},
  settings::{SiteSettings, SiteSettingsPatch},
};
use sqlx::{
  PgPool, Postgres, QueryBuilder,
  postgres::{PgPoolOptions, PgRow},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
  Error, Result,
  decode::{RawContent, raw_access_log, raw_content, raw_settings},
  schema::{
    ACCESS_LOG_COLUMNS, BOOTSTRAP_LOCK, CONTENT_COLUMNS, CONTENT_ORDER,
    CONTENTS_EXISTS, CURRENT_VERSION, ENUM_LABELS, SETTINGS_COLUMNS,
    VERSION_TABLE_EXISTS, bootstrap_sql, missing_content_types,
  },
};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

// ─── Repository ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct State {
  pool:  Option<PgPool>,
  ready: bool,
}

/// An OMateShare content repository backed by a PostgreSQL database.
///
/// Construction does no I/O. Call [`connect`](ContentRepository::connect)
/// and [`ensure_schema`](ContentRepository::ensure_schema) before use, or use
/// [`PostgresRepository::open`].
pub struct PostgresRepository {
  url:             String,
  max_connections: u32,
  access_log:      bool,
  state:           RwLock<State>,
}

impl PostgresRepository {
  pub fn new(url: impl Into<String>) -> Self {
    Self {
      url:             url.into(),
      max_connections: DEFAULT_MAX_CONNECTIONS,
      access_log:      true,
      state:           RwLock::new(State::default()),
    }
  }

  /// Enable or disable writes to `access_logs`. Enabled by default.
  pub fn with_access_log(mut self, enabled: bool) -> Self {
    self.access_log = enabled;
    self
  }

  pub fn with_max_connections(mut self, max: u32) -> Self {
    self.max_connections = max.max(1);
    self
  }

  /// Connect to `url` and bootstrap the schema.
  pub async fn open(url: impl Into<String>) -> Result<Self> {
    let repo = Self::new(url);
    repo.connect().await?;
    repo.ensure_schema().await?;
    Ok(repo)
  }

  /// The pool, whether or not the schema is ready.
  async fn pool(&self) -> Result<PgPool> {
    self.state.read().await.pool.clone().ok_or(Error::NotInitialized)
  }

  /// The pool of a fully initialised repository.
  pub(crate) async fn ready(&self) -> Result<PgPool> {
    let state = self.state.read().await;
    match (&state.pool, state.ready) {
      (Some(pool), true) => Ok(pool.clone()),
      _ => Err(Error::NotInitialized),
    }
  }

  async fn fetch(&self, id: i64) -> Result<Option<Content>> {
    let pool = self.ready().await?;
    let sql = format!("SELECT {CONTENT_COLUMNS} FROM contents WHERE id = $1");
    let row = sqlx::query(&sql).bind(id).fetch_optional(&pool).await?;
    decode_content(row)
  }
}

fn decode_content(row: Option<PgRow>) -> Result<Option<Content>> {
  row
    .as_ref()
    .map(raw_content)
    .transpose()?
    .map(RawContent::into_content)
    .transpose()
}

fn decode_contents(rows: Vec<PgRow>) -> Result<Vec<Content>> {
  rows
    .iter()
    .map(|row| raw_content(row)?.into_content())
    .collect()
}

/// What `ensure_schema` found before applying the bootstrap DDL.
enum Bootstrap {
  Fresh,
  Adopted { from_version: u32 },
  Current,
  TooNew(u32),
  MissingTypes(Vec<String>),
}

async fn bootstrap(pool: &PgPool) -> Result<Bootstrap> {
  let mut tx = pool.begin().await?;
  sqlx::query("SELECT pg_advisory_xact_lock($1)")
    .bind(BOOTSTRAP_LOCK)
    .execute(&mut *tx)
    .await?;

  let versioned = sqlx::query_scalar::<_, bool>(VERSION_TABLE_EXISTS)
    .fetch_one(&mut *tx)
    .await?;
  let version = if versioned {
    sqlx::query_scalar::<_, Option<i32>>(CURRENT_VERSION)
      .fetch_one(&mut *tx)
      .await?
      .and_then(|v| u32::try_from(v).ok())
      .unwrap_or(0)
  } else {
    0
  };
  if version > SCHEMA_VERSION {
    return Ok(Bootstrap::TooNew(version));
  }

  let existing = sqlx::query_scalar::<_, bool>(CONTENTS_EXISTS)
    .fetch_one(&mut *tx)
    .await?;
  let labels = sqlx::query_scalar::<_, String>(ENUM_LABELS)
    .fetch_all(&mut *tx)
    .await?;
  if !labels.is_empty() {
    let missing = missing_content_types(&labels);
    if !missing.is_empty() {
      return Ok(Bootstrap::MissingTypes(missing));
    }
  }

  let ddl = bootstrap_sql();
  sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(&ddl)).await?;
  tx.commit().await?;

  Ok(match (existing, version) {
    (false, _) => Bootstrap::Fresh,
    (true, v) if v == SCHEMA_VERSION => Bootstrap::Current,
    (true, v) => Bootstrap::Adopted { from_version: v },
  })
}

// ─── ContentRepository impl ──────────────────────────────────────────────────

impl ContentRepository for PostgresRepository {
  type Error = Error;

  // ── Lifecycle ─────────────────────────────────────────────────────────────

  async fn connect(&self) -> Result<()> {
    let mut state = self.state.write().await;
    if state.pool.is_some() {
      return Ok(());
    }
    let pool = PgPoolOptions::new()
      .max_connections(self.max_connections)
      .acquire_timeout(ACQUIRE_TIMEOUT)
      .connect(&self.url)
      .await?;
    state.pool = Some(pool);
    tracing::info!(max_connections = self.max_connections, "connected to postgres");
    Ok(())
  }

  async fn disconnect(&self) -> Result<()> {
    let mut state = self.state.write().await;
    state.ready = false;
    if let Some(pool) = state.pool.take() {
      pool.close().await;
      tracing::info!("disconnected from postgres");
    }
    Ok(())
  }

  async fn ensure_schema(&self) -> Result<()> {
    let pool = self.pool().await?;

    match bootstrap(&pool).await? {
      Bootstrap::TooNew(found) => {
        return Err(Error::UnsupportedSchemaVersion {
          found,
          supported: SCHEMA_VERSION,
        });
      }
      Bootstrap::MissingTypes(missing) => {
        tracing::error!(?missing, "content_type enum lacks known content types");
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
    if state.pool.is_some() {
      state.ready = true;
    }
    Ok(())
  }

  async fn schema_version(&self) -> Result<Option<u32>> {
    let pool = self.pool().await?;
    let versioned = sqlx::query_scalar::<_, bool>(VERSION_TABLE_EXISTS)
      .fetch_one(&pool)
      .await?;
    if !versioned {
      return Ok(None);
    }
    let version = sqlx::query_scalar::<_, Option<i32>>(CURRENT_VERSION)
      .fetch_one(&pool)
      .await?;
    Ok(version.and_then(|v| u32::try_from(v).ok()).filter(|v| *v > 0))
  }

  // ── Content ───────────────────────────────────────────────────────────────

  async fn list(&self, content_type: Option<ContentType>) -> Result<Vec<Content>> {
    let pool = self.ready().await?;

    let rows = match content_type {
      Some(t) => {
        let sql = format!(
          "SELECT {CONTENT_COLUMNS} FROM contents
           WHERE content_type = $1::content_type {CONTENT_ORDER}"
        );
        sqlx::query(&sql).bind(t.as_str()).fetch_all(&pool).await?
      }
      None => {
        let sql = format!("SELECT {CONTENT_COLUMNS} FROM contents {CONTENT_ORDER}");
        sqlx::query(&sql).fetch_all(&pool).await?
      }
    };

    decode_contents(rows)
  }

  async fn get(&self, id: i64) -> Result<Option<Content>> { self.fetch(id).await }

  async fn get_many<'a>(&'a self, ids: &'a [String]) -> Result<Vec<Content>> {
    let pool = self.ready().await?;
    let ids = parse_ids(ids);
    if ids.is_empty() {
      return Ok(Vec::new());
    }

    let sql = format!("SELECT {CONTENT_COLUMNS} FROM contents WHERE id = ANY($1)");
    let rows = sqlx::query(&sql).bind(ids).fetch_all(&pool).await?;
    decode_contents(rows)
  }

  async fn create(&self, input: NewContent) -> Result<Content> {
    let pool = self.ready().await?;
    let input = input.validated()?;
    let metadata = input.metadata.as_ref().map(|m| m.to_value()).transpose()?;

    let sql = format!(
      "INSERT INTO contents (
         uuid, name, description, content_type, blob_url, thumbnail_url,
         metadata, tags, created_at, updated_at
       ) VALUES ($1, $2, $3, $4::content_type, $5, $6, $7, $8, $9, $9)
       RETURNING {CONTENT_COLUMNS}"
    );
    let row = sqlx::query(&sql)
      .bind(Uuid::new_v4().simple().to_string())
      .bind(input.name)
      .bind(input.description.unwrap_or_default())
      .bind(input.content_type.as_str())
      .bind(input.blob_url)
      .bind(input.thumbnail_url)
      .bind(metadata)
      .bind(input.tags)
      .bind(Utc::now())
      .fetch_one(&pool)
      .await?;

    let content = raw_content(&row)?.into_content()?;
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

    let mut qb = QueryBuilder::<Postgres>::new("UPDATE contents SET ");
    let mut sets = qb.separated(", ");
    if let Some(name) = patch.name {
      sets.push("name = ").push_bind_unseparated(name);
    }
    if let Some(description) = patch.description {
      sets.push("description = ").push_bind_unseparated(description);
    }
    if let Some(blob_url) = patch.blob_url {
      sets.push("blob_url = ").push_bind_unseparated(blob_url);
    }
    if let Some(thumbnail_url) = patch.thumbnail_url {
      sets.push("thumbnail_url = ").push_bind_unseparated(thumbnail_url);
    }
    if let Some(metadata) = patch.metadata {
      let value = metadata.as_ref().map(|m| m.to_value()).transpose()?;
      sets.push("metadata = ").push_bind_unseparated(value);
    }
    if let Some(tags) = patch.tags {
      sets.push("tags = ").push_bind_unseparated(tags);
    }
    sets.push("updated_at = ").push_bind_unseparated(Utc::now());
    qb.push(" WHERE id = ")
      .push_bind(id)
      .push(" RETURNING ")
      .push(CONTENT_COLUMNS);

    let pool = self.ready().await?;
    let row = qb.build().fetch_optional(&pool).await?;
    decode_content(row)
  }

  async fn delete(&self, id: i64) -> Result<Option<Content>> {
    let pool = self.ready().await?;
    let mut tx = pool.begin().await?;

    let sql = format!("SELECT {CONTENT_COLUMNS} FROM contents WHERE id = $1 FOR UPDATE");
    let Some(row) = sqlx::query(&sql).bind(id).fetch_optional(&mut *tx).await? else {
      return Ok(None);
    };
    sqlx::query("DELETE FROM access_logs WHERE content_id = $1")
      .bind(id)
      .execute(&mut *tx)
      .await?;
    sqlx::query("DELETE FROM contents WHERE id = $1")
      .bind(id)
      .execute(&mut *tx)
      .await?;
    tx.commit().await?;

    let content = raw_content(&row)?.into_content()?;
    tracing::debug!(id, "deleted content");
    Ok(Some(content))
  }

  async fn set_sort_order(&self, id: i64, sort_order: i32) -> Result<Option<Content>> {
    let pool = self.ready().await?;
    let sql = format!(
      "UPDATE contents SET sort_order = $1, updated_at = $2 WHERE id = $3
       RETURNING {CONTENT_COLUMNS}"
    );
    let row = sqlx::query(&sql)
      .bind(sort_order)
      .bind(Utc::now())
      .bind(id)
      .fetch_optional(&pool)
      .await?;
    decode_content(row)
  }

  async fn reset_sort_order(&self, content_type: ContentType) -> Result<u64> {
    let pool = self.ready().await?;
    let changed = sqlx::query(
      "UPDATE contents SET sort_order = NULL
       WHERE content_type = $1::content_type AND sort_order IS NOT NULL",
    )
    .bind(content_type.as_str())
    .execute(&pool)
    .await?
    .rows_affected();

    tracing::info!(%content_type, changed, "reset sort order");
    Ok(changed)
  }

  // ── Access log ────────────────────────────────────────────────────────────

  async fn log_access(&self, entry: NewAccessLog) -> Result<Option<i64>> {
    if !self.access_log {
      return Ok(None);
    }
    let pool = self.ready().await?;

    let id = sqlx::query_scalar::<_, i64>(
      "INSERT INTO access_logs (content_id, access_type, ip_address, user_agent, created_at)
       VALUES ($1, $2, $3, $4, $5)
       RETURNING id::int8",
    )
    .bind(entry.content_id)
    .bind(entry.access_type)
    .bind(entry.ip_address)
    .bind(entry.user_agent)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await?;

    Ok(Some(id))
  }

  async fn access_logs(&self, content_id: i64) -> Result<Vec<AccessLog>> {
    let pool = self.ready().await?;
    let sql = format!(
      "SELECT {ACCESS_LOG_COLUMNS} FROM access_logs WHERE content_id = $1 ORDER BY id ASC"
    );
    let rows = sqlx::query(&sql).bind(content_id).fetch_all(&pool).await?;

    rows
      .iter()
      .map(|row| raw_access_log(row)?.into_access_log())
      .collect()
  }

  // ── Site settings ─────────────────────────────────────────────────────────

  async fn site_settings(&self) -> Result<SiteSettings> {
    let pool = self.ready().await?;
    let sql = format!("SELECT {SETTINGS_COLUMNS} FROM site_settings ORDER BY id LIMIT 1");
    let row = sqlx::query(&sql)
      .fetch_optional(&pool)
      .await?
      .ok_or(Error::MissingSettings)?;
    raw_settings(&row)?.into_settings()
  }

  async fn update_site_settings(&self, patch: SiteSettingsPatch) -> Result<SiteSettings> {
    let current = self.site_settings().await?;
    if patch.is_empty() {
      return Ok(current);
    }

    let mut qb = QueryBuilder::<Postgres>::new("UPDATE site_settings SET ");
    let mut sets = qb.separated(", ");
    if let Some(site_name) = patch.site_name {
      sets.push("site_name = ").push_bind_unseparated(site_name);
    }
    if let Some(show) = patch.show_download_link {
      sets.push("show_download_link = ").push_bind_unseparated(show);
    }
    if let Some(page_title) = patch.page_title {
      sets.push("page_title = ").push_bind_unseparated(page_title);
    }
    if let Some(meta_description) = patch.meta_description {
      sets.push("meta_description = ").push_bind_unseparated(meta_description);
    }
    sets.push("updated_at = ").push_bind_unseparated(Utc::now());
    qb.push(" WHERE id = ")
      .push_bind(current.id)
      .push(" RETURNING ")
      .push(SETTINGS_COLUMNS);

    let pool = self.ready().await?;
    let row = qb
      .build()
      .fetch_optional(&pool)
      .await?
      .ok_or(Error::MissingSettings)?;
    raw_settings(&row)?.into_settings()
  }
}
