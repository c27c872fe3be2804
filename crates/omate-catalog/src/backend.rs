//! [`AnyRepository`]: a [`ContentRepository`] chosen from the database URL.

use omate_core::{
  Classify, ErrorKind,
  access::{AccessLog, NewAccessLog},
  config::DatabaseUrl,
  content::{Content, ContentPatch, ContentType, NewContent},
  repository::ContentRepository,
  settings::{SiteSettings, SiteSettingsPatch},
};
use omate_store_postgres::PostgresRepository;
use omate_store_sqlite::SqliteRepository;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
  #[error(transparent)]
  Sqlite(#[from] omate_store_sqlite::Error),

  #[error(transparent)]
  Postgres(#[from] omate_store_postgres::Error),
}

impl Classify for RepositoryError {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Sqlite(e) => e.kind(),
      Self::Postgres(e) => e.kind(),
    }
  }
}

type Result<T> = std::result::Result<T, RepositoryError>;

/// The repository backend selected by the scheme of `DATABASE_URL`.
pub enum AnyRepository {
  Sqlite(SqliteRepository),
  Postgres(PostgresRepository),
}

impl AnyRepository {
  /// Build an unconnected repository for `url`.
  pub fn from_url(url: &DatabaseUrl, access_log: bool) -> Self {
    match url {
      DatabaseUrl::Sqlite(location) => Self::Sqlite(
        SqliteRepository::new(location.clone()).with_access_log(access_log),
      ),
      DatabaseUrl::Postgres(url) => {
        Self::Postgres(PostgresRepository::new(url.clone()).with_access_log(access_log))
      }
    }
  }

  pub fn backend_name(&self) -> &'static str {
    match self {
      Self::Sqlite(_) => "sqlite",
      Self::Postgres(_) => "postgres",
    }
  }
}

/// Forward a call to whichever backend is active, widening its error.
macro_rules! dispatch {
  ($self:ident, $repo:ident => $call:expr) => {
    match $self {
      AnyRepository::Sqlite($repo) => Ok($call.await?),
      AnyRepository::Postgres($repo) => Ok($call.await?),
    }
  };
}

impl ContentRepository for AnyRepository {
  type Error = RepositoryError;

  async fn connect(&self) -> Result<()> { dispatch!(self, r => r.connect()) }

  async fn disconnect(&self) -> Result<()> { dispatch!(self, r => r.disconnect()) }

  async fn ensure_schema(&self) -> Result<()> { dispatch!(self, r => r.ensure_schema()) }

  async fn schema_version(&self) -> Result<Option<u32>> {
    dispatch!(self, r => r.schema_version())
  }

  async fn list(&self, content_type: Option<ContentType>) -> Result<Vec<Content>> {
    dispatch!(self, r => r.list(content_type))
  }

  async fn get(&self, id: i64) -> Result<Option<Content>> { dispatch!(self, r => r.get(id)) }

  async fn get_many<'a>(&'a self, ids: &'a [String]) -> Result<Vec<Content>> {
    dispatch!(self, r => r.get_many(ids))
  }

  async fn create(&self, input: NewContent) -> Result<Content> {
    dispatch!(self, r => r.create(input))
  }

  async fn update(&self, id: i64, patch: ContentPatch) -> Result<Option<Content>> {
    dispatch!(self, r => r.update(id, patch))
  }

  async fn delete(&self, id: i64) -> Result<Option<Content>> {
    dispatch!(self, r => r.delete(id))
  }

  async fn set_sort_order(&self, id: i64, sort_order: i32) -> Result<Option<Content>> {
    dispatch!(self, r => r.set_sort_order(id, sort_order))
  }

  async fn reset_sort_order(&self, content_type: ContentType) -> Result<u64> {
    dispatch!(self, r => r.reset_sort_order(content_type))
  }

  async fn log_access(&self, entry: NewAccessLog) -> Result<Option<i64>> {
    dispatch!(self, r => r.log_access(entry))
  }

  async fn access_logs(&self, content_id: i64) -> Result<Vec<AccessLog>> {
    dispatch!(self, r => r.access_logs(content_id))
  }

  async fn site_settings(&self) -> Result<SiteSettings> {
    dispatch!(self, r => r.site_settings())
  }

  async fn update_site_settings(&self, patch: SiteSettingsPatch) -> Result<SiteSettings> {
    dispatch!(self, r => r.update_site_settings(patch))
  }
}
