//! Backend selection from the configured database connection string.

use std::path::PathBuf;

use crate::{Error, Result};

/// Where an embedded SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteLocation {
  File(PathBuf),
  Memory,
}

/// A parsed `DATABASE_URL`. The scheme alone picks the repository backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseUrl {
  /// `postgres://…` or `postgresql://…`, kept verbatim for the driver.
  Postgres(String),
  /// `sqlite://PATH`, `sqlite:PATH` or `sqlite::memory:`.
  Sqlite(SqliteLocation),
}

impl DatabaseUrl {
  pub fn parse(url: &str) -> Result<Self> {
    let url = url.trim();
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
      return Ok(Self::Postgres(url.to_owned()));
    }

    let rest = url
      .strip_prefix("sqlite://")
      .or_else(|| url.strip_prefix("sqlite:"))
      .ok_or_else(|| Error::UnsupportedDatabaseUrl(url.to_owned()))?;

    match rest {
      "" => Err(Error::UnsupportedDatabaseUrl(url.to_owned())),
      ":memory:" => Ok(Self::Sqlite(SqliteLocation::Memory)),
      path => Ok(Self::Sqlite(SqliteLocation::File(PathBuf::from(path)))),
    }
  }

  /// Short backend name for logs and status output.
  pub fn backend_name(&self) -> &'static str {
    match self {
      Self::Postgres(_) => "postgres",
      Self::Sqlite(_) => "sqlite",
    }
  }
}
