//! Layered configuration: an optional `omate.toml`, then `OMATE_*`
//! variables, then the legacy variable names the web tier already sets.
//!
//! ```toml
//! database_url = "sqlite://./data/omate.db"
//! access_log   = false
//!
//! [storage]
//! kind   = "local"
//! prefix = "oshare"
//!
//! [storage.local]
//! dir        = "./public/uploads"
//! url_prefix = "/uploads"
//! ```
//!
//! Nested keys are reachable from the environment with `__`, e.g.
//! `OMATE_STORAGE__HTTP__ENDPOINT`.

use std::{collections::HashMap, path::Path};

use anyhow::{Context as _, bail};
use omate_blob::StorageSettings;
use omate_core::config::DatabaseUrl;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  pub database_url: String,
  /// Record content views in `access_logs`.
  pub access_log:   bool,
  pub storage:      StorageSettings,
}

/// Legacy variables copied verbatim onto a config key.
const LEGACY_VARS: [(&str, &str); 9] = [
  ("DATABASE_URL", "database_url"),
  ("BLOB_PREFIX", "storage.prefix"),
  ("LOCAL_STORAGE_DIR", "storage.local.dir"),
  ("LOCAL_STORAGE_URL_PREFIX", "storage.local.url_prefix"),
  ("R2_ACCOUNT_ID", "storage.s3.account_id"),
  ("R2_ACCESS_KEY_ID", "storage.s3.access_key_id"),
  ("R2_SECRET_ACCESS_KEY", "storage.s3.secret_access_key"),
  ("R2_BUCKET_NAME", "storage.s3.bucket"),
  ("R2_PUBLIC_URL", "storage.s3.public_base_url"),
];

impl AppConfig {
  /// Load from `path` (missing is fine) and the variables in `vars`.
  pub fn load(path: &Path, vars: &HashMap<String, String>) -> anyhow::Result<Self> {
    let mut builder = ::config::Config::builder()
      .add_source(::config::File::from(path).required(false))
      .add_source(
        ::config::Environment::with_prefix("OMATE")
          .prefix_separator("_")
          .separator("__")
          .source(Some(vars.clone())),
      );

    for (var, key) in LEGACY_VARS {
      builder = builder.set_override_option(key, vars.get(var).cloned())?;
    }
    let kind = vars.get("STORAGE_TYPE").map(|t| storage_kind(t));
    // Only the exact value "1" ever switched logging on.
    let access_log = vars.get("ACCESS_LOG_ON").map(|v| v == "1");
    builder = builder
      .set_override_option("storage.kind", kind)?
      .set_override_option("access_log", access_log)?;

    builder
      .build()
      .context("failed to read configuration")?
      .try_deserialize()
      .context("failed to deserialise configuration")
  }

  /// The configured database, which also selects the repository backend.
  pub fn database(&self) -> anyhow::Result<DatabaseUrl> {
    if self.database_url.trim().is_empty() {
      bail!("no database configured; set DATABASE_URL or `database_url`");
    }
    DatabaseUrl::parse(&self.database_url)
      .with_context(|| format!("invalid database url {:?}", self.database_url))
  }
}

/// Map a legacy `STORAGE_TYPE` onto `storage.kind`. Anything that is neither
/// local nor R2 was a hosted bucket behind a plain HTTP API.
fn storage_kind(legacy: &str) -> &'static str {
  match legacy.to_ascii_lowercase().as_str() {
    "local" => "local",
    "r2" | "s3" => "s3",
    _ => "http",
  }
}
