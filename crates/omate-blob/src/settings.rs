//! Object-store configuration, deserialised from the `[storage]` table.

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::thumbnail::ThumbnailOptions;

/// Namespace prepended to every object key unless configured otherwise.
pub const DEFAULT_PREFIX: &str = "oshare/";
pub const DEFAULT_LOCAL_DIR: &str = "./public/uploads";
pub const DEFAULT_LOCAL_URL_PREFIX: &str = "/uploads";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
  #[default]
  Local,
  Http,
  #[serde(alias = "r2")]
  S3,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
  pub kind:         StorageKind,
  /// Key namespace; a trailing `/` is added when missing. May be empty.
  pub prefix:       String,
  pub timeout_secs: u64,
  pub local:        LocalSettings,
  pub http:         HttpSettings,
  pub s3:           S3Settings,
  pub thumbnail:    ThumbnailOptions,
}

impl Default for StorageSettings {
  fn default() -> Self {
    Self {
      kind:         StorageKind::default(),
      prefix:       DEFAULT_PREFIX.to_owned(),
      timeout_secs: DEFAULT_TIMEOUT_SECS,
      local:        LocalSettings::default(),
      http:         HttpSettings::default(),
      s3:           S3Settings::default(),
      thumbnail:    ThumbnailOptions::default(),
    }
  }
}

impl StorageSettings {
  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalSettings {
  pub dir:        PathBuf,
  pub url_prefix: String,
}

impl Default for LocalSettings {
  fn default() -> Self {
    Self {
      dir:        PathBuf::from(DEFAULT_LOCAL_DIR),
      url_prefix: DEFAULT_LOCAL_URL_PREFIX.to_owned(),
    }
  }
}

/// Bucket endpoint settings. Objects are written with
/// `PUT {endpoint}/{key}` and served from `{public_base_url}/{key}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
  pub endpoint:        String,
  pub public_base_url: String,
  pub token:           Option<String>,
}

pub const DEFAULT_S3_REGION: &str = "auto";

/// An S3-compatible bucket (Cloudflare R2 or AWS S3), reached with SigV4
/// signed requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct S3Settings {
  /// API endpoint. Derived from `account_id` for R2 when empty.
  pub endpoint:          String,
  pub account_id:        String,
  pub bucket:            String,
  pub region:            String,
  pub access_key_id:     String,
  pub secret_access_key: String,
  /// Base of the URLs handed out for stored objects. Defaults to
  /// `{endpoint}/{bucket}`.
  pub public_base_url:   String,
}

impl Default for S3Settings {
  fn default() -> Self {
    Self {
      endpoint:          String::new(),
      account_id:        String::new(),
      bucket:            String::new(),
      region:            DEFAULT_S3_REGION.to_owned(),
      access_key_id:     String::new(),
      secret_access_key: String::new(),
      public_base_url:   String::new(),
    }
  }
}

impl S3Settings {
  pub fn endpoint(&self) -> Option<String> {
    match (self.endpoint.trim(), self.account_id.trim()) {
      ("", "") => None,
      ("", account) => Some(format!("https://{account}.r2.cloudflarestorage.com")),
      (endpoint, _) => Some(endpoint.trim_end_matches('/').to_owned()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn r2_endpoint_comes_from_the_account_id() {
    let s3 = S3Settings { account_id: "abc123".into(), ..Default::default() };
    assert_eq!(s3.endpoint().as_deref(), Some("https://abc123.r2.cloudflarestorage.com"));

    let s3 = S3Settings { endpoint: "http://minio:9000/".into(), ..s3 };
    assert_eq!(s3.endpoint().as_deref(), Some("http://minio:9000"));

    assert_eq!(S3Settings::default().endpoint(), None);
    assert_eq!(S3Settings::default().region, "auto");
  }
}
