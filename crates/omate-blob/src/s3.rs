//! S3-compatible bucket backend (Cloudflare R2, AWS S3, MinIO).
//!
//! Requests are signed with SigV4 by `object_store`. Objects are addressed
//! path-style, `{endpoint}/{bucket}/{key}`, and handed out as
//! `{public_base_url}/{key}`.

use std::{sync::Arc, time::Duration};

use object_store::{
  Attribute, Attributes, ClientOptions, ObjectStore as _, PutOptions, PutPayload,
  aws::{AmazonS3, AmazonS3Builder},
  path::Path as ObjectPath,
};

use crate::{Error, ObjectBackend, Result, backend::key_under, settings::S3Settings};

#[derive(Debug, Clone)]
pub struct S3Backend {
  bucket:          Arc<AmazonS3>,
  public_base_url: String,
}

impl S3Backend {
  pub fn new(settings: &S3Settings, timeout: Duration) -> Result<Self> {
    let endpoint = settings.endpoint().ok_or_else(|| {
      Error::Config("storage.s3.endpoint or storage.s3.account_id must be set".into())
    })?;
    for (value, name) in [
      (&settings.bucket, "bucket"),
      (&settings.access_key_id, "access_key_id"),
      (&settings.secret_access_key, "secret_access_key"),
    ] {
      if value.trim().is_empty() {
        return Err(Error::Config(format!("storage.s3.{name} is not set")));
      }
    }

    let bucket = AmazonS3Builder::new()
      .with_endpoint(&endpoint)
      .with_bucket_name(&settings.bucket)
      .with_region(&settings.region)
      .with_access_key_id(&settings.access_key_id)
      .with_secret_access_key(&settings.secret_access_key)
      .with_client_options(
        ClientOptions::new()
          .with_timeout(timeout)
          .with_allow_http(endpoint.starts_with("http://")),
      )
      .build()
      .map_err(|e| Error::Config(e.to_string()))?;

    let public_base_url = match settings.public_base_url.trim() {
      "" => format!("{endpoint}/{}", settings.bucket),
      base => base.trim_end_matches('/').to_owned(),
    };
    Ok(Self { bucket: Arc::new(bucket), public_base_url })
  }

  fn path(key: &str) -> Result<ObjectPath> {
    ObjectPath::parse(key).map_err(|_| Error::InvalidKey(key.to_owned()))
  }
}

impl ObjectBackend for S3Backend {
  fn name(&self) -> &'static str { "s3" }

  async fn put<'a>(&'a self, key: &'a str, bytes: Vec<u8>, mime: &'a str) -> Result<String> {
    let path = Self::path(key)?;
    let mut attributes = Attributes::new();
    attributes.insert(Attribute::ContentType, mime.to_owned().into());
    let opts = PutOptions { attributes, ..Default::default() };

    self.bucket.put_opts(&path, PutPayload::from(bytes), opts).await?;
    tracing::debug!(key, "uploaded object");
    Ok(format!("{}/{key}", self.public_base_url))
  }

  async fn remove<'a>(&'a self, url: &'a str) -> Result<()> {
    let key = self.key_for_url(url)?;
    self.bucket.delete(&Self::path(&key)?).await?;
    tracing::debug!(key, "deleted object");
    Ok(())
  }

  fn key_for_url(&self, url: &str) -> Result<String> {
    key_under(&self.public_base_url, url)
  }
}

#[cfg(test)]
mod tests {
  use omate_core::{Classify as _, ErrorKind};
  use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_bytes, header, header_exists, header_regex, method, path},
  };

  use super::*;

  fn settings(server: &MockServer) -> S3Settings {
    S3Settings {
      endpoint:          server.uri(),
      bucket:            "omate".into(),
      access_key_id:     "test-key".into(),
      secret_access_key: "test-secret".into(),
      public_base_url:   "https://cdn.example".into(),
      ..Default::default()
    }
  }

  fn backend(server: &MockServer) -> S3Backend {
    S3Backend::new(&settings(server), Duration::from_secs(5)).unwrap()
  }

  #[tokio::test]
  async fn put_is_signed_with_sigv4() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
      .and(path("/omate/oshare/a.json"))
      .and(header_regex(
        "authorization",
        r"^AWS4-HMAC-SHA256 Credential=test-key/\d{8}/auto/s3/aws4_request, SignedHeaders=\S+, Signature=[0-9a-f]{64}$",
      ))
      .and(header_exists("x-amz-date"))
      .and(header_exists("x-amz-content-sha256"))
      .and(header("content-type", "application/json"))
      .and(body_bytes(b"{}".to_vec()))
      .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"d41d8cd9\""))
      .expect(1)
      .mount(&server)
      .await;

    let url = backend(&server)
      .put("oshare/a.json", b"{}".to_vec(), "application/json")
      .await
      .unwrap();
    assert_eq!(url, "https://cdn.example/oshare/a.json");
  }

  #[tokio::test]
  async fn remove_signs_a_delete_for_the_key() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
      .and(path("/omate/oshare/a.png"))
      .and(header_regex("authorization", r"^AWS4-HMAC-SHA256 "))
      .respond_with(ResponseTemplate::new(204))
      .expect(1)
      .mount(&server)
      .await;

    backend(&server)
      .remove("https://cdn.example/oshare/a.png")
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn rejected_requests_are_storage_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
      .respond_with(ResponseTemplate::new(403))
      .mount(&server)
      .await;

    let err = backend(&server)
      .put("oshare/k.bin", vec![1], "application/octet-stream")
      .await
      .unwrap_err();
    assert!(matches!(err, Error::S3(_)), "{err:?}");
    assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
  }

  #[test]
  fn public_urls_default_to_the_bucket_endpoint() {
    let b = S3Backend::new(
      &S3Settings {
        account_id:        "acct".into(),
        bucket:            "omate".into(),
        access_key_id:     "k".into(),
        secret_access_key: "s".into(),
        ..Default::default()
      },
      Duration::from_secs(1),
    )
    .unwrap();
    assert_eq!(b.public_base_url, "https://acct.r2.cloudflarestorage.com/omate");
    assert_eq!(
      b.key_for_url("https://acct.r2.cloudflarestorage.com/omate/oshare/x.png").unwrap(),
      "oshare/x.png"
    );
  }

  #[test]
  fn incomplete_settings_are_config_errors() {
    let err = S3Backend::new(&S3Settings::default(), Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let err = S3Backend::new(
      &S3Settings { account_id: "acct".into(), bucket: "b".into(), ..Default::default() },
      Duration::from_secs(1),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Config(ref m) if m.contains("access_key_id")));
  }
}
