//! Bucket backend reached over plain HTTP with an optional bearer token,
//! for stores that front their objects with a simple `PUT`/`DELETE` API.
//! S3 and R2 buckets use [`S3Backend`](crate::S3Backend) instead.
//!
//! Objects are written with `PUT {endpoint}/{key}` and removed with
//! `DELETE {endpoint}/{key}`, optionally carrying a bearer token. The public
//! URL handed back to callers is `{public_base_url}/{key}`.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, header::CONTENT_TYPE};

use crate::{Error, ObjectBackend, Result, backend::key_under, settings::HttpSettings};

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct HttpBackend {
  client:          Client,
  endpoint:        String,
  public_base_url: String,
  token:           Option<String>,
}

impl HttpBackend {
  pub fn new(settings: &HttpSettings, timeout: Duration) -> Result<Self> {
    if settings.endpoint.trim().is_empty() {
      return Err(Error::Config("storage.http.endpoint is not set".into()));
    }
    let client = Client::builder().timeout(timeout).build()?;
    let endpoint = settings.endpoint.trim_end_matches('/').to_owned();
    let public_base_url = match settings.public_base_url.trim() {
      "" => endpoint.clone(),
      base => base.trim_end_matches('/').to_owned(),
    };
    Ok(Self {
      client,
      endpoint,
      public_base_url,
      token: settings.token.clone().filter(|t| !t.is_empty()),
    })
  }

  fn object_url(&self, key: &str) -> String { format!("{}/{key}", self.endpoint) }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    match &self.token {
      Some(token) => req.bearer_auth(token),
      None => req,
    }
  }
}

impl ObjectBackend for HttpBackend {
  fn name(&self) -> &'static str { "http" }

  async fn put<'a>(&'a self, key: &'a str, bytes: Vec<u8>, mime: &'a str) -> Result<String> {
    let resp = self
      .auth(self.client.put(self.object_url(key)))
      .header(CONTENT_TYPE, mime)
      .body(bytes)
      .send()
      .await?;

    if !resp.status().is_success() {
      return Err(Error::Status {
        status: resp.status().as_u16(),
        key:    key.to_owned(),
      });
    }
    tracing::debug!(key, "uploaded object");
    Ok(format!("{}/{key}", self.public_base_url))
  }

  async fn remove<'a>(&'a self, url: &'a str) -> Result<()> {
    let key = self.key_for_url(url)?;
    let resp = self
      .auth(self.client.delete(self.object_url(&key)))
      .send()
      .await?;

    if !resp.status().is_success() {
      return Err(Error::Status { status: resp.status().as_u16(), key });
    }
    tracing::debug!(key, "deleted object");
    Ok(())
  }

  fn key_for_url(&self, url: &str) -> Result<String> {
    key_under(&self.public_base_url, url)
  }
}
