//! Integration tests for `PostgresRepository`.
//!
//! Tests that need a server read its URL from `OMATE_TEST_POSTGRES_URL` and
//! return early when it is unset. They only assert on rows they create, so
//! the database may be shared with other runs.

use omate_core::{Classify as _, ErrorKind, repository::ContentRepository};
use omate_test_utils::conformance;

use crate::PostgresRepository;

const URL_VAR: &str = "OMATE_TEST_POSTGRES_URL";

fn database_url() -> Option<String> {
  match std::env::var(URL_VAR) {
    Ok(url) if !url.trim().is_empty() => Some(url),
    _ => {
      eprintln!("{URL_VAR} not set; skipping");
      None
    }
  }
}

async fn store(url: &str) -> PostgresRepository {
  PostgresRepository::open(url).await.expect("postgres store")
}

#[tokio::test]
async fn calls_before_connect_fail_without_a_server() {
  let repo = PostgresRepository::new("postgres://127.0.0.1:1/none");
  let err = repo.list(None).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotInitialized);
  let err = repo.ensure_schema().await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotInitialized);
  repo.disconnect().await.unwrap();
}

#[tokio::test]
async fn conformance_suite() {
  let Some(url) = database_url() else { return };
  conformance::run_all(&store(&url).await).await;
}

#[tokio::test]
async fn uninitialised_calls_fail() {
  let Some(url) = database_url() else { return };
  conformance::uninitialised_calls_fail(&PostgresRepository::new(url)).await;
}

#[tokio::test]
async fn disabled_access_log_is_a_no_op() {
  let Some(url) = database_url() else { return };
  let repo = PostgresRepository::new(url).with_access_log(false);
  repo.connect().await.unwrap();
  repo.ensure_schema().await.unwrap();
  conformance::disabled_access_log_is_a_no_op(&repo).await;
}

#[tokio::test]
async fn concurrent_bootstraps_agree_on_one_settings_row() {
  let Some(url) = database_url() else { return };

  let mut set = tokio::task::JoinSet::new();
  for _ in 0..4 {
    let url = url.clone();
    set.spawn(async move {
      let repo = PostgresRepository::new(url).with_max_connections(1);
      repo.connect().await?;
      repo.ensure_schema().await?;
      let id = repo.site_settings().await.map(|s| s.id);
      repo.disconnect().await?;
      id
    });
  }

  let mut ids = Vec::new();
  while let Some(joined) = set.join_next().await {
    ids.push(joined.expect("task panicked").expect("bootstrap"));
  }
  assert!(ids.windows(2).all(|w| w[0] == w[1]));

  let repo = store(&url).await;
  let pool = repo.ready().await.unwrap();
  let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM site_settings")
    .fetch_one(&pool)
    .await
    .unwrap();
  assert_eq!(rows, 1);
}
