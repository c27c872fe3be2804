//! `omate`: operator CLI for an OMateShare content store.
//!
//! Reads `omate.toml` (or the path given with `--config`) layered with the
//! environment, then runs one maintenance command against the configured
//! database and object storage.
//!
//! ```
//! DATABASE_URL=sqlite://./data/omate.db omate init
//! omate list --type story_book
//! omate settings set --site-name "My Share"
//! ```

mod commands;
mod config;

use std::{collections::HashMap, path::PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use omate_blob::{AnyBackend, ObjectStore};
use omate_catalog::{AnyRepository, Catalog};
use omate_core::content::ContentType;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "omate", author, version, about = "OMateShare content store maintenance")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "omate.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Connect and create or adopt the schema.
  Init,
  /// Show the backend, schema version and record counts per type.
  Status,
  /// Print the public character-card feed as JSON.
  Feed,
  /// List content records in display order.
  List {
    #[arg(long = "type", value_parser = parse_content_type)]
    content_type: Option<ContentType>,
  },
  /// Return one content type to the default recency order.
  ResetSort {
    #[arg(long = "type", value_parser = parse_content_type)]
    content_type: ContentType,
  },
  /// Show or change the site settings.
  Settings {
    #[command(subcommand)]
    action: SettingsAction,
  },
  /// Delete a record together with its stored objects.
  Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
  Show,
  Set {
    #[arg(long)]
    site_name:          Option<String>,
    #[arg(long)]
    show_download_link: Option<bool>,
    #[arg(long)]
    page_title:         Option<String>,
    #[arg(long)]
    meta_description:   Option<String>,
  },
}

fn parse_content_type(s: &str) -> Result<ContentType, String> {
  ContentType::parse(s).map_err(|e| e.to_string())
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let vars: HashMap<String, String> = std::env::vars().collect();
  let cfg = AppConfig::load(&cli.config, &vars)?;
  let database = cfg.database()?;

  let repo = AnyRepository::from_url(&database, cfg.access_log);
  let backend =
    AnyBackend::from_settings(&cfg.storage).context("failed to set up object storage")?;
  let catalog = Catalog::new(repo, ObjectStore::from_settings(backend, &cfg.storage));
  tracing::debug!(backend = database.backend_name(), "configured");

  commands::run(&catalog, cli.command).await
}

#[cfg(test)]
mod tests {
  use clap::CommandFactory as _;

  use super::*;

  #[test]
  fn cli_definition_is_consistent() { Cli::command().debug_assert(); }

  #[test]
  fn content_types_parse_from_their_column_names() {
    let cli = Cli::try_parse_from(["omate", "list", "--type", "story_book"]).unwrap();
    assert!(matches!(
      cli.command,
      Command::List { content_type: Some(ContentType::StoryBook) }
    ));
    assert!(Cli::try_parse_from(["omate", "reset-sort", "--type", "novel"]).is_err());
  }

  #[test]
  fn settings_flags_are_optional() {
    let cli = Cli::try_parse_from([
      "omate",
      "settings",
      "set",
      "--show-download-link",
      "false",
    ])
    .unwrap();
    match cli.command {
      Command::Settings {
        action: SettingsAction::Set { site_name, show_download_link, .. },
      } => {
        assert_eq!(site_name, None);
        assert_eq!(show_download_link, Some(false));
      }
      other => panic!("unexpected command: {other:?}"),
    }
  }
}
