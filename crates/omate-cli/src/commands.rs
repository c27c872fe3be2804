//! One function per subcommand. Results go to stdout; logs go to stderr.

use anyhow::{Context as _, bail};
use omate_blob::{AnyBackend, ObjectBackend as _};
use omate_catalog::{AnyRepository, Catalog};
use omate_core::{
  content::{Content, ContentType},
  repository::ContentRepository,
  settings::SiteSettingsPatch,
};

use crate::{Command, SettingsAction};

type AppCatalog = Catalog<AnyRepository, AnyBackend>;

pub async fn run(catalog: &AppCatalog, command: Command) -> anyhow::Result<()> {
  match command {
    Command::Status => return status(catalog).await,
    Command::Init => {
      ready(catalog).await?;
      let version = catalog.repository().schema_version().await?;
      println!("schema ready (version {})", version.unwrap_or_default());
    }
    Command::Feed => {
      ready(catalog).await?;
      let feed = catalog.feed().await?;
      println!("{}", serde_json::to_string_pretty(&feed)?);
    }
    Command::List { content_type } => {
      ready(catalog).await?;
      for content in catalog.list(content_type).await? {
        println!("{}", list_line(&content));
      }
    }
    Command::ResetSort { content_type } => {
      ready(catalog).await?;
      let cleared = catalog.reset_order(content_type).await?;
      println!("cleared {cleared} sort orders for {content_type}");
    }
    Command::Settings { action } => {
      ready(catalog).await?;
      settings(catalog.repository(), action).await?;
    }
    Command::Delete { id } => {
      ready(catalog).await?;
      let removed = catalog.remove(id).await?;
      println!("deleted {} ({})", removed.id, removed.name);
    }
  }
  Ok(())
}

async fn ready(catalog: &AppCatalog) -> anyhow::Result<()> {
  catalog.init().await.context("failed to initialise the database")
}

/// Read-only: never creates a schema that is not there yet.
async fn status(catalog: &AppCatalog) -> anyhow::Result<()> {
  let repo = catalog.repository();
  repo.connect().await.context("failed to connect")?;
  println!("backend:        {}", repo.backend_name());
  println!("storage:        {}", catalog.store().backend().name());
  if let AnyBackend::Local(local) = catalog.store().backend() {
    let state = if local.is_available().await { "writable" } else { "not writable" };
    println!("storage dir:    {} ({state})", local.root().display());
  }

  let Some(version) = repo.schema_version().await? else {
    println!("schema version: none (run `omate init`)");
    return Ok(());
  };
  println!("schema version: {version}");

  repo.ensure_schema().await?;
  for content_type in ContentType::ALL {
    let count = repo.list(Some(content_type)).await?.len();
    println!("{:<16}{count}", format!("{content_type}:"));
  }
  Ok(())
}

async fn settings(repo: &AnyRepository, action: SettingsAction) -> anyhow::Result<()> {
  let settings = match action {
    SettingsAction::Show => repo.site_settings().await?,
    SettingsAction::Set {
      site_name,
      show_download_link,
      page_title,
      meta_description,
    } => {
      let patch = SiteSettingsPatch {
        site_name,
        show_download_link,
        page_title,
        meta_description,
      };
      if patch.is_empty() {
        bail!("nothing to change; pass at least one setting");
      }
      repo.update_site_settings(patch).await?
    }
  };
  println!("{}", serde_json::to_string_pretty(&settings)?);
  Ok(())
}

fn list_line(content: &Content) -> String {
  let order = content
    .sort_order
    .map_or_else(|| "-".to_owned(), |o| o.to_string());
  format!(
    "{:>6}  {:<16}  {:>5}  {}  {}",
    content.id,
    content.content_type.as_str(),
    order,
    content.name,
    content.blob_url
  )
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;

  #[test]
  fn list_lines_show_unset_order_as_a_dash() {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let mut content = Content {
      id:            7,
      external_id:   "7".into(),
      name:          "Aria".into(),
      description:   String::new(),
      content_type:  ContentType::CharacterCard,
      blob_url:      "/uploads/oshare/aria.png".into(),
      thumbnail_url: None,
      metadata:      None,
      tags:          Vec::new(),
      sort_order:    None,
      created_at:    at,
      updated_at:    at,
    };
    assert_eq!(
      list_line(&content),
      "     7  character_card        -  Aria  /uploads/oshare/aria.png"
    );
    content.sort_order = Some(3);
    assert!(list_line(&content).contains("    3  Aria"));
  }
}
