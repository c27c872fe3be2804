//! The singleton site-settings record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SITE_NAME: &str = "OMateShare";
pub const DEFAULT_SHOW_DOWNLOAD_LINK: bool = true;
pub const DEFAULT_PAGE_TITLE: &str = "OMateShare";
pub const DEFAULT_META_DESCRIPTION: &str =
  "管理角色卡、知识库、事件书和提示注入";

/// Site-wide presentation settings. Exactly one row exists once the schema
/// has been bootstrapped; it is updated in place and never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSettings {
  pub id:                 i64,
  pub site_name:          String,
  pub show_download_link: bool,
  pub page_title:         String,
  pub meta_description:   String,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
}

/// Partial update of [`SiteSettings`]; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSettingsPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub site_name:          Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub show_download_link: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub page_title:         Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub meta_description:   Option<String>,
}

impl SiteSettingsPatch {
  pub fn is_empty(&self) -> bool {
    self.site_name.is_none()
      && self.show_download_link.is_none()
      && self.page_title.is_none()
      && self.meta_description.is_none()
  }
}
