//! Storage models
//!
//! Wire shapes of the per-user records and the admin configuration. Field
//! names match the JSON the browser client reads and writes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum number of search history entries kept per user
pub const SEARCH_HISTORY_LIMIT: usize = 20;

/// Playback progress for one catalog item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayRecord {
    pub title: String,
    pub source_name: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub cover: String,
    /// Episode number, 1-based
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub total_episodes: i64,
    /// Seconds
    #[serde(default)]
    pub play_time: f64,
    /// Seconds
    #[serde(default)]
    pub total_time: f64,
    /// Milliseconds since the epoch
    #[serde(default)]
    pub save_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FavoriteOrigin {
    Vod,
    Live,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub title: String,
    pub source_name: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub cover: String,
    #[serde(default)]
    pub total_episodes: i64,
    #[serde(default)]
    pub save_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<FavoriteOrigin>,
}

/// Intro/outro skipping for one catalog item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipConfig {
    #[serde(default = "default_true")]
    pub enable: bool,
    /// Seconds skipped at the start
    #[serde(default)]
    pub intro_time: i64,
    /// Seconds skipped at the end
    #[serde(default)]
    pub outro_time: i64,
}

fn default_true() -> bool {
    true
}

pub type PlayRecordMap = HashMap<String, PlayRecord>;
pub type FavoriteMap = HashMap<String, Favorite>;
pub type SkipConfigMap = HashMap<String, SkipConfig>;

/// Move `keyword` to the front of `history` and cap the list
pub fn push_search_keyword(history: &mut Vec<String>, keyword: &str) {
    history.retain(|k| k != keyword);
    history.insert(0, keyword.to_string());
    history.truncate(SEARCH_HISTORY_LIMIT);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Owner,
    Admin,
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Owner => "owner",
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Owner | UserRole::Admin)
    }
}

/// Whether an entry came from the config file or was added in the admin UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryOrigin {
    Config,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigSubscription {
    #[serde(rename = "URL")]
    pub url: String,
    pub auto_update: bool,
    pub last_check: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SiteConfig {
    pub site_name: String,
    pub announcement: String,
    pub search_downstream_max_page: u32,
    pub site_interface_cache_time: u64,
    pub douban_proxy_type: String,
    pub douban_proxy: String,
    pub douban_image_proxy_type: String,
    pub douban_image_proxy: String,
    pub disable_yellow_filter: bool,
    pub fluid_search: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_name: "LunaTV".to_string(),
            announcement: String::new(),
            search_downstream_max_page: 5,
            site_interface_cache_time: 7200,
            douban_proxy_type: "direct".to_string(),
            douban_proxy: String::new(),
            douban_image_proxy_type: "direct".to_string(),
            douban_image_proxy: String::new(),
            disable_yellow_filter: false,
            fluid_search: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUser {
    pub username: String,
    pub role: UserRole,
    #[serde(default)]
    pub banned: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserConfig {
    pub users: Vec<AdminUser>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub key: String,
    pub name: String,
    pub api: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub from: EntryOrigin,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomCategory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `movie` or `tv`
    #[serde(rename = "type")]
    pub kind: String,
    pub query: String,
    pub from: EntryOrigin,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveEntry {
    pub key: String,
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ua: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epg: Option<String>,
    pub from: EntryOrigin,
    #[serde(default)]
    pub channel_number: u32,
    #[serde(default)]
    pub disabled: bool,
}

/// Global admin configuration, read and written as a whole
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminConfig {
    // Misspelling matches the stored documents
    #[serde(default)]
    pub config_subscribtion: ConfigSubscription,
    #[serde(default)]
    pub config_file: String,
    #[serde(default)]
    pub site_config: SiteConfig,
    #[serde(default)]
    pub user_config: UserConfig,
    #[serde(default)]
    pub source_config: Vec<SourceEntry>,
    #[serde(default)]
    pub custom_categories: Vec<CustomCategory>,
    #[serde(default)]
    pub live_config: Vec<LiveEntry>,
}

impl AdminConfig {
    pub fn find_user(&self, username: &str) -> Option<&AdminUser> {
        self.user_config.users.iter().find(|u| u.username == username)
    }

    /// Register a user in the admin user list if absent
    pub fn ensure_user(&mut self, username: &str, role: UserRole) {
        if self.find_user(username).is_none() {
            self.user_config.users.push(AdminUser {
                username: username.to_string(),
                role,
                banned: false,
            });
        }
    }

    pub fn remove_user(&mut self, username: &str) {
        self.user_config.users.retain(|u| u.username != username);
    }

    /// Reset to factory state. Users are kept with their bans lifted; every
    /// custom source, category and live entry is dropped.
    pub fn reset(&self) -> AdminConfig {
        let users = self
            .user_config
            .users
            .iter()
            .map(|u| AdminUser {
                banned: false,
                ..u.clone()
            })
            .collect();

        AdminConfig {
            config_subscribtion: self.config_subscribtion.clone(),
            config_file: self.config_file.clone(),
            site_config: SiteConfig::default(),
            user_config: UserConfig { users },
            source_config: self
                .source_config
                .iter()
                .filter(|s| s.from != EntryOrigin::Custom)
                .cloned()
                .collect(),
            custom_categories: self
                .custom_categories
                .iter()
                .filter(|c| c.from != EntryOrigin::Custom)
                .cloned()
                .collect(),
            live_config: self
                .live_config
                .iter()
                .filter(|l| l.from != EntryOrigin::Custom)
                .cloned()
                .collect(),
        }
    }
}
