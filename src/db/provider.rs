//! Storage provider
//!
//! Owns the active backend, selected once at the composition root and
//! replaced only through [`StorageProvider::reconfigure`]. Records are
//! addressed by `(source, id)` here and translated to compound keys before
//! reaching the backend. In browser-local mode the server holds no data and
//! every operation is a no-op.

use crate::core::error::Result;
use crate::core::keys::generate_key;
use crate::db::memory::MemoryStorage;
use crate::db::models::{
    AdminConfig, Favorite, FavoriteMap, PlayRecord, PlayRecordMap, SkipConfig, SkipConfigMap,
    UserRole,
};
use crate::db::sqlite::SqliteStorage;
use crate::db::storage::Storage;
use crate::db::upstash::UpstashStorage;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Backend selection
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    /// Data lives in the browser; the server stores nothing
    LocalStorage,
    Memory,
    Sqlite {
        path: PathBuf,
        pool_size: u32,
        busy_timeout: Duration,
    },
    Upstash {
        url: String,
        token: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    LocalStorage,
    Memory,
    Sqlite,
    Upstash,
}

impl StorageBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            StorageBackend::LocalStorage => BackendKind::LocalStorage,
            StorageBackend::Memory => BackendKind::Memory,
            StorageBackend::Sqlite { .. } => BackendKind::Sqlite,
            StorageBackend::Upstash { .. } => BackendKind::Upstash,
        }
    }

    fn build(&self) -> Result<Option<Arc<dyn Storage>>> {
        let storage: Arc<dyn Storage> = match self {
            StorageBackend::LocalStorage => return Ok(None),
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::Sqlite {
                path,
                pool_size,
                busy_timeout,
            } => Arc::new(SqliteStorage::open(path, *pool_size, *busy_timeout)?),
            StorageBackend::Upstash { url, token } => Arc::new(UpstashStorage::connect(url, token)?),
        };
        Ok(Some(storage))
    }
}

struct Active {
    kind: BackendKind,
    storage: Option<Arc<dyn Storage>>,
}

pub struct StorageProvider {
    active: RwLock<Active>,
}

impl StorageProvider {
    pub fn new(backend: StorageBackend) -> Result<Self> {
        let storage = backend.build()?;
        tracing::info!(backend = ?backend.kind(), "Storage backend selected");
        Ok(Self {
            active: RwLock::new(Active {
                kind: backend.kind(),
                storage,
            }),
        })
    }

    /// Wrap an already constructed backend
    pub fn with_storage(kind: BackendKind, storage: Arc<dyn Storage>) -> Self {
        Self {
            active: RwLock::new(Active {
                kind,
                storage: Some(storage),
            }),
        }
    }

    /// Switch to another backend. Data is not carried over.
    pub async fn reconfigure(&self, backend: StorageBackend) -> Result<()> {
        let storage = backend.build()?;
        let mut active = self.active.write().await;
        tracing::info!(from = ?active.kind, to = ?backend.kind(), "Storage backend reconfigured");
        active.kind = backend.kind();
        active.storage = storage;
        Ok(())
    }

    pub async fn backend_kind(&self) -> BackendKind {
        self.active.read().await.kind
    }

    async fn storage(&self) -> Option<Arc<dyn Storage>> {
        self.active.read().await.storage.clone()
    }

    // Play records

    pub async fn get_play_record(&self, user: &str, source: &str, id: &str) -> Result<Option<PlayRecord>> {
        let key = generate_key(source, id)?;
        match self.storage().await {
            Some(s) => s.get_play_record(user, &key).await,
            None => Ok(None),
        }
    }

    pub async fn save_play_record(&self, user: &str, source: &str, id: &str, record: &PlayRecord) -> Result<()> {
        let key = generate_key(source, id)?;
        match self.storage().await {
            Some(s) => s.set_play_record(user, &key, record).await,
            None => Ok(()),
        }
    }

    pub async fn get_all_play_records(&self, user: &str) -> Result<PlayRecordMap> {
        match self.storage().await {
            Some(s) => s.get_all_play_records(user).await,
            None => Ok(PlayRecordMap::new()),
        }
    }

    pub async fn delete_play_record(&self, user: &str, source: &str, id: &str) -> Result<()> {
        let key = generate_key(source, id)?;
        match self.storage().await {
            Some(s) => s.delete_play_record(user, &key).await,
            None => Ok(()),
        }
    }

    pub async fn clear_play_records(&self, user: &str) -> Result<()> {
        match self.storage().await {
            Some(s) => s.clear_play_records(user).await,
            None => Ok(()),
        }
    }

    // Favorites

    pub async fn get_favorite(&self, user: &str, source: &str, id: &str) -> Result<Option<Favorite>> {
        let key = generate_key(source, id)?;
        match self.storage().await {
            Some(s) => s.get_favorite(user, &key).await,
            None => Ok(None),
        }
    }

    pub async fn save_favorite(&self, user: &str, source: &str, id: &str, favorite: &Favorite) -> Result<()> {
        let key = generate_key(source, id)?;
        match self.storage().await {
            Some(s) => s.set_favorite(user, &key, favorite).await,
            None => Ok(()),
        }
    }

    pub async fn get_all_favorites(&self, user: &str) -> Result<FavoriteMap> {
        match self.storage().await {
            Some(s) => s.get_all_favorites(user).await,
            None => Ok(FavoriteMap::new()),
        }
    }

    pub async fn delete_favorite(&self, user: &str, source: &str, id: &str) -> Result<()> {
        let key = generate_key(source, id)?;
        match self.storage().await {
            Some(s) => s.delete_favorite(user, &key).await,
            None => Ok(()),
        }
    }

    pub async fn is_favorited(&self, user: &str, source: &str, id: &str) -> Result<bool> {
        Ok(self.get_favorite(user, source, id).await?.is_some())
    }

    pub async fn clear_favorites(&self, user: &str) -> Result<()> {
        match self.storage().await {
            Some(s) => s.clear_favorites(user).await,
            None => Ok(()),
        }
    }

    // Skip configs

    pub async fn get_skip_config(&self, user: &str, source: &str, id: &str) -> Result<Option<SkipConfig>> {
        match self.storage().await {
            Some(s) => s.get_skip_config(user, source, id).await,
            None => Ok(None),
        }
    }

    pub async fn save_skip_config(&self, user: &str, source: &str, id: &str, config: &SkipConfig) -> Result<()> {
        match self.storage().await {
            Some(s) => s.set_skip_config(user, source, id, config).await,
            None => Ok(()),
        }
    }

    pub async fn delete_skip_config(&self, user: &str, source: &str, id: &str) -> Result<()> {
        match self.storage().await {
            Some(s) => s.delete_skip_config(user, source, id).await,
            None => Ok(()),
        }
    }

    pub async fn get_all_skip_configs(&self, user: &str) -> Result<SkipConfigMap> {
        match self.storage().await {
            Some(s) => s.get_all_skip_configs(user).await,
            None => Ok(SkipConfigMap::new()),
        }
    }

    // Users

    pub async fn register_user(&self, user: &str, password: &str) -> Result<()> {
        match self.storage().await {
            Some(s) => s.register_user(user, password).await,
            None => Ok(()),
        }
    }

    pub async fn verify_user(&self, user: &str, password: &str) -> Result<bool> {
        match self.storage().await {
            Some(s) => s.verify_user(user, password).await,
            None => Ok(false),
        }
    }

    pub async fn check_user_exist(&self, user: &str) -> Result<bool> {
        match self.storage().await {
            Some(s) => s.check_user_exist(user).await,
            None => Ok(false),
        }
    }

    pub async fn change_password(&self, user: &str, new_password: &str) -> Result<()> {
        match self.storage().await {
            Some(s) => s.change_password(user, new_password).await,
            None => Ok(()),
        }
    }

    pub async fn delete_user(&self, user: &str) -> Result<()> {
        match self.storage().await {
            Some(s) => s.delete_user(user).await,
            None => Ok(()),
        }
    }

    pub async fn get_all_users(&self) -> Result<Vec<String>> {
        match self.storage().await {
            Some(s) => s.get_all_users().await,
            None => Ok(Vec::new()),
        }
    }

    // Search history

    pub async fn get_search_history(&self, user: &str) -> Result<Vec<String>> {
        match self.storage().await {
            Some(s) => s.get_search_history(user).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn add_search_history(&self, user: &str, keyword: &str) -> Result<()> {
        match self.storage().await {
            Some(s) => s.add_search_history(user, keyword).await,
            None => Ok(()),
        }
    }

    pub async fn delete_search_history(&self, user: &str, keyword: Option<&str>) -> Result<()> {
        match self.storage().await {
            Some(s) => s.delete_search_history(user, keyword).await,
            None => Ok(()),
        }
    }

    // Admin configuration

    pub async fn get_admin_config(&self) -> Result<Option<AdminConfig>> {
        match self.storage().await {
            Some(s) => s.get_admin_config().await,
            None => Ok(None),
        }
    }

    pub async fn set_admin_config(&self, config: &AdminConfig) -> Result<()> {
        match self.storage().await {
            Some(s) => s.set_admin_config(config).await,
            None => Ok(()),
        }
    }

    /// Stored admin configuration, or a fresh one listing the owner and every
    /// registered user. A fresh configuration is persisted before returning.
    pub async fn admin_config_or_default(&self, owner: Option<&str>) -> Result<AdminConfig> {
        let Some(storage) = self.storage().await else {
            return Ok(initial_admin_config(owner, &[]));
        };

        if let Some(config) = storage.get_admin_config().await? {
            return Ok(config);
        }

        let users = storage.get_all_users().await?;
        let config = initial_admin_config(owner, &users);
        storage.set_admin_config(&config).await?;
        tracing::info!(users = config.user_config.users.len(), "Initialized admin configuration");
        Ok(config)
    }

    /// Reset the admin configuration to factory state and persist it
    pub async fn reset_admin_config(&self, owner: Option<&str>) -> Result<AdminConfig> {
        let current = self.admin_config_or_default(owner).await?;
        let mut config = current.reset();
        if let Some(owner) = owner {
            config.ensure_user(owner, UserRole::Owner);
        }
        self.set_admin_config(&config).await?;
        tracing::info!("Admin configuration reset");
        Ok(config)
    }

    pub async fn clear_all_data(&self) -> Result<()> {
        match self.storage().await {
            Some(s) => s.clear_all_data().await,
            None => Ok(()),
        }
    }
}

fn initial_admin_config(owner: Option<&str>, users: &[String]) -> AdminConfig {
    let mut config = AdminConfig::default();
    if let Some(owner) = owner {
        config.ensure_user(owner, UserRole::Owner);
    }
    for user in users {
        config.ensure_user(user, UserRole::User);
    }
    config
}
