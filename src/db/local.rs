//! Browser-local backend: one JSON blob per data kind in a [`WebStorage`]
//! area.
//!
//! The implicit user `local` reads and writes the bare blob keys. Any other
//! user gets `{key}:{user}` so namespaces stay separate. The user table and
//! the admin configuration are shared.

use crate::client::web_storage::{WebStorage, WebStorageError};
use crate::core::error::{LunaError, Result};
use crate::core::keys::generate_key;
use crate::db::models::{
    push_search_keyword, AdminConfig, Favorite, FavoriteMap, PlayRecord, PlayRecordMap, SkipConfig,
    SkipConfigMap,
};
use crate::db::storage::Storage;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// User owning the bare blob keys
pub const LOCAL_USER: &str = "local";

pub const PLAY_RECORDS_KEY: &str = "moontv_play_records";
pub const FAVORITES_KEY: &str = "moontv_favorites";
pub const SEARCH_HISTORY_KEY: &str = "moontv_search_history";
pub const SKIP_CONFIGS_KEY: &str = "moontv_skip_configs";
pub const USERS_KEY: &str = "moontv_users";
pub const ADMIN_CONFIG_KEY: &str = "moontv_admin_config";

const USER_SCOPED_KEYS: [&str; 4] = [
    PLAY_RECORDS_KEY,
    FAVORITES_KEY,
    SEARCH_HISTORY_KEY,
    SKIP_CONFIGS_KEY,
];

/// Username to stored credential
type UserTable = BTreeMap<String, String>;

fn scoped_key(base: &str, user: &str) -> String {
    if user == LOCAL_USER {
        base.to_string()
    } else {
        format!("{}:{}", base, user)
    }
}

impl From<WebStorageError> for LunaError {
    fn from(e: WebStorageError) -> Self {
        LunaError::StorageError(e.to_string())
    }
}

pub struct LocalStorage {
    area: Arc<dyn WebStorage>,
}

impl LocalStorage {
    pub fn new(area: Arc<dyn WebStorage>) -> Self {
        Self { area }
    }

    /// Read a blob. An unparseable blob is reported as a read failure.
    fn read_blob<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        let Some(raw) = self.area.get_item(key) else {
            return Ok(T::default());
        };
        serde_json::from_str(&raw).map_err(|e| {
            tracing::warn!(key = %key, "Unreadable local blob: {}", e);
            LunaError::DeserializationError(format!("corrupt local data under '{}': {}", key, e))
        })
    }

    fn write_blob<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.area.set_item(key, &raw)?;
        Ok(())
    }

    fn update_blob<T, F>(&self, key: &str, f: F) -> Result<()>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T),
    {
        // A corrupt blob is overwritten so writes can recover from it
        let mut value: T = self.read_blob(key).unwrap_or_default();
        f(&mut value);
        self.write_blob(key, &value)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn name(&self) -> &'static str {
        "localstorage"
    }

    async fn get_play_record(&self, user: &str, key: &str) -> Result<Option<PlayRecord>> {
        let records: PlayRecordMap = self.read_blob(&scoped_key(PLAY_RECORDS_KEY, user))?;
        Ok(records.get(key).cloned())
    }

    async fn set_play_record(&self, user: &str, key: &str, record: &PlayRecord) -> Result<()> {
        self.update_blob(&scoped_key(PLAY_RECORDS_KEY, user), |records: &mut PlayRecordMap| {
            records.insert(key.to_string(), record.clone());
        })
    }

    async fn get_all_play_records(&self, user: &str) -> Result<PlayRecordMap> {
        self.read_blob(&scoped_key(PLAY_RECORDS_KEY, user))
    }

    async fn delete_play_record(&self, user: &str, key: &str) -> Result<()> {
        self.update_blob(&scoped_key(PLAY_RECORDS_KEY, user), |records: &mut PlayRecordMap| {
            records.remove(key);
        })
    }

    async fn clear_play_records(&self, user: &str) -> Result<()> {
        self.area.remove_item(&scoped_key(PLAY_RECORDS_KEY, user));
        Ok(())
    }

    async fn get_favorite(&self, user: &str, key: &str) -> Result<Option<Favorite>> {
        let favorites: FavoriteMap = self.read_blob(&scoped_key(FAVORITES_KEY, user))?;
        Ok(favorites.get(key).cloned())
    }

    async fn set_favorite(&self, user: &str, key: &str, favorite: &Favorite) -> Result<()> {
        self.update_blob(&scoped_key(FAVORITES_KEY, user), |favorites: &mut FavoriteMap| {
            favorites.insert(key.to_string(), favorite.clone());
        })
    }

    async fn get_all_favorites(&self, user: &str) -> Result<FavoriteMap> {
        self.read_blob(&scoped_key(FAVORITES_KEY, user))
    }

    async fn delete_favorite(&self, user: &str, key: &str) -> Result<()> {
        self.update_blob(&scoped_key(FAVORITES_KEY, user), |favorites: &mut FavoriteMap| {
            favorites.remove(key);
        })
    }

    async fn clear_favorites(&self, user: &str) -> Result<()> {
        self.area.remove_item(&scoped_key(FAVORITES_KEY, user));
        Ok(())
    }

    async fn get_skip_config(&self, user: &str, source: &str, id: &str) -> Result<Option<SkipConfig>> {
        let key = generate_key(source, id)?;
        let configs: SkipConfigMap = self.read_blob(&scoped_key(SKIP_CONFIGS_KEY, user))?;
        Ok(configs.get(&key).cloned())
    }

    async fn set_skip_config(&self, user: &str, source: &str, id: &str, config: &SkipConfig) -> Result<()> {
        let key = generate_key(source, id)?;
        self.update_blob(&scoped_key(SKIP_CONFIGS_KEY, user), |configs: &mut SkipConfigMap| {
            configs.insert(key, config.clone());
        })
    }

    async fn delete_skip_config(&self, user: &str, source: &str, id: &str) -> Result<()> {
        let key = generate_key(source, id)?;
        self.update_blob(&scoped_key(SKIP_CONFIGS_KEY, user), |configs: &mut SkipConfigMap| {
            configs.remove(&key);
        })
    }

    async fn get_all_skip_configs(&self, user: &str) -> Result<SkipConfigMap> {
        self.read_blob(&scoped_key(SKIP_CONFIGS_KEY, user))
    }

    async fn get_user_password_hash(&self, user: &str) -> Result<Option<String>> {
        let users: UserTable = self.read_blob(USERS_KEY)?;
        Ok(users.get(user).cloned())
    }

    async fn set_user_password_hash(&self, user: &str, hash: &str) -> Result<()> {
        self.update_blob(USERS_KEY, |users: &mut UserTable| {
            users.insert(user.to_string(), hash.to_string());
        })
    }

    async fn check_user_exist(&self, user: &str) -> Result<bool> {
        let users: UserTable = self.read_blob(USERS_KEY)?;
        Ok(users.contains_key(user))
    }

    async fn delete_user(&self, user: &str) -> Result<()> {
        for base in USER_SCOPED_KEYS {
            self.area.remove_item(&scoped_key(base, user));
        }
        self.update_blob(USERS_KEY, |users: &mut UserTable| {
            users.remove(user);
        })
    }

    async fn get_all_users(&self) -> Result<Vec<String>> {
        let users: UserTable = self.read_blob(USERS_KEY)?;
        Ok(users.into_keys().collect())
    }

    async fn get_search_history(&self, user: &str) -> Result<Vec<String>> {
        self.read_blob(&scoped_key(SEARCH_HISTORY_KEY, user))
    }

    async fn add_search_history(&self, user: &str, keyword: &str) -> Result<()> {
        self.update_blob(&scoped_key(SEARCH_HISTORY_KEY, user), |history: &mut Vec<String>| {
            push_search_keyword(history, keyword);
        })
    }

    async fn delete_search_history(&self, user: &str, keyword: Option<&str>) -> Result<()> {
        let key = scoped_key(SEARCH_HISTORY_KEY, user);
        match keyword {
            Some(keyword) => self.update_blob(&key, |history: &mut Vec<String>| {
                history.retain(|k| k != keyword);
            }),
            None => {
                self.area.remove_item(&key);
                Ok(())
            }
        }
    }

    async fn get_admin_config(&self) -> Result<Option<AdminConfig>> {
        self.read_blob(ADMIN_CONFIG_KEY)
    }

    async fn set_admin_config(&self, config: &AdminConfig) -> Result<()> {
        self.write_blob(ADMIN_CONFIG_KEY, config)
    }

    async fn clear_all_data(&self) -> Result<()> {
        let owned = |key: &str| {
            USER_SCOPED_KEYS
                .iter()
                .any(|base| key == *base || key.starts_with(&format!("{}:", base)))
        };

        let mut removed = 0;
        for key in self.area.keys() {
            if owned(&key) || key == USERS_KEY || key == ADMIN_CONFIG_KEY {
                self.area.remove_item(&key);
                removed += 1;
            }
        }

        tracing::info!(removed, "Cleared all local data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::web_storage::MemoryWebStorage;
    use crate::db::conformance;

    fn storage() -> (Arc<MemoryWebStorage>, LocalStorage) {
        let area = Arc::new(MemoryWebStorage::new());
        (area.clone(), LocalStorage::new(area))
    }

    #[tokio::test]
    async fn test_local_conformance() {
        let (_area, storage) = storage();
        conformance::run_all(&storage).await;
    }

    #[tokio::test]
    async fn test_local_user_uses_bare_keys() {
        let (area, storage) = storage();
        storage
            .set_play_record(LOCAL_USER, "bilibili+1", &conformance::play_record("A"))
            .await
            .unwrap();
        storage.add_search_history(LOCAL_USER, "foo").await.unwrap();
        storage.add_search_history("guest", "bar").await.unwrap();

        assert!(area.get_item(PLAY_RECORDS_KEY).is_some());
        assert_eq!(area.get_item(SEARCH_HISTORY_KEY).as_deref(), Some(r#"["foo"]"#));
        assert_eq!(
            area.get_item("moontv_search_history:guest").as_deref(),
            Some(r#"["bar"]"#)
        );
    }

    #[tokio::test]
    async fn test_corrupt_blob_fails_reads_until_rewritten() {
        let (area, storage) = storage();
        area.set_item(FAVORITES_KEY, "{not json").unwrap();

        let err = storage.get_all_favorites(LOCAL_USER).await.unwrap_err();
        assert!(matches!(err, LunaError::DeserializationError(_)));

        storage
            .set_favorite(LOCAL_USER, "douban+1", &conformance::favorite("F"))
            .await
            .unwrap();
        assert_eq!(storage.get_all_favorites(LOCAL_USER).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_quota_exceeded_is_a_storage_error() {
        let area = Arc::new(MemoryWebStorage::with_quota(64));
        let storage = LocalStorage::new(area);

        let err = storage
            .set_play_record(LOCAL_USER, "bilibili+1", &conformance::play_record("Long Title"))
            .await
            .unwrap_err();
        assert!(matches!(err, LunaError::StorageError(_)));
    }

    #[tokio::test]
    async fn test_clear_all_data_keeps_cache_blobs() {
        let (area, storage) = storage();
        area.set_item("moontv_cache_alice", "{}").unwrap();
        storage.add_search_history("alice", "kw").await.unwrap();
        storage.set_admin_config(&AdminConfig::default()).await.unwrap();

        storage.clear_all_data().await.unwrap();

        assert_eq!(area.keys(), vec!["moontv_cache_alice"]);
    }
}
