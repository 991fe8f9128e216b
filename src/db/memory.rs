//! In-memory backend for development and tests. Data is lost on restart.

use crate::core::error::Result;
use crate::core::keys::generate_key;
use crate::db::models::{
    push_search_keyword, AdminConfig, Favorite, FavoriteMap, PlayRecord, PlayRecordMap, SkipConfig,
    SkipConfigMap,
};
use crate::db::storage::Storage;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
    play_records: HashMap<String, PlayRecordMap>,
    favorites: HashMap<String, FavoriteMap>,
    skip_configs: HashMap<String, SkipConfigMap>,
    search_history: HashMap<String, Vec<String>>,
    passwords: HashMap<String, String>,
    admin_config: Option<AdminConfig>,
}

impl MemoryState {
    fn remove_user(&mut self, user: &str) {
        self.play_records.remove(user);
        self.favorites.remove(user);
        self.skip_configs.remove(user);
        self.search_history.remove(user);
        self.passwords.remove(user);
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_play_record(&self, user: &str, key: &str) -> Result<Option<PlayRecord>> {
        let state = self.state.read().await;
        Ok(state.play_records.get(user).and_then(|m| m.get(key)).cloned())
    }

    async fn set_play_record(&self, user: &str, key: &str, record: &PlayRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .play_records
            .entry(user.to_string())
            .or_default()
            .insert(key.to_string(), record.clone());
        Ok(())
    }

    async fn get_all_play_records(&self, user: &str) -> Result<PlayRecordMap> {
        let state = self.state.read().await;
        Ok(state.play_records.get(user).cloned().unwrap_or_default())
    }

    async fn delete_play_record(&self, user: &str, key: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(records) = state.play_records.get_mut(user) {
            records.remove(key);
        }
        Ok(())
    }

    async fn clear_play_records(&self, user: &str) -> Result<()> {
        self.state.write().await.play_records.remove(user);
        Ok(())
    }

    async fn get_favorite(&self, user: &str, key: &str) -> Result<Option<Favorite>> {
        let state = self.state.read().await;
        Ok(state.favorites.get(user).and_then(|m| m.get(key)).cloned())
    }

    async fn set_favorite(&self, user: &str, key: &str, favorite: &Favorite) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .favorites
            .entry(user.to_string())
            .or_default()
            .insert(key.to_string(), favorite.clone());
        Ok(())
    }

    async fn get_all_favorites(&self, user: &str) -> Result<FavoriteMap> {
        let state = self.state.read().await;
        Ok(state.favorites.get(user).cloned().unwrap_or_default())
    }

    async fn delete_favorite(&self, user: &str, key: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(favorites) = state.favorites.get_mut(user) {
            favorites.remove(key);
        }
        Ok(())
    }

    async fn clear_favorites(&self, user: &str) -> Result<()> {
        self.state.write().await.favorites.remove(user);
        Ok(())
    }

    async fn get_skip_config(&self, user: &str, source: &str, id: &str) -> Result<Option<SkipConfig>> {
        let key = generate_key(source, id)?;
        let state = self.state.read().await;
        Ok(state.skip_configs.get(user).and_then(|m| m.get(&key)).cloned())
    }

    async fn set_skip_config(&self, user: &str, source: &str, id: &str, config: &SkipConfig) -> Result<()> {
        let key = generate_key(source, id)?;
        let mut state = self.state.write().await;
        state
            .skip_configs
            .entry(user.to_string())
            .or_default()
            .insert(key, config.clone());
        Ok(())
    }

    async fn delete_skip_config(&self, user: &str, source: &str, id: &str) -> Result<()> {
        let key = generate_key(source, id)?;
        let mut state = self.state.write().await;
        if let Some(configs) = state.skip_configs.get_mut(user) {
            configs.remove(&key);
        }
        Ok(())
    }

    async fn get_all_skip_configs(&self, user: &str) -> Result<SkipConfigMap> {
        let state = self.state.read().await;
        Ok(state.skip_configs.get(user).cloned().unwrap_or_default())
    }

    async fn get_user_password_hash(&self, user: &str) -> Result<Option<String>> {
        Ok(self.state.read().await.passwords.get(user).cloned())
    }

    async fn set_user_password_hash(&self, user: &str, hash: &str) -> Result<()> {
        self.state
            .write()
            .await
            .passwords
            .insert(user.to_string(), hash.to_string());
        Ok(())
    }

    async fn check_user_exist(&self, user: &str) -> Result<bool> {
        Ok(self.state.read().await.passwords.contains_key(user))
    }

    async fn delete_user(&self, user: &str) -> Result<()> {
        self.state.write().await.remove_user(user);
        Ok(())
    }

    async fn get_all_users(&self) -> Result<Vec<String>> {
        let state = self.state.read().await;
        let mut users: Vec<String> = state.passwords.keys().cloned().collect();
        users.sort();
        Ok(users)
    }

    async fn get_search_history(&self, user: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        Ok(state.search_history.get(user).cloned().unwrap_or_default())
    }

    async fn add_search_history(&self, user: &str, keyword: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let history = state.search_history.entry(user.to_string()).or_default();
        push_search_keyword(history, keyword);
        Ok(())
    }

    async fn delete_search_history(&self, user: &str, keyword: Option<&str>) -> Result<()> {
        let mut state = self.state.write().await;
        match keyword {
            Some(keyword) => {
                if let Some(history) = state.search_history.get_mut(user) {
                    history.retain(|k| k != keyword);
                }
            }
            None => {
                state.search_history.remove(user);
            }
        }
        Ok(())
    }

    async fn get_admin_config(&self) -> Result<Option<AdminConfig>> {
        Ok(self.state.read().await.admin_config.clone())
    }

    async fn set_admin_config(&self, config: &AdminConfig) -> Result<()> {
        self.state.write().await.admin_config = Some(config.clone());
        Ok(())
    }

    async fn clear_all_data(&self) -> Result<()> {
        let mut state = self.state.write().await;
        *state = MemoryState::default();
        tracing::info!("Cleared all in-memory data");
        Ok(())
    }
}
