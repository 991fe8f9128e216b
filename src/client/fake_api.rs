//! Scriptable in-process server for client tests

use super::api_client::UserDataApi;
use crate::cache::CacheKind;
use crate::core::error::{LunaError, Result};
use crate::db::models::{
    push_search_keyword, Favorite, FavoriteMap, PlayRecord, PlayRecordMap, SkipConfig, SkipConfigMap,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct ServerData {
    play_records: PlayRecordMap,
    favorites: FavoriteMap,
    search_history: Vec<String>,
    skip_configs: SkipConfigMap,
}

#[derive(Default)]
pub struct FakeApi {
    data: Mutex<ServerData>,
    calls: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    failing_kinds: Mutex<HashSet<CacheKind>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make fetches of one kind fail
    pub fn fail_kind(&self, kind: CacheKind) {
        self.failing_kinds.lock().unwrap().insert(kind);
    }

    pub fn seed_play_record(&self, key: &str, record: PlayRecord) {
        self.data.lock().unwrap().play_records.insert(key.to_string(), record);
    }

    pub fn seed_favorite(&self, key: &str, favorite: Favorite) {
        self.data.lock().unwrap().favorites.insert(key.to_string(), favorite);
    }

    pub fn seed_search_history(&self, history: Vec<String>) {
        self.data.lock().unwrap().search_history = history;
    }

    pub fn seed_skip_config(&self, key: &str, config: SkipConfig) {
        self.data.lock().unwrap().skip_configs.insert(key.to_string(), config);
    }

    pub fn play_records(&self) -> PlayRecordMap {
        self.data.lock().unwrap().play_records.clone()
    }

    pub fn favorites(&self) -> FavoriteMap {
        self.data.lock().unwrap().favorites.clone()
    }

    pub fn search_history(&self) -> Vec<String> {
        self.data.lock().unwrap().search_history.clone()
    }

    pub fn skip_configs(&self) -> SkipConfigMap {
        self.data.lock().unwrap().skip_configs.clone()
    }

    fn read(&self, kind: CacheKind) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) || self.failing_kinds.lock().unwrap().contains(&kind) {
            return Err(LunaError::NetworkError("Request failed: 500 Internal Server Error".into()));
        }
        Ok(())
    }

    fn write(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LunaError::NetworkError("Request failed: 500 Internal Server Error".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserDataApi for FakeApi {
    async fn fetch_play_records(&self) -> Result<PlayRecordMap> {
        self.read(CacheKind::PlayRecords)?;
        Ok(self.play_records())
    }

    async fn save_play_record(&self, key: &str, record: &PlayRecord) -> Result<()> {
        self.write()?;
        self.seed_play_record(key, record.clone());
        Ok(())
    }

    async fn delete_play_record(&self, key: &str) -> Result<()> {
        self.write()?;
        self.data.lock().unwrap().play_records.remove(key);
        Ok(())
    }

    async fn clear_play_records(&self) -> Result<()> {
        self.write()?;
        self.data.lock().unwrap().play_records.clear();
        Ok(())
    }

    async fn fetch_favorites(&self) -> Result<FavoriteMap> {
        self.read(CacheKind::Favorites)?;
        Ok(self.favorites())
    }

    async fn save_favorite(&self, key: &str, favorite: &Favorite) -> Result<()> {
        self.write()?;
        self.seed_favorite(key, favorite.clone());
        Ok(())
    }

    async fn delete_favorite(&self, key: &str) -> Result<()> {
        self.write()?;
        self.data.lock().unwrap().favorites.remove(key);
        Ok(())
    }

    async fn clear_favorites(&self) -> Result<()> {
        self.write()?;
        self.data.lock().unwrap().favorites.clear();
        Ok(())
    }

    async fn fetch_search_history(&self) -> Result<Vec<String>> {
        self.read(CacheKind::SearchHistory)?;
        Ok(self.search_history())
    }

    async fn add_search_history(&self, keyword: &str) -> Result<()> {
        self.write()?;
        push_search_keyword(&mut self.data.lock().unwrap().search_history, keyword);
        Ok(())
    }

    async fn delete_search_history(&self, keyword: Option<&str>) -> Result<()> {
        self.write()?;
        let mut data = self.data.lock().unwrap();
        match keyword {
            Some(keyword) => data.search_history.retain(|k| k != keyword),
            None => data.search_history.clear(),
        }
        Ok(())
    }

    async fn fetch_skip_configs(&self) -> Result<SkipConfigMap> {
        self.read(CacheKind::SkipConfigs)?;
        Ok(self.skip_configs())
    }

    async fn save_skip_config(&self, key: &str, config: &SkipConfig) -> Result<()> {
        self.write()?;
        self.seed_skip_config(key, config.clone());
        Ok(())
    }

    async fn delete_skip_config(&self, key: &str) -> Result<()> {
        self.write()?;
        self.data.lock().unwrap().skip_configs.remove(key);
        Ok(())
    }
}
