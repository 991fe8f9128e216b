//! Client-side cache of user data
//!
//! Each user has one JSON blob in the web storage area under
//! `{prefix}{username}`. The blob maps a data kind to an envelope holding the
//! data, the time it was cached and the cache format version. An envelope is
//! valid while its version matches and it is younger than the TTL.

use crate::client::web_storage::{WebStorage, WebStorageError};
use crate::core::config::CacheConfig as CacheSection;
use crate::core::event_bus::EventType;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const CACHE_PREFIX: &str = "moontv_cache_";

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Quota(#[from] WebStorageError),
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheKind {
    PlayRecords,
    Favorites,
    SearchHistory,
    SkipConfigs,
}

impl CacheKind {
    pub const ALL: [CacheKind; 4] = [
        CacheKind::PlayRecords,
        CacheKind::Favorites,
        CacheKind::SearchHistory,
        CacheKind::SkipConfigs,
    ];

    /// Event published when this kind's data changes
    pub fn event_type(&self) -> EventType {
        match self {
            CacheKind::PlayRecords => EventType::PlayRecordsUpdated,
            CacheKind::Favorites => EventType::FavoritesUpdated,
            CacheKind::SearchHistory => EventType::SearchHistoryUpdated,
            CacheKind::SkipConfigs => EventType::SkipConfigsUpdated,
        }
    }

    /// Kinds dropped first when a blob grows too large
    fn is_prunable(&self) -> bool {
        matches!(self, CacheKind::PlayRecords | CacheKind::Favorites)
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub prefix: String,
    pub version: String,
    pub ttl: Duration,
    pub max_bytes: usize,
    pub retention: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: CACHE_PREFIX.to_string(),
            version: "1.0.0".to_string(),
            ttl: Duration::from_secs(60 * 60),
            max_bytes: 15 * 1024 * 1024,
            retention: Duration::from_millis(60 * MS_PER_DAY as u64),
        }
    }
}

impl From<&CacheSection> for CacheConfig {
    fn from(section: &CacheSection) -> Self {
        Self {
            prefix: CACHE_PREFIX.to_string(),
            version: section.version.clone(),
            ttl: Duration::from_secs(section.ttl_secs),
            max_bytes: section.max_bytes,
            retention: Duration::from_millis(section.retention_days * MS_PER_DAY as u64),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEnvelope {
    pub data: Value,
    /// Milliseconds since the epoch
    pub timestamp: i64,
    pub version: String,
}

impl CacheEnvelope {
    pub fn is_valid_at(&self, now: i64, config: &CacheConfig) -> bool {
        self.version == config.version && now - self.timestamp < config.ttl.as_millis() as i64
    }
}

/// Everything cached for one user
pub type UserCacheStore = BTreeMap<CacheKind, CacheEnvelope>;

/// Which kinds hold a valid envelope for a user
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub has_play_records: bool,
    pub has_favorites: bool,
    pub has_search_history: bool,
    pub has_skip_configs: bool,
}

impl CacheStatus {
    pub fn is_complete(&self) -> bool {
        self.has_play_records && self.has_favorites && self.has_search_history && self.has_skip_configs
    }
}

/// Milliseconds since the epoch
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp_millis())
}

pub struct CacheManager {
    area: Arc<dyn WebStorage>,
    config: CacheConfig,
    clock: Clock,
}

impl CacheManager {
    pub fn new(area: Arc<dyn WebStorage>, config: CacheConfig) -> Self {
        Self {
            area,
            config,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    fn storage_key(&self, user: &str) -> String {
        format!("{}{}", self.config.prefix, user)
    }

    /// Load a user's blob. A blob that fails to parse is removed and reads as
    /// empty.
    fn load(&self, user: &str) -> UserCacheStore {
        let key = self.storage_key(user);
        let Some(raw) = self.area.get_item(&key) else {
            return UserCacheStore::new();
        };

        match serde_json::from_str(&raw) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(username = %user, "Discarding corrupt cache blob: {}", e);
                self.area.remove_item(&key);
                UserCacheStore::new()
            }
        }
    }

    /// Valid cached data of `kind`, if any
    pub fn cached<T: DeserializeOwned>(&self, user: &str, kind: CacheKind) -> Option<T> {
        if user.is_empty() {
            return None;
        }

        let now = self.now();
        let envelope = self.load(user).remove(&kind)?;
        if !envelope.is_valid_at(now, &self.config) {
            return None;
        }

        match serde_json::from_value(envelope.data) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(username = %user, kind = ?kind, "Cached data has unexpected shape: {}", e);
                None
            }
        }
    }

    /// Cache `data` for `kind` with a fresh timestamp. Failures are logged;
    /// the cache is best effort.
    pub fn store<T: Serialize>(&self, user: &str, kind: CacheKind, data: &T) {
        if user.is_empty() {
            return;
        }

        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(username = %user, kind = ?kind, "Failed to serialize cache data: {}", e);
                return;
            }
        };

        let mut store = self.load(user);
        store.insert(
            kind,
            CacheEnvelope {
                data,
                timestamp: self.now(),
                version: self.config.version.clone(),
            },
        );
        self.save(user, store);
    }

    /// Drop one kind so the next read goes to the network
    pub fn invalidate(&self, user: &str, kind: CacheKind) {
        if user.is_empty() {
            return;
        }
        let mut store = self.load(user);
        if store.remove(&kind).is_some() {
            self.save(user, store);
        }
    }

    fn save(&self, user: &str, mut store: UserCacheStore) {
        let key = self.storage_key(user);

        let result = self.encode(&mut store).and_then(|raw| match self.area.set_item(&key, &raw) {
            Ok(()) => Ok(()),
            Err(WebStorageError::QuotaExceeded { .. }) => {
                tracing::warn!(username = %user, "Storage quota exceeded, clearing all caches");
                self.clear_all_caches();
                self.area.set_item(&key, &raw).map_err(CacheError::from)
            }
        });

        if let Err(e) = result {
            tracing::error!(username = %user, "Failed to write cache: {}", e);
        }
    }

    /// Serialize a blob, first dropping stale bulky envelopes when it is
    /// over the size limit
    fn encode(&self, store: &mut UserCacheStore) -> Result<String> {
        let raw = serde_json::to_string(store)?;
        if raw.len() <= self.config.max_bytes {
            return Ok(raw);
        }

        let cutoff = self.now() - self.config.retention.as_millis() as i64;
        let before = store.len();
        store.retain(|kind, envelope| !(kind.is_prunable() && envelope.timestamp < cutoff));
        tracing::info!(
            bytes = raw.len(),
            pruned = before - store.len(),
            "Cache blob over size limit, pruned old entries"
        );

        Ok(serde_json::to_string(store)?)
    }

    pub fn clear_user_cache(&self, user: &str) {
        if user.is_empty() {
            return;
        }
        self.area.remove_item(&self.storage_key(user));
        tracing::debug!(username = %user, "Cleared user cache");
    }

    fn cache_keys(&self) -> Vec<String> {
        self.area
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(&self.config.prefix))
            .collect()
    }

    /// Remove every user's cache blob. Returns how many were removed.
    pub fn clear_all_caches(&self) -> usize {
        let keys = self.cache_keys();
        for key in &keys {
            self.area.remove_item(key);
        }
        keys.len()
    }

    /// Remove blobs that fail to parse or hold no valid envelope. Returns how
    /// many were removed.
    pub fn clear_expired_caches(&self) -> usize {
        let now = self.now();
        let mut removed = 0;

        for key in self.cache_keys() {
            let Some(raw) = self.area.get_item(&key) else {
                continue;
            };
            let expired = match serde_json::from_str::<UserCacheStore>(&raw) {
                Ok(store) => !store.values().any(|e| e.is_valid_at(now, &self.config)),
                Err(_) => true,
            };
            if expired {
                self.area.remove_item(&key);
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(removed, "Removed expired cache blobs");
        }
        removed
    }

    pub fn cache_status(&self, user: &str) -> CacheStatus {
        if user.is_empty() {
            return CacheStatus::default();
        }

        let now = self.now();
        let store = self.load(user);
        let valid = |kind: CacheKind| {
            store
                .get(&kind)
                .map(|e| e.is_valid_at(now, &self.config))
                .unwrap_or(false)
        };

        CacheStatus {
            has_play_records: valid(CacheKind::PlayRecords),
            has_favorites: valid(CacheKind::Favorites),
            has_search_history: valid(CacheKind::SearchHistory),
            has_skip_configs: valid(CacheKind::SkipConfigs),
        }
    }

    /// Run [`clear_expired_caches`](Self::clear_expired_caches) once after
    /// `delay`
    pub fn spawn_expired_sweep(self: &Arc<Self>, delay: Duration) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.clear_expired_caches();
        })
    }
}
