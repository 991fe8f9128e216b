//! Client-side user data access
//!
//! [`UserDataClient`] is what the browser bundle talks to. Depending on the
//! deployment it either keeps everything in the local web storage area, or
//! treats the server as the source of truth and keeps a cache in front of
//! it:
//!
//! - reads return cached data at once and refresh it in the background,
//!   announcing the new data only when it actually changed;
//! - writes update the cache and announce the change before the server call
//!   completes. A rejected write resynchronizes the cache from the server and
//!   raises a single global error.
//!
//! Without a web storage area (server-side rendering) every read is empty
//! and every write is ignored.

pub mod api_client;
mod favorites;
mod play_records;
mod search_history;
mod skip_configs;
pub mod web_storage;

#[cfg(test)]
mod fake_api;

pub use api_client::{HttpUserDataApi, UserDataApi};
pub use favorites::Favorites;
pub use play_records::PlayRecords;
pub use search_history::SearchHistory;
pub use skip_configs::SkipConfigs;
pub use web_storage::{MemoryWebStorage, WebStorage, WebStorageError};

use crate::cache::{CacheConfig, CacheKind, CacheManager};
use crate::core::error::{LunaError, Result};
use crate::core::event_bus::{Event, EventBus};
use crate::db::local::LocalStorage;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Where the signed-in user's data lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    LocalStorage,
    Remote,
}

impl StorageMode {
    /// Mode matching a server storage backend name
    pub fn for_backend(name: &str) -> Self {
        if name == "localstorage" {
            StorageMode::LocalStorage
        } else {
            StorageMode::Remote
        }
    }
}

/// How an operation reaches the data
pub(crate) enum Target<'a> {
    Unavailable,
    Local(&'a LocalStorage),
    Remote { cache: &'a CacheManager, user: &'a str },
}

#[derive(Clone)]
pub struct UserDataClient {
    mode: StorageMode,
    user: Option<String>,
    api: Arc<dyn UserDataApi>,
    events: EventBus,
    cache: Option<Arc<CacheManager>>,
    local: Option<Arc<LocalStorage>>,
}

impl UserDataClient {
    /// Client without a web storage area
    pub fn new(mode: StorageMode, api: Arc<dyn UserDataApi>, events: EventBus) -> Self {
        Self {
            mode,
            user: None,
            api,
            events,
            cache: None,
            local: None,
        }
    }

    pub fn with_web_storage(mut self, area: Arc<dyn WebStorage>, config: CacheConfig) -> Self {
        self.cache = Some(Arc::new(CacheManager::new(area.clone(), config)));
        self.local = Some(Arc::new(LocalStorage::new(area)));
        self
    }

    pub fn with_cache(mut self, cache: Arc<CacheManager>, local: Arc<LocalStorage>) -> Self {
        self.cache = Some(cache);
        self.local = Some(local);
        self
    }

    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn play_records(&self) -> PlayRecords<'_> {
        PlayRecords::new(self)
    }

    pub fn favorites(&self) -> Favorites<'_> {
        Favorites::new(self)
    }

    pub fn search_history(&self) -> SearchHistory<'_> {
        SearchHistory::new(self)
    }

    pub fn skip_configs(&self) -> SkipConfigs<'_> {
        SkipConfigs::new(self)
    }

    fn user_name(&self) -> &str {
        self.user.as_deref().unwrap_or_default()
    }

    pub(crate) fn target(&self) -> Target<'_> {
        match (&self.cache, &self.local, self.mode) {
            (Some(_), Some(local), StorageMode::LocalStorage) => Target::Local(local),
            (Some(cache), Some(_), StorageMode::Remote) => Target::Remote {
                cache,
                user: self.user_name(),
            },
            _ => Target::Unavailable,
        }
    }

    pub(crate) fn api(&self) -> &dyn UserDataApi {
        self.api.as_ref()
    }

    pub(crate) async fn announce<T: Serialize>(&self, kind: CacheKind, data: &T) {
        match serde_json::to_value(data) {
            Ok(value) => self.events.publish(Event::new(kind.event_type(), value)).await,
            Err(e) => tracing::error!(kind = ?kind, "Failed to encode update event: {}", e),
        }
    }

    /// Local read path. A failed read is logged, reported on the event bus
    /// and reads as empty.
    pub(crate) async fn local_read<T: Default>(&self, kind: CacheKind, result: Result<T>) -> T {
        match result {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(kind = ?kind, "Failed to read local {}: {}", kind_label(kind), e);
                self.events
                    .publish_error(format!("Failed to load {}: {}", kind_label(kind), e))
                    .await;
                T::default()
            }
        }
    }

    /// Finish a local mutation. `result` carries the data after the write,
    /// which is announced; a failure is reported once and returned.
    pub(crate) async fn local_write<T: Serialize>(&self, kind: CacheKind, result: Result<T>) -> Result<()> {
        match result {
            Ok(data) => {
                self.announce(kind, &data).await;
                Ok(())
            }
            Err(e) => {
                tracing::error!(kind = ?kind, "Failed to save local {}: {}", kind_label(kind), e);
                self.events
                    .publish_error(format!("Failed to save {}: {}", kind_label(kind), e))
                    .await;
                Err(e)
            }
        }
    }

    async fn fetch_value(&self, kind: CacheKind) -> Result<Value> {
        let value = match kind {
            CacheKind::PlayRecords => serde_json::to_value(self.api.fetch_play_records().await?)?,
            CacheKind::Favorites => serde_json::to_value(self.api.fetch_favorites().await?)?,
            CacheKind::SearchHistory => serde_json::to_value(self.api.fetch_search_history().await?)?,
            CacheKind::SkipConfigs => serde_json::to_value(self.api.fetch_skip_configs().await?)?,
        };
        Ok(value)
    }

    /// Remote read path: cached data with a background refresh, or a fetch on
    /// a miss. A failed fetch is reported on the event bus and reads as empty.
    pub(crate) async fn read_through<T>(&self, cache: &CacheManager, user: &str, kind: CacheKind) -> T
    where
        T: Serialize + DeserializeOwned + Default,
    {
        if let Some(cached) = cache.cached::<T>(user, kind) {
            match serde_json::to_value(&cached) {
                Ok(snapshot) => self.spawn_refresh(kind, snapshot),
                Err(e) => tracing::warn!(kind = ?kind, "Skipping background refresh: {}", e),
            }
            return cached;
        }

        let fetched = self
            .fetch_value(kind)
            .await
            .and_then(|value| serde_json::from_value::<T>(value).map_err(LunaError::from));

        match fetched {
            Ok(data) => {
                cache.store(user, kind, &data);
                data
            }
            Err(e) => {
                tracing::error!(kind = ?kind, "Failed to load user data: {}", e);
                self.events
                    .publish_error(format!("Failed to load {}: {}", kind_label(kind), e))
                    .await;
                T::default()
            }
        }
    }

    /// Refresh `kind` from the server without blocking the caller. The new
    /// data is cached and announced only when it differs from `snapshot`.
    fn spawn_refresh(&self, kind: CacheKind, snapshot: Value) {
        let client = self.clone();
        tokio::spawn(async move {
            let Some(cache) = client.cache.clone() else {
                return;
            };
            let user = client.user_name();

            match client.fetch_value(kind).await {
                Ok(fresh) if fresh != snapshot => {
                    cache.store(user, kind, &fresh);
                    client.events.publish(Event::new(kind.event_type(), fresh)).await;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(kind = ?kind, "Background refresh failed: {}", e);
                    client
                        .events
                        .publish_error(format!("Failed to refresh {}: {}", kind_label(kind), e))
                        .await;
                }
            }
        });
    }

    /// Replace the cached copy of `kind` with the server's and announce it
    async fn resync(&self, kind: CacheKind) -> Result<()> {
        let Target::Remote { cache, user } = self.target() else {
            return Ok(());
        };

        let fresh = self.fetch_value(kind).await?;
        cache.store(user, kind, &fresh);
        self.events.publish(Event::new(kind.event_type(), fresh)).await;
        Ok(())
    }

    /// Resynchronize one kind with the server. A failure is reported on the
    /// event bus.
    pub async fn reconcile(&self, kind: CacheKind) -> Result<()> {
        if let Err(e) = self.resync(kind).await {
            tracing::error!(kind = ?kind, "Failed to reconcile cache: {}", e);
            self.events
                .publish_error(format!("Failed to refresh {}: {}", kind_label(kind), e))
                .await;
            return Err(e);
        }
        Ok(())
    }

    /// Finish an optimistic write. On failure the cache is resynchronized and
    /// exactly one global error is published before the error is returned.
    pub(crate) async fn settle(&self, kind: CacheKind, result: Result<()>) -> Result<()> {
        let Err(e) = result else {
            return Ok(());
        };

        tracing::error!(kind = ?kind, "Server rejected {} update: {}", kind_label(kind), e);
        if let Err(resync_error) = self.resync(kind).await {
            tracing::warn!(kind = ?kind, "Cache resync after failed write also failed: {}", resync_error);
        }
        self.events
            .publish_error(format!("Failed to save {}: {}", kind_label(kind), e))
            .await;
        Err(e)
    }

    /// Fetch all four kinds concurrently and cache each one that arrived
    pub async fn refresh_all_cache(&self) {
        let Target::Remote { cache, user } = self.target() else {
            return;
        };
        if user.is_empty() {
            return;
        }

        let results =
            futures::future::join_all(CacheKind::ALL.iter().map(|kind| self.fetch_value(*kind))).await;

        for (kind, result) in CacheKind::ALL.iter().zip(results) {
            match result {
                Ok(data) => {
                    cache.store(user, *kind, &data);
                    self.events.publish(Event::new(kind.event_type(), data)).await;
                }
                Err(e) => tracing::warn!(kind = ?kind, "Failed to refresh cache: {}", e),
            }
        }
    }

    /// Warm the cache after sign-in unless every kind is already cached
    pub async fn preload_user_data(&self) {
        let Target::Remote { cache, user } = self.target() else {
            return;
        };
        if user.is_empty() {
            return;
        }

        if cache.cache_status(user).is_complete() {
            tracing::debug!(username = %user, "User data already cached, skipping preload");
            return;
        }
        self.refresh_all_cache().await;
    }

    /// Drop the signed-in user's cache, on logout
    pub fn clear_user_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear_user_cache(self.user_name());
        }
    }

    /// Schedule one sweep of expired cache blobs
    pub fn spawn_expired_sweep(&self, delay: Duration) -> Option<JoinHandle<()>> {
        self.cache.as_ref().map(|cache| cache.spawn_expired_sweep(delay))
    }
}

fn kind_label(kind: CacheKind) -> &'static str {
    match kind {
        CacheKind::PlayRecords => "play records",
        CacheKind::Favorites => "favorites",
        CacheKind::SearchHistory => "search history",
        CacheKind::SkipConfigs => "skip configs",
    }
}
