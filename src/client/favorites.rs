use super::{Target, UserDataClient};
use crate::cache::CacheKind;
use crate::core::error::Result;
use crate::core::keys::generate_key;
use crate::db::local::LOCAL_USER;
use crate::db::models::{Favorite, FavoriteMap};
use crate::db::storage::Storage;

const KIND: CacheKind = CacheKind::Favorites;

/// Favorites of the signed-in user, keyed by `source+id`
pub struct Favorites<'a> {
    client: &'a UserDataClient,
}

impl<'a> Favorites<'a> {
    pub(super) fn new(client: &'a UserDataClient) -> Self {
        Self { client }
    }

    pub async fn get_all(&self) -> FavoriteMap {
        match self.client.target() {
            Target::Unavailable => FavoriteMap::new(),
            Target::Local(local) => {
                let result = local.get_all_favorites(LOCAL_USER).await;
                self.client.local_read(KIND, result).await
            }
            Target::Remote { cache, user } => self.client.read_through(cache, user, KIND).await,
        }
    }

    pub async fn is_favorited(&self, source: &str, id: &str) -> bool {
        match generate_key(source, id) {
            Ok(key) => self.get_all().await.contains_key(&key),
            Err(_) => false,
        }
    }

    pub async fn save(&self, source: &str, id: &str, favorite: &Favorite) -> Result<()> {
        let key = generate_key(source, id)?;

        match self.client.target() {
            Target::Unavailable => Ok(()),
            Target::Local(local) => {
                let result = match local.set_favorite(LOCAL_USER, &key, favorite).await {
                    Ok(()) => local.get_all_favorites(LOCAL_USER).await,
                    Err(e) => Err(e),
                };
                self.client.local_write(KIND, result).await
            }
            Target::Remote { cache, user } => {
                let mut favorites: FavoriteMap = cache.cached(user, KIND).unwrap_or_default();
                favorites.insert(key.clone(), favorite.clone());
                cache.store(user, KIND, &favorites);
                self.client.announce(KIND, &favorites).await;

                let result = self.client.api().save_favorite(&key, favorite).await;
                self.client.settle(KIND, result).await
            }
        }
    }

    pub async fn delete(&self, source: &str, id: &str) -> Result<()> {
        let key = generate_key(source, id)?;

        match self.client.target() {
            Target::Unavailable => Ok(()),
            Target::Local(local) => {
                let result = match local.delete_favorite(LOCAL_USER, &key).await {
                    Ok(()) => local.get_all_favorites(LOCAL_USER).await,
                    Err(e) => Err(e),
                };
                self.client.local_write(KIND, result).await
            }
            Target::Remote { cache, user } => {
                let mut favorites: FavoriteMap = cache.cached(user, KIND).unwrap_or_default();
                favorites.remove(&key);
                cache.store(user, KIND, &favorites);
                self.client.announce(KIND, &favorites).await;

                let result = self.client.api().delete_favorite(&key).await;
                self.client.settle(KIND, result).await
            }
        }
    }

    pub async fn clear_all(&self) -> Result<()> {
        match self.client.target() {
            Target::Unavailable => Ok(()),
            Target::Local(local) => {
                let result = local.clear_favorites(LOCAL_USER).await.map(|()| FavoriteMap::new());
                self.client.local_write(KIND, result).await
            }
            Target::Remote { cache, user } => {
                let empty = FavoriteMap::new();
                cache.store(user, KIND, &empty);
                self.client.announce(KIND, &empty).await;

                let result = self.client.api().clear_favorites().await;
                self.client.settle(KIND, result).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::StorageMode;
    use crate::client::web_storage::WebStorage;
    use crate::core::event_bus::EventType;
    use crate::db::conformance::favorite;

    #[tokio::test]
    async fn test_is_favorited_reads_through_cache() {
        let h = harness(StorageMode::Remote);
        h.api.seed_favorite("douban+1", favorite("F"));

        assert!(h.client.favorites().is_favorited("douban", "1").await);
        assert!(!h.client.favorites().is_favorited("douban", "2").await);
        assert!(!h.client.favorites().is_favorited("", "2").await);
    }

    #[tokio::test]
    async fn test_save_and_delete_round_trip() {
        let h = harness(StorageMode::Remote);

        h.client.favorites().save("douban", "7", &favorite("Seven")).await.unwrap();
        assert!(h.client.favorites().is_favorited("douban", "7").await);
        assert!(h.api.favorites().contains_key("douban+7"));

        h.client.favorites().delete("douban", "7").await.unwrap();
        assert!(!h.client.favorites().is_favorited("douban", "7").await);
        assert!(h.api.favorites().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_clear_restores_server_copy() {
        let h = harness(StorageMode::Remote);
        h.api.seed_favorite("douban+1", favorite("F"));
        h.client.favorites().get_all().await;
        h.api.fail_writes(true);

        assert!(h.client.favorites().clear_all().await.is_err());

        assert_eq!(h.events.count(EventType::GlobalError).await, 1);
        let history = h.events.history(Some(EventType::FavoritesUpdated)).await;
        assert_eq!(history.len(), 2);
        assert!(history[0].data.as_object().unwrap().is_empty());
        assert!(history[1].data.get("douban+1").is_some());
    }

    #[tokio::test]
    async fn test_rejected_write_with_unreachable_server_still_reports_once() {
        let h = harness(StorageMode::Remote);
        h.api.fail_writes(true);
        h.api.fail_reads(true);

        assert!(h.client.favorites().save("douban", "1", &favorite("F")).await.is_err());
        assert_eq!(h.events.count(EventType::GlobalError).await, 1);
    }

    #[tokio::test]
    async fn test_local_mode_clear() {
        let h = harness(StorageMode::LocalStorage);
        h.client.favorites().save("douban", "1", &favorite("F")).await.unwrap();
        h.client.favorites().clear_all().await.unwrap();

        assert!(h.client.favorites().get_all().await.is_empty());
        assert_eq!(h.events.count(EventType::FavoritesUpdated).await, 2);
        assert_eq!(h.api.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_local_corrupt_blob_reads_empty_and_reports() {
        let h = harness(StorageMode::LocalStorage);
        h.area.set_item("moontv_favorites", "{not json").unwrap();

        assert!(h.client.favorites().get_all().await.is_empty());
        assert_eq!(h.events.count(EventType::GlobalError).await, 1);

        // a write replaces the corrupt blob
        h.client.favorites().save("douban", "1", &favorite("F")).await.unwrap();
        assert_eq!(h.client.favorites().get_all().await.len(), 1);
        assert_eq!(h.events.count(EventType::GlobalError).await, 1);
    }
}
