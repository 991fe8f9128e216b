use super::{Target, UserDataClient};
use crate::cache::CacheKind;
use crate::core::error::Result;
use crate::core::keys::generate_key;
use crate::db::local::LOCAL_USER;
use crate::db::models::{SkipConfig, SkipConfigMap};
use crate::db::storage::Storage;

const KIND: CacheKind = CacheKind::SkipConfigs;

/// Intro/outro skip settings per catalog item
pub struct SkipConfigs<'a> {
    client: &'a UserDataClient,
}

impl<'a> SkipConfigs<'a> {
    pub(super) fn new(client: &'a UserDataClient) -> Self {
        Self { client }
    }

    pub async fn get_all(&self) -> SkipConfigMap {
        match self.client.target() {
            Target::Unavailable => SkipConfigMap::new(),
            Target::Local(local) => {
                let result = local.get_all_skip_configs(LOCAL_USER).await;
                self.client.local_read(KIND, result).await
            }
            Target::Remote { cache, user } => self.client.read_through(cache, user, KIND).await,
        }
    }

    pub async fn get(&self, source: &str, id: &str) -> Option<SkipConfig> {
        let key = generate_key(source, id).ok()?;
        self.get_all().await.remove(&key)
    }

    pub async fn save(&self, source: &str, id: &str, config: &SkipConfig) -> Result<()> {
        let key = generate_key(source, id)?;

        match self.client.target() {
            Target::Unavailable => Ok(()),
            Target::Local(local) => {
                let result = match local.set_skip_config(LOCAL_USER, source, id, config).await {
                    Ok(()) => local.get_all_skip_configs(LOCAL_USER).await,
                    Err(e) => Err(e),
                };
                self.client.local_write(KIND, result).await
            }
            Target::Remote { cache, user } => {
                let mut configs: SkipConfigMap = cache.cached(user, KIND).unwrap_or_default();
                configs.insert(key.clone(), config.clone());
                cache.store(user, KIND, &configs);
                self.client.announce(KIND, &configs).await;

                let result = self.client.api().save_skip_config(&key, config).await;
                self.client.settle(KIND, result).await
            }
        }
    }

    pub async fn delete(&self, source: &str, id: &str) -> Result<()> {
        let key = generate_key(source, id)?;

        match self.client.target() {
            Target::Unavailable => Ok(()),
            Target::Local(local) => {
                let result = match local.delete_skip_config(LOCAL_USER, source, id).await {
                    Ok(()) => local.get_all_skip_configs(LOCAL_USER).await,
                    Err(e) => Err(e),
                };
                self.client.local_write(KIND, result).await
            }
            Target::Remote { cache, user } => {
                let mut configs: SkipConfigMap = cache.cached(user, KIND).unwrap_or_default();
                configs.remove(&key);
                cache.store(user, KIND, &configs);
                self.client.announce(KIND, &configs).await;

                let result = self.client.api().delete_skip_config(&key).await;
                self.client.settle(KIND, result).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::StorageMode;
    use super::*;
    use crate::client::web_storage::WebStorage;
    use crate::core::event_bus::EventType;

    fn config(intro: i64) -> SkipConfig {
        SkipConfig {
            enable: true,
            intro_time: intro,
            outro_time: 30,
        }
    }

    #[tokio::test]
    async fn test_get_single_config() {
        let h = harness(StorageMode::Remote);
        h.api.seed_skip_config("bilibili+5", config(85));

        assert_eq!(h.client.skip_configs().get("bilibili", "5").await, Some(config(85)));
        assert_eq!(h.client.skip_configs().get("bilibili", "6").await, None);
    }

    #[tokio::test]
    async fn test_save_and_delete() {
        let h = harness(StorageMode::Remote);

        h.client.skip_configs().save("bilibili", "5", &config(10)).await.unwrap();
        assert_eq!(h.api.skip_configs().get("bilibili+5"), Some(&config(10)));

        h.client.skip_configs().delete("bilibili", "5").await.unwrap();
        assert!(h.api.skip_configs().is_empty());
        assert_eq!(h.events.count(EventType::SkipConfigsUpdated).await, 2);
    }

    #[tokio::test]
    async fn test_local_mode_round_trip() {
        let h = harness(StorageMode::LocalStorage);

        h.client.skip_configs().save("bilibili", "5", &config(10)).await.unwrap();

        assert_eq!(h.client.skip_configs().get("bilibili", "5").await, Some(config(10)));
        assert_eq!(h.client.skip_configs().get_all().await.len(), 1);
        assert!(h.area.get_item("moontv_skip_configs").is_some());
        assert_eq!(h.events.count(EventType::SkipConfigsUpdated).await, 1);
    }
}
