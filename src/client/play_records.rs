use super::{Target, UserDataClient};
use crate::cache::CacheKind;
use crate::core::error::Result;
use crate::core::keys::generate_key;
use crate::db::local::LOCAL_USER;
use crate::db::models::{PlayRecord, PlayRecordMap};
use crate::db::storage::Storage;

const KIND: CacheKind = CacheKind::PlayRecords;

/// Play records of the signed-in user, keyed by `source+id`
pub struct PlayRecords<'a> {
    client: &'a UserDataClient,
}

impl<'a> PlayRecords<'a> {
    pub(super) fn new(client: &'a UserDataClient) -> Self {
        Self { client }
    }

    pub async fn get_all(&self) -> PlayRecordMap {
        match self.client.target() {
            Target::Unavailable => PlayRecordMap::new(),
            Target::Local(local) => {
                let result = local.get_all_play_records(LOCAL_USER).await;
                self.client.local_read(KIND, result).await
            }
            Target::Remote { cache, user } => self.client.read_through(cache, user, KIND).await,
        }
    }

    pub async fn save(&self, source: &str, id: &str, record: &PlayRecord) -> Result<()> {
        let key = generate_key(source, id)?;

        match self.client.target() {
            Target::Unavailable => Ok(()),
            Target::Local(local) => {
                let result = match local.set_play_record(LOCAL_USER, &key, record).await {
                    Ok(()) => local.get_all_play_records(LOCAL_USER).await,
                    Err(e) => Err(e),
                };
                self.client.local_write(KIND, result).await
            }
            Target::Remote { cache, user } => {
                let mut records: PlayRecordMap = cache.cached(user, KIND).unwrap_or_default();
                records.insert(key.clone(), record.clone());
                cache.store(user, KIND, &records);
                self.client.announce(KIND, &records).await;

                let result = self.client.api().save_play_record(&key, record).await;
                self.client.settle(KIND, result).await
            }
        }
    }

    pub async fn delete(&self, source: &str, id: &str) -> Result<()> {
        let key = generate_key(source, id)?;

        match self.client.target() {
            Target::Unavailable => Ok(()),
            Target::Local(local) => {
                let result = match local.delete_play_record(LOCAL_USER, &key).await {
                    Ok(()) => local.get_all_play_records(LOCAL_USER).await,
                    Err(e) => Err(e),
                };
                self.client.local_write(KIND, result).await
            }
            Target::Remote { cache, user } => {
                let mut records: PlayRecordMap = cache.cached(user, KIND).unwrap_or_default();
                records.remove(&key);
                cache.store(user, KIND, &records);
                self.client.announce(KIND, &records).await;

                let result = self.client.api().delete_play_record(&key).await;
                self.client.settle(KIND, result).await
            }
        }
    }

    pub async fn clear_all(&self) -> Result<()> {
        match self.client.target() {
            Target::Unavailable => Ok(()),
            Target::Local(local) => {
                let result = local.clear_play_records(LOCAL_USER).await.map(|()| PlayRecordMap::new());
                self.client.local_write(KIND, result).await
            }
            Target::Remote { cache, user } => {
                let empty = PlayRecordMap::new();
                cache.store(user, KIND, &empty);
                self.client.announce(KIND, &empty).await;

                let result = self.client.api().clear_play_records().await;
                self.client.settle(KIND, result).await
            }
        }
    }
}
