use super::{Target, UserDataClient};
use crate::cache::CacheKind;
use crate::core::error::Result;
use crate::db::local::LOCAL_USER;
use crate::db::models::push_search_keyword;
use crate::db::storage::Storage;

const KIND: CacheKind = CacheKind::SearchHistory;

/// Recent search keywords, newest first
pub struct SearchHistory<'a> {
    client: &'a UserDataClient,
}

impl<'a> SearchHistory<'a> {
    pub(super) fn new(client: &'a UserDataClient) -> Self {
        Self { client }
    }

    pub async fn get(&self) -> Vec<String> {
        match self.client.target() {
            Target::Unavailable => Vec::new(),
            Target::Local(local) => {
                let result = local.get_search_history(LOCAL_USER).await;
                self.client.local_read(KIND, result).await
            }
            Target::Remote { cache, user } => self.client.read_through(cache, user, KIND).await,
        }
    }

    /// Record a search. Blank keywords are ignored.
    pub async fn add(&self, keyword: &str) -> Result<()> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Ok(());
        }

        match self.client.target() {
            Target::Unavailable => Ok(()),
            Target::Local(local) => {
                let result = match local.add_search_history(LOCAL_USER, keyword).await {
                    Ok(()) => local.get_search_history(LOCAL_USER).await,
                    Err(e) => Err(e),
                };
                self.client.local_write(KIND, result).await
            }
            Target::Remote { cache, user } => {
                let mut history: Vec<String> = cache.cached(user, KIND).unwrap_or_default();
                push_search_keyword(&mut history, keyword);
                cache.store(user, KIND, &history);
                self.client.announce(KIND, &history).await;

                let result = self.client.api().add_search_history(keyword).await;
                self.client.settle(KIND, result).await
            }
        }
    }

    pub async fn delete(&self, keyword: &str) -> Result<()> {
        self.remove(Some(keyword.trim())).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.remove(None).await
    }

    async fn remove(&self, keyword: Option<&str>) -> Result<()> {
        match self.client.target() {
            Target::Unavailable => Ok(()),
            Target::Local(local) => {
                let result = match local.delete_search_history(LOCAL_USER, keyword).await {
                    Ok(()) => local.get_search_history(LOCAL_USER).await,
                    Err(e) => Err(e),
                };
                self.client.local_write(KIND, result).await
            }
            Target::Remote { cache, user } => {
                let mut history: Vec<String> = match keyword {
                    Some(_) => cache.cached(user, KIND).unwrap_or_default(),
                    None => Vec::new(),
                };
                if let Some(keyword) = keyword {
                    history.retain(|k| k != keyword);
                }
                cache.store(user, KIND, &history);
                self.client.announce(KIND, &history).await;

                let result = self.client.api().delete_search_history(keyword).await;
                self.client.settle(KIND, result).await
            }
        }
    }
}
