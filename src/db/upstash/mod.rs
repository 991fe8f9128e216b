//! Remote key-value backend (Upstash Redis)
//!
//! Key layout:
//! - `u:{user}:pr:{source+id}` play record (JSON)
//! - `u:{user}:fav:{source+id}` favorite (JSON)
//! - `u:{user}:skip:{source+id}` skip config (JSON)
//! - `u:{user}:ix:{pr|fav|skip}` set of record keys the user owns
//! - `u:{user}:sh` search history list, newest first
//! - `u:{user}:pwd` password hash
//! - `u:index` set of all usernames
//! - `admin:config` admin configuration (JSON)
//!
//! Every round trip goes through [`with_retry`].

pub mod client;
#[cfg(test)]
mod fake;

pub use client::{cmd, KvClient, UpstashClient};

use crate::core::error::Result;
use crate::core::keys::generate_key;
use crate::core::retry::{with_retry, RetryPolicy};
use crate::db::models::{
    AdminConfig, Favorite, FavoriteMap, PlayRecord, PlayRecordMap, SkipConfig, SkipConfigMap,
    SEARCH_HISTORY_LIMIT,
};
use crate::db::storage::Storage;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

const USER_INDEX_KEY: &str = "u:index";
const ADMIN_CONFIG_KEY: &str = "admin:config";

/// Largest number of keys removed by a single DEL
const DELETE_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone, Copy)]
enum RecordKind {
    PlayRecord,
    Favorite,
    SkipConfig,
}

impl RecordKind {
    fn tag(&self) -> &'static str {
        match self {
            RecordKind::PlayRecord => "pr",
            RecordKind::Favorite => "fav",
            RecordKind::SkipConfig => "skip",
        }
    }
}

fn record_prefix(user: &str, kind: RecordKind) -> String {
    format!("u:{}:{}:", user, kind.tag())
}

/// Escape Redis glob metacharacters so a username only matches itself
fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn record_key(user: &str, kind: RecordKind, key: &str) -> String {
    format!("u:{}:{}:{}", user, kind.tag(), key)
}

fn index_key(user: &str, kind: RecordKind) -> String {
    format!("u:{}:ix:{}", user, kind.tag())
}

fn search_history_key(user: &str) -> String {
    format!("u:{}:sh", user)
}

fn password_key(user: &str) -> String {
    format!("u:{}:pwd", user)
}

fn reply_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn reply_array(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

fn reply_strings(value: Value) -> Vec<String> {
    reply_array(value).into_iter().filter_map(reply_string).collect()
}

fn reply_integer(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

pub struct UpstashStorage {
    client: Arc<dyn KvClient>,
    retry: RetryPolicy,
}

impl UpstashStorage {
    /// Connect to an Upstash database over its REST endpoint
    pub fn connect(url: &str, token: &str) -> Result<Self> {
        let client = UpstashClient::new(url, token)?;
        tracing::info!(url = %url, "Using Upstash storage");
        Ok(Self::with_client(Arc::new(client)))
    }

    pub fn with_client(client: Arc<dyn KvClient>) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn exec(&self, command: Vec<String>) -> Result<Value> {
        with_retry(self.retry, || {
            let client = self.client.clone();
            let command = command.clone();
            async move { client.command(command).await }
        })
        .await
    }

    async fn exec_pipeline(&self, commands: Vec<Vec<String>>) -> Result<Vec<Value>> {
        with_retry(self.retry, || {
            let client = self.client.clone();
            let commands = commands.clone();
            async move { client.pipeline(commands).await }
        })
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match reply_string(self.exec(cmd(["GET", key])).await?) {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn delete_in_chunks(&self, keys: &[String]) -> Result<()> {
        for chunk in keys.chunks(DELETE_CHUNK_SIZE) {
            let mut command = cmd(["DEL"]);
            command.extend(chunk.iter().cloned());
            self.exec(command).await?;
        }
        Ok(())
    }

    /// Record keys the user owns for `kind`. An empty index falls back to a
    /// key scan whose result is written back into the index.
    async fn index_members(&self, user: &str, kind: RecordKind) -> Result<Vec<String>> {
        let index = index_key(user, kind);
        let members = reply_strings(self.exec(cmd(["SMEMBERS", index.as_str()])).await?);
        if !members.is_empty() {
            return Ok(members);
        }

        let prefix = record_prefix(user, kind);
        let pattern = format!("{}*", escape_glob(&prefix));
        let discovered: Vec<String> = reply_strings(self.exec(cmd(["KEYS", pattern.as_str()])).await?)
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect();

        if !discovered.is_empty() {
            let mut command = cmd(["SADD", index.as_str()]);
            command.extend(discovered.iter().cloned());
            self.exec(command).await?;
            tracing::info!(
                username = %user,
                kind = kind.tag(),
                count = discovered.len(),
                "Backfilled record index from key scan"
            );
        }

        Ok(discovered)
    }

    async fn get_record<T: DeserializeOwned>(
        &self,
        user: &str,
        kind: RecordKind,
        key: &str,
    ) -> Result<Option<T>> {
        self.get_json(&record_key(user, kind, key)).await
    }

    async fn put_record<T: Serialize>(
        &self,
        user: &str,
        kind: RecordKind,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let data = serde_json::to_string(value)?;
        let full_key = record_key(user, kind, key);
        let index = index_key(user, kind);
        self.exec_pipeline(vec![
            cmd(["SET", full_key.as_str(), data.as_str()]),
            cmd(["SADD", index.as_str(), key]),
        ])
        .await?;
        Ok(())
    }

    /// Index lookup followed by a single MGET
    async fn all_records<T: DeserializeOwned>(
        &self,
        user: &str,
        kind: RecordKind,
    ) -> Result<HashMap<String, T>> {
        let keys = self.index_members(user, kind).await?;
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut command = cmd(["MGET"]);
        command.extend(keys.iter().map(|k| record_key(user, kind, k)));
        let values = reply_array(self.exec(command).await?);

        let mut records = HashMap::with_capacity(keys.len());
        let mut stale = Vec::new();
        for (key, value) in keys.into_iter().zip(values) {
            match reply_string(value) {
                Some(raw) => {
                    records.insert(key, serde_json::from_str(&raw)?);
                }
                None => stale.push(key),
            }
        }

        if !stale.is_empty() {
            let index = index_key(user, kind);
            let mut command = cmd(["SREM", index.as_str()]);
            command.extend(stale);
            self.exec(command).await?;
        }

        Ok(records)
    }

    async fn delete_record(&self, user: &str, kind: RecordKind, key: &str) -> Result<()> {
        let full_key = record_key(user, kind, key);
        let index = index_key(user, kind);
        self.exec_pipeline(vec![
            cmd(["DEL", full_key.as_str()]),
            cmd(["SREM", index.as_str(), key]),
        ])
        .await?;
        Ok(())
    }

    async fn clear_records(&self, user: &str, kind: RecordKind) -> Result<()> {
        let mut keys: Vec<String> = self
            .index_members(user, kind)
            .await?
            .iter()
            .map(|k| record_key(user, kind, k))
            .collect();
        keys.push(index_key(user, kind));
        self.delete_in_chunks(&keys).await
    }
}

#[async_trait]
impl Storage for UpstashStorage {
    fn name(&self) -> &'static str {
        "upstash"
    }

    async fn get_play_record(&self, user: &str, key: &str) -> Result<Option<PlayRecord>> {
        self.get_record(user, RecordKind::PlayRecord, key).await
    }

    async fn set_play_record(&self, user: &str, key: &str, record: &PlayRecord) -> Result<()> {
        self.put_record(user, RecordKind::PlayRecord, key, record).await
    }

    async fn get_all_play_records(&self, user: &str) -> Result<PlayRecordMap> {
        self.all_records(user, RecordKind::PlayRecord).await
    }

    async fn delete_play_record(&self, user: &str, key: &str) -> Result<()> {
        self.delete_record(user, RecordKind::PlayRecord, key).await
    }

    async fn clear_play_records(&self, user: &str) -> Result<()> {
        self.clear_records(user, RecordKind::PlayRecord).await
    }

    async fn get_favorite(&self, user: &str, key: &str) -> Result<Option<Favorite>> {
        self.get_record(user, RecordKind::Favorite, key).await
    }

    async fn set_favorite(&self, user: &str, key: &str, favorite: &Favorite) -> Result<()> {
        self.put_record(user, RecordKind::Favorite, key, favorite).await
    }

    async fn get_all_favorites(&self, user: &str) -> Result<FavoriteMap> {
        self.all_records(user, RecordKind::Favorite).await
    }

    async fn delete_favorite(&self, user: &str, key: &str) -> Result<()> {
        self.delete_record(user, RecordKind::Favorite, key).await
    }

    async fn clear_favorites(&self, user: &str) -> Result<()> {
        self.clear_records(user, RecordKind::Favorite).await
    }

    async fn get_skip_config(&self, user: &str, source: &str, id: &str) -> Result<Option<SkipConfig>> {
        let key = generate_key(source, id)?;
        self.get_record(user, RecordKind::SkipConfig, &key).await
    }

    async fn set_skip_config(&self, user: &str, source: &str, id: &str, config: &SkipConfig) -> Result<()> {
        let key = generate_key(source, id)?;
        self.put_record(user, RecordKind::SkipConfig, &key, config).await
    }

    async fn delete_skip_config(&self, user: &str, source: &str, id: &str) -> Result<()> {
        let key = generate_key(source, id)?;
        self.delete_record(user, RecordKind::SkipConfig, &key).await
    }

    async fn get_all_skip_configs(&self, user: &str) -> Result<SkipConfigMap> {
        self.all_records(user, RecordKind::SkipConfig).await
    }

    async fn get_user_password_hash(&self, user: &str) -> Result<Option<String>> {
        let key = password_key(user);
        Ok(reply_string(self.exec(cmd(["GET", key.as_str()])).await?))
    }

    async fn set_user_password_hash(&self, user: &str, hash: &str) -> Result<()> {
        let key = password_key(user);
        self.exec_pipeline(vec![
            cmd(["SET", key.as_str(), hash]),
            cmd(["SADD", USER_INDEX_KEY, user]),
        ])
        .await?;
        Ok(())
    }

    async fn check_user_exist(&self, user: &str) -> Result<bool> {
        let key = password_key(user);
        let exists = self.exec(cmd(["EXISTS", key.as_str()])).await?;
        Ok(reply_integer(&exists) > 0)
    }

    async fn delete_user(&self, user: &str) -> Result<()> {
        let pattern = format!("u:{}:*", escape_glob(user));
        let keys = reply_strings(self.exec(cmd(["KEYS", pattern.as_str()])).await?);
        self.delete_in_chunks(&keys).await?;
        self.exec(cmd(["SREM", USER_INDEX_KEY, user])).await?;

        tracing::info!(username = %user, keys = keys.len(), "Deleted user and all records");
        Ok(())
    }

    async fn get_all_users(&self) -> Result<Vec<String>> {
        let mut users = reply_strings(self.exec(cmd(["SMEMBERS", USER_INDEX_KEY])).await?);

        if users.is_empty() {
            users = reply_strings(self.exec(cmd(["KEYS", "u:*:pwd"])).await?)
                .into_iter()
                .filter_map(|k| {
                    k.strip_prefix("u:")
                        .and_then(|rest| rest.strip_suffix(":pwd"))
                        .map(str::to_string)
                })
                .collect();

            if !users.is_empty() {
                let mut command = cmd(["SADD", USER_INDEX_KEY]);
                command.extend(users.iter().cloned());
                self.exec(command).await?;
                tracing::info!(count = users.len(), "Backfilled user index from key scan");
            }
        }

        users.sort();
        Ok(users)
    }

    async fn get_search_history(&self, user: &str) -> Result<Vec<String>> {
        let key = search_history_key(user);
        Ok(reply_strings(self.exec(cmd(["LRANGE", key.as_str(), "0", "-1"])).await?))
    }

    async fn add_search_history(&self, user: &str, keyword: &str) -> Result<()> {
        let key = search_history_key(user);
        let last = (SEARCH_HISTORY_LIMIT - 1).to_string();
        self.exec_pipeline(vec![
            cmd(["LREM", key.as_str(), "0", keyword]),
            cmd(["LPUSH", key.as_str(), keyword]),
            cmd(["LTRIM", key.as_str(), "0", last.as_str()]),
        ])
        .await?;
        Ok(())
    }

    async fn delete_search_history(&self, user: &str, keyword: Option<&str>) -> Result<()> {
        let key = search_history_key(user);
        match keyword {
            Some(keyword) => self.exec(cmd(["LREM", key.as_str(), "0", keyword])).await?,
            None => self.exec(cmd(["DEL", key.as_str()])).await?,
        };
        Ok(())
    }

    async fn get_admin_config(&self) -> Result<Option<AdminConfig>> {
        self.get_json(ADMIN_CONFIG_KEY).await
    }

    async fn set_admin_config(&self, config: &AdminConfig) -> Result<()> {
        let data = serde_json::to_string(config)?;
        self.exec(cmd(["SET", ADMIN_CONFIG_KEY, data.as_str()])).await?;
        Ok(())
    }

    async fn clear_all_data(&self) -> Result<()> {
        let users = self.get_all_users().await?;
        for user in &users {
            self.delete_user(user).await?;
        }
        self.exec(cmd(["DEL", ADMIN_CONFIG_KEY, USER_INDEX_KEY])).await?;

        tracing::info!(users = users.len(), "Cleared all Upstash data");
        Ok(())
    }
}

impl std::fmt::Debug for UpstashStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstashStorage").field("retry", &self.retry).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{Call, FakeKv};
    use super::*;
    use crate::db::conformance;
    use std::time::Duration;

    fn storage() -> (Arc<FakeKv>, UpstashStorage) {
        let kv = Arc::new(FakeKv::new());
        let storage = UpstashStorage::with_client(kv.clone()).with_retry_policy(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        });
        (kv, storage)
    }

    #[tokio::test]
    async fn test_upstash_conformance() {
        let (_kv, storage) = storage();
        conformance::run_all(&storage).await;
    }

    #[tokio::test]
    async fn test_key_layout() {
        let (kv, storage) = storage();
        let record = conformance::play_record("Mushishi");

        storage.set_play_record("alice", "bilibili+1", &record).await.unwrap();
        storage.set_favorite("alice", "douban+2", &conformance::favorite("F")).await.unwrap();
        storage
            .set_skip_config("alice", "bilibili", "1", &SkipConfig { enable: true, intro_time: 5, outro_time: 0 })
            .await
            .unwrap();
        storage.register_user("alice", "pw").await.unwrap();
        storage.add_search_history("alice", "mushishi").await.unwrap();

        let stored: PlayRecord =
            serde_json::from_str(&kv.get_raw("u:alice:pr:bilibili+1").unwrap()).unwrap();
        assert_eq!(stored, record);
        assert!(kv.contains_key("u:alice:fav:douban+2"));
        assert!(kv.contains_key("u:alice:skip:bilibili+1"));
        assert!(kv.contains_key("u:alice:pwd"));
        assert!(kv.contains_key("u:alice:sh"));
        assert_eq!(kv.set_members("u:alice:ix:pr"), vec!["bilibili+1"]);
        assert_eq!(kv.set_members("u:alice:ix:skip"), vec!["bilibili+1"]);
        assert_eq!(kv.set_members("u:index"), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_search_history_add_is_one_pipeline() {
        let (kv, storage) = storage();
        storage.add_search_history("alice", "foo").await.unwrap();

        assert_eq!(
            kv.calls(),
            vec![Call::Pipeline(vec![
                cmd(["LREM", "u:alice:sh", "0", "foo"]),
                cmd(["LPUSH", "u:alice:sh", "foo"]),
                cmd(["LTRIM", "u:alice:sh", "0", "19"]),
            ])]
        );
    }

    #[tokio::test]
    async fn test_list_all_uses_index_and_single_mget() {
        let (kv, storage) = storage();
        for i in 0..5 {
            storage
                .set_play_record("alice", &format!("s+{}", i), &conformance::play_record("x"))
                .await
                .unwrap();
        }
        kv.clear_calls();

        let all = storage.get_all_play_records("alice").await.unwrap();

        assert_eq!(all.len(), 5);
        assert_eq!(kv.commands_named("MGET").len(), 1);
        assert!(kv.commands_named("GET").is_empty());
        assert!(kv.commands_named("KEYS").is_empty());
    }

    #[tokio::test]
    async fn test_missing_index_is_backfilled_from_scan() {
        let (kv, storage) = storage();
        let raw = serde_json::to_string(&conformance::favorite("Old")).unwrap();
        kv.set_raw("u:bob:fav:douban+7", &raw);
        kv.set_raw("u:bob:fav:douban+8", &raw);

        let all = storage.get_all_favorites("bob").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(kv.set_members("u:bob:ix:fav"), vec!["douban+7", "douban+8"]);

        kv.clear_calls();
        storage.get_all_favorites("bob").await.unwrap();
        assert!(kv.commands_named("KEYS").is_empty());
    }

    #[tokio::test]
    async fn test_stale_index_entries_are_pruned() {
        let (kv, storage) = storage();
        storage.set_favorite("bob", "a+1", &conformance::favorite("A")).await.unwrap();
        storage.set_favorite("bob", "a+2", &conformance::favorite("B")).await.unwrap();
        // record removed without touching the index
        kv.remove_raw("u:bob:fav:a+2");

        let all = storage.get_all_favorites("bob").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(kv.set_members("u:bob:ix:fav"), vec!["a+1"]);
    }

    #[tokio::test]
    async fn test_user_index_fallback() {
        let (kv, storage) = storage();
        kv.set_raw("u:alice:pwd", "$2b$10$x");
        kv.set_raw("u:bob:pwd", "$2b$10$y");

        assert_eq!(storage.get_all_users().await.unwrap(), vec!["alice", "bob"]);
        assert_eq!(kv.set_members("u:index"), vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_delete_user_in_chunks() {
        let (kv, storage) = storage();
        storage.set_user_password_hash("bulk", "$2b$10$z").await.unwrap();
        for i in 0..1199 {
            kv.set_raw(&format!("u:bulk:pr:s+{}", i), "{}");
        }
        kv.clear_calls();

        storage.delete_user("bulk").await.unwrap();

        let deletes = kv.commands_named("DEL");
        let sizes: Vec<usize> = deletes.iter().map(|c| c.len() - 1).collect();
        assert_eq!(sizes, vec![500, 500, 200]);
        assert_eq!(kv.commands_named("SREM"), vec![cmd(["SREM", "u:index", "bulk"])]);
        assert!(!kv.contains_key("u:bulk:pwd"));
    }

    #[tokio::test]
    async fn test_delete_user_with_glob_characters_spares_others() {
        let (kv, storage) = storage();
        storage.set_user_password_hash("alice", "$2b$10$a").await.unwrap();
        storage
            .set_play_record("alice", "s+1", &conformance::play_record("Kept"))
            .await
            .unwrap();
        storage.add_search_history("alice", "kept").await.unwrap();
        storage.set_user_password_hash("a*", "$2b$10$b").await.unwrap();
        storage
            .set_play_record("a*", "s+1", &conformance::play_record("Gone"))
            .await
            .unwrap();

        storage.delete_user("a*").await.unwrap();

        assert!(!storage.check_user_exist("a*").await.unwrap());
        assert!(storage.check_user_exist("alice").await.unwrap());
        assert_eq!(storage.get_all_play_records("alice").await.unwrap().len(), 1);
        assert_eq!(storage.get_search_history("alice").await.unwrap(), vec!["kept"]);
        assert_eq!(kv.commands_named("KEYS"), vec![cmd(["KEYS", "u:a\\*:*"])]);
    }

    #[tokio::test]
    async fn test_index_fallback_scan_escapes_username() {
        let (kv, storage) = storage();
        kv.set_raw("u:bob:pr:s+1", r#"{"title":"B","source_name":"s"}"#);
        kv.set_raw("u:b?b:pr:s+2", r#"{"title":"Q","source_name":"s"}"#);

        let records = storage.get_all_play_records("b?b").await.unwrap();

        assert_eq!(records.len(), 1);
        assert!(records.contains_key("s+2"));
    }

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("alice"), "alice");
        assert_eq!(escape_glob("a*[x]?\\"), "a\\*\\[x\\]\\?\\\\");
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let (kv, storage) = storage();
        storage.add_search_history("alice", "foo").await.unwrap();
        kv.clear_calls();
        kv.fail_transient(2);

        let history = storage.get_search_history("alice").await.unwrap();

        assert_eq!(history, vec!["foo"]);
        assert_eq!(kv.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let (kv, storage) = storage();
        kv.fail_transient(5);

        let result = storage.get_search_history("alice").await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(kv.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let (kv, storage) = storage();
        kv.fail_permanent(1);

        assert!(storage.get_admin_config().await.is_err());
        assert_eq!(kv.calls().len(), 1);
    }
}
