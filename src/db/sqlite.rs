//! Embedded backend on SQLite
//!
//! One table per record kind keyed by `(username, key)` with JSON payloads.
//! Search history keeps a per-user sequence number; the newest entry has the
//! highest one.

use crate::core::error::Result;
use crate::core::keys::generate_key;
use crate::db::manager::DatabaseManager;
use crate::db::models::{
    AdminConfig, Favorite, FavoriteMap, PlayRecord, PlayRecordMap, SkipConfig, SkipConfigMap,
    SEARCH_HISTORY_LIMIT,
};
use crate::db::storage::Storage;
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
enum RecordTable {
    PlayRecords,
    Favorites,
    SkipConfigs,
}

impl RecordTable {
    fn name(&self) -> &'static str {
        match self {
            RecordTable::PlayRecords => "play_records",
            RecordTable::Favorites => "favorites",
            RecordTable::SkipConfigs => "skip_configs",
        }
    }
}

const RECORD_TABLES: [RecordTable; 3] = [
    RecordTable::PlayRecords,
    RecordTable::Favorites,
    RecordTable::SkipConfigs,
];

pub struct SqliteStorage {
    db: DatabaseManager,
}

impl SqliteStorage {
    pub fn open(path: &Path, pool_size: u32, busy_timeout: Duration) -> Result<Self> {
        let db = DatabaseManager::new(path, pool_size, busy_timeout)?;
        tracing::info!(path = %path.display(), "Opened SQLite storage");
        Ok(Self { db })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            db: DatabaseManager::new_in_memory()?,
        })
    }

    async fn get_record<T>(&self, table: RecordTable, user: &str, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (user, key) = (user.to_string(), key.to_string());
        self.db
            .execute(move |conn| {
                let sql = format!(
                    "SELECT data FROM {} WHERE username = ?1 AND key = ?2",
                    table.name()
                );
                let data: Option<String> = conn
                    .query_row(&sql, params![user, key], |row| row.get(0))
                    .optional()?;
                data.map(|d| serde_json::from_str(&d).map_err(Into::into))
                    .transpose()
            })
            .await
    }

    async fn put_record<T: Serialize>(
        &self,
        table: RecordTable,
        user: &str,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let data = serde_json::to_string(value)?;
        let (user, key) = (user.to_string(), key.to_string());
        self.db
            .execute(move |conn| {
                let sql = format!(
                    "INSERT INTO {} (username, key, data) VALUES (?1, ?2, ?3) \
                     ON CONFLICT(username, key) DO UPDATE SET data = excluded.data, \
                     updated_at = CURRENT_TIMESTAMP",
                    table.name()
                );
                conn.execute(&sql, params![user, key, data])?;
                Ok(())
            })
            .await
    }

    async fn all_records<T>(&self, table: RecordTable, user: &str) -> Result<HashMap<String, T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let user = user.to_string();
        self.db
            .execute(move |conn| {
                let sql = format!("SELECT key, data FROM {} WHERE username = ?1", table.name());
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([&user], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                let mut records = HashMap::with_capacity(rows.len());
                for (key, data) in rows {
                    records.insert(key, serde_json::from_str(&data)?);
                }
                Ok(records)
            })
            .await
    }

    async fn delete_record(&self, table: RecordTable, user: &str, key: &str) -> Result<()> {
        let (user, key) = (user.to_string(), key.to_string());
        self.db
            .execute(move |conn| {
                let sql = format!("DELETE FROM {} WHERE username = ?1 AND key = ?2", table.name());
                conn.execute(&sql, params![user, key])?;
                Ok(())
            })
            .await
    }

    async fn clear_records(&self, table: RecordTable, user: &str) -> Result<()> {
        let user = user.to_string();
        self.db
            .execute(move |conn| {
                let sql = format!("DELETE FROM {} WHERE username = ?1", table.name());
                conn.execute(&sql, [&user])?;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn get_play_record(&self, user: &str, key: &str) -> Result<Option<PlayRecord>> {
        self.get_record(RecordTable::PlayRecords, user, key).await
    }

    async fn set_play_record(&self, user: &str, key: &str, record: &PlayRecord) -> Result<()> {
        self.put_record(RecordTable::PlayRecords, user, key, record).await
    }

    async fn get_all_play_records(&self, user: &str) -> Result<PlayRecordMap> {
        self.all_records(RecordTable::PlayRecords, user).await
    }

    async fn delete_play_record(&self, user: &str, key: &str) -> Result<()> {
        self.delete_record(RecordTable::PlayRecords, user, key).await
    }

    async fn clear_play_records(&self, user: &str) -> Result<()> {
        self.clear_records(RecordTable::PlayRecords, user).await
    }

    async fn get_favorite(&self, user: &str, key: &str) -> Result<Option<Favorite>> {
        self.get_record(RecordTable::Favorites, user, key).await
    }

    async fn set_favorite(&self, user: &str, key: &str, favorite: &Favorite) -> Result<()> {
        self.put_record(RecordTable::Favorites, user, key, favorite).await
    }

    async fn get_all_favorites(&self, user: &str) -> Result<FavoriteMap> {
        self.all_records(RecordTable::Favorites, user).await
    }

    async fn delete_favorite(&self, user: &str, key: &str) -> Result<()> {
        self.delete_record(RecordTable::Favorites, user, key).await
    }

    async fn clear_favorites(&self, user: &str) -> Result<()> {
        self.clear_records(RecordTable::Favorites, user).await
    }

    async fn get_skip_config(&self, user: &str, source: &str, id: &str) -> Result<Option<SkipConfig>> {
        let key = generate_key(source, id)?;
        self.get_record(RecordTable::SkipConfigs, user, &key).await
    }

    async fn set_skip_config(&self, user: &str, source: &str, id: &str, config: &SkipConfig) -> Result<()> {
        let key = generate_key(source, id)?;
        self.put_record(RecordTable::SkipConfigs, user, &key, config).await
    }

    async fn delete_skip_config(&self, user: &str, source: &str, id: &str) -> Result<()> {
        let key = generate_key(source, id)?;
        self.delete_record(RecordTable::SkipConfigs, user, &key).await
    }

    async fn get_all_skip_configs(&self, user: &str) -> Result<SkipConfigMap> {
        self.all_records(RecordTable::SkipConfigs, user).await
    }

    async fn get_user_password_hash(&self, user: &str) -> Result<Option<String>> {
        let user = user.to_string();
        self.db
            .execute(move |conn| {
                Ok(conn
                    .query_row("SELECT password FROM users WHERE username = ?1", [&user], |row| {
                        row.get(0)
                    })
                    .optional()?)
            })
            .await
    }

    async fn set_user_password_hash(&self, user: &str, hash: &str) -> Result<()> {
        let (user, hash) = (user.to_string(), hash.to_string());
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO users (username, password) VALUES (?1, ?2) \
                     ON CONFLICT(username) DO UPDATE SET password = excluded.password",
                    params![user, hash],
                )?;
                Ok(())
            })
            .await
    }

    async fn check_user_exist(&self, user: &str) -> Result<bool> {
        let user = user.to_string();
        self.db
            .execute(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM users WHERE username = ?1",
                    [&user],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await
    }

    async fn delete_user(&self, user: &str) -> Result<()> {
        let username = user.to_string();
        self.db
            .transaction(move |tx| {
                for table in RECORD_TABLES {
                    tx.execute(
                        &format!("DELETE FROM {} WHERE username = ?1", table.name()),
                        [&username],
                    )?;
                }
                tx.execute("DELETE FROM search_history WHERE username = ?1", [&username])?;
                tx.execute("DELETE FROM users WHERE username = ?1", [&username])?;
                Ok(())
            })
            .await?;
        tracing::info!(username = %user, "Deleted user and all records");
        Ok(())
    }

    async fn get_all_users(&self) -> Result<Vec<String>> {
        self.db
            .execute(|conn| {
                let mut stmt = conn.prepare("SELECT username FROM users ORDER BY username")?;
                let users = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(users)
            })
            .await
    }

    async fn get_search_history(&self, user: &str) -> Result<Vec<String>> {
        let user = user.to_string();
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT keyword FROM search_history WHERE username = ?1 ORDER BY seq DESC",
                )?;
                let keywords = stmt
                    .query_map([&user], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(keywords)
            })
            .await
    }

    async fn add_search_history(&self, user: &str, keyword: &str) -> Result<()> {
        let (user, keyword) = (user.to_string(), keyword.to_string());
        self.db
            .transaction(move |tx| {
                tx.execute(
                    "DELETE FROM search_history WHERE username = ?1 AND keyword = ?2",
                    params![user, keyword],
                )?;
                tx.execute(
                    "INSERT INTO search_history (username, keyword, seq) VALUES (?1, ?2, \
                     (SELECT COALESCE(MAX(seq), 0) + 1 FROM search_history WHERE username = ?1))",
                    params![user, keyword],
                )?;
                tx.execute(
                    "DELETE FROM search_history WHERE username = ?1 AND keyword NOT IN \
                     (SELECT keyword FROM search_history WHERE username = ?1 \
                      ORDER BY seq DESC LIMIT ?2)",
                    params![user, SEARCH_HISTORY_LIMIT as i64],
                )?;
                Ok(())
            })
            .await
    }

    async fn delete_search_history(&self, user: &str, keyword: Option<&str>) -> Result<()> {
        let user = user.to_string();
        let keyword = keyword.map(str::to_string);
        self.db
            .execute(move |conn| {
                match keyword {
                    Some(keyword) => conn.execute(
                        "DELETE FROM search_history WHERE username = ?1 AND keyword = ?2",
                        params![user, keyword],
                    )?,
                    None => conn.execute("DELETE FROM search_history WHERE username = ?1", [&user])?,
                };
                Ok(())
            })
            .await
    }

    async fn get_admin_config(&self) -> Result<Option<AdminConfig>> {
        self.db
            .execute(|conn| {
                let data: Option<String> = conn
                    .query_row("SELECT data FROM admin_config WHERE id = 1", [], |row| row.get(0))
                    .optional()?;
                data.map(|d| serde_json::from_str(&d).map_err(Into::into))
                    .transpose()
            })
            .await
    }

    async fn set_admin_config(&self, config: &AdminConfig) -> Result<()> {
        let data = serde_json::to_string(config)?;
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO admin_config (id, data) VALUES (1, ?1) \
                     ON CONFLICT(id) DO UPDATE SET data = excluded.data, \
                     updated_at = CURRENT_TIMESTAMP",
                    [&data],
                )?;
                Ok(())
            })
            .await
    }

    async fn clear_all_data(&self) -> Result<()> {
        self.db
            .transaction(|tx| {
                for table in RECORD_TABLES {
                    tx.execute(&format!("DELETE FROM {}", table.name()), [])?;
                }
                tx.execute("DELETE FROM search_history", [])?;
                tx.execute("DELETE FROM users", [])?;
                tx.execute("DELETE FROM admin_config", [])?;
                Ok(())
            })
            .await?;
        tracing::info!("Cleared all SQLite data");
        Ok(())
    }
}
