//! Database module
//!
//! This module provides user-data persistence including:
//! - The `Storage` contract and its backends (memory, SQLite, Upstash, browser-local)
//! - The storage provider selected at start-up
//! - SQLite connection pooling and migrations
//! - Data models and wire shapes

pub mod local;
pub mod manager;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod provider;
pub mod sqlite;
pub mod storage;
pub mod upstash;

#[cfg(test)]
pub(crate) mod conformance;

pub use local::LocalStorage;
pub use manager::DatabaseManager;
pub use memory::MemoryStorage;
pub use models::{AdminConfig, Favorite, PlayRecord, SkipConfig, UserRole};
pub use provider::{BackendKind, StorageBackend, StorageProvider};
pub use sqlite::SqliteStorage;
pub use storage::Storage;
pub use upstash::UpstashStorage;
