//! LunaTV user-data backend
//!
//! Per-user play records, favorites, search history and skip configs over
//! interchangeable storage backends, plus the client-side cache layer that
//! keeps the browser view coherent with the server.

pub mod api;
pub mod auth;
pub mod cache;
pub mod client;
pub mod core;
pub mod db;

// Re-export commonly used types
pub use crate::core::{CompoundKey, Config, EventBus, EventType, LunaError};
pub use api::ApiServer;
pub use cache::CacheManager;
pub use client::UserDataClient;
pub use db::{Storage, StorageBackend, StorageProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
