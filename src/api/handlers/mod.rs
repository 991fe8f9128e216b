pub mod admin;
pub mod favorites;
pub mod play_records;
pub mod search_history;
pub mod skip_configs;
pub mod system;

pub use admin::*;
pub use favorites::*;
pub use play_records::*;
pub use search_history::*;
pub use skip_configs::*;
pub use system::*;

use crate::core::config::SecurityConfig;
use crate::db::provider::StorageProvider;
use std::sync::Arc;

/// Shared application state for handlers
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<StorageProvider>,
    pub security: Arc<SecurityConfig>,
}

impl AppState {
    pub fn new(provider: Arc<StorageProvider>, security: SecurityConfig) -> Self {
        Self {
            provider,
            security: Arc::new(security),
        }
    }

    pub fn owner(&self) -> Option<&str> {
        self.security.owner_username.as_deref()
    }
}
