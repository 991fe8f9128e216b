//! Storage contract shared by every backend
//!
//! Records are addressed by user plus compound `source+id` key. Credential
//! handling (hashing, legacy plaintext migration) is implemented once here on
//! top of the raw hash accessors each backend provides.

use crate::auth::password::{hash_password, verify_credential, CredentialCheck};
use crate::core::error::Result;
use crate::db::models::{AdminConfig, Favorite, FavoriteMap, PlayRecord, PlayRecordMap, SkipConfig, SkipConfigMap};
use async_trait::async_trait;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Short backend name used in logs and health output
    fn name(&self) -> &'static str;

    // Play records
    async fn get_play_record(&self, user: &str, key: &str) -> Result<Option<PlayRecord>>;
    async fn set_play_record(&self, user: &str, key: &str, record: &PlayRecord) -> Result<()>;
    async fn get_all_play_records(&self, user: &str) -> Result<PlayRecordMap>;
    async fn delete_play_record(&self, user: &str, key: &str) -> Result<()>;
    async fn clear_play_records(&self, user: &str) -> Result<()>;

    // Favorites
    async fn get_favorite(&self, user: &str, key: &str) -> Result<Option<Favorite>>;
    async fn set_favorite(&self, user: &str, key: &str, favorite: &Favorite) -> Result<()>;
    async fn get_all_favorites(&self, user: &str) -> Result<FavoriteMap>;
    async fn delete_favorite(&self, user: &str, key: &str) -> Result<()>;
    async fn clear_favorites(&self, user: &str) -> Result<()>;

    // Skip configs
    async fn get_skip_config(&self, user: &str, source: &str, id: &str) -> Result<Option<SkipConfig>>;
    async fn set_skip_config(&self, user: &str, source: &str, id: &str, config: &SkipConfig) -> Result<()>;
    async fn delete_skip_config(&self, user: &str, source: &str, id: &str) -> Result<()>;
    async fn get_all_skip_configs(&self, user: &str) -> Result<SkipConfigMap>;

    // Credentials

    /// Raw stored credential: a bcrypt hash, or plaintext for legacy users
    async fn get_user_password_hash(&self, user: &str) -> Result<Option<String>>;

    /// Store a credential and make sure the user is in the user index
    async fn set_user_password_hash(&self, user: &str, hash: &str) -> Result<()>;

    async fn check_user_exist(&self, user: &str) -> Result<bool>;

    /// Remove the credential and every record the user owns
    async fn delete_user(&self, user: &str) -> Result<()>;

    async fn get_all_users(&self) -> Result<Vec<String>>;

    async fn register_user(&self, user: &str, password: &str) -> Result<()> {
        let hash = hash_password(password)?;
        self.set_user_password_hash(user, &hash).await
    }

    /// Check a password. Mutating: a matching legacy plaintext credential is
    /// replaced by its bcrypt hash before returning.
    async fn verify_user(&self, user: &str, password: &str) -> Result<bool> {
        let Some(stored) = self.get_user_password_hash(user).await? else {
            return Ok(false);
        };

        match verify_credential(&stored, password)? {
            CredentialCheck::Rejected => Ok(false),
            CredentialCheck::Accepted => Ok(true),
            CredentialCheck::AcceptedNeedsMigration(new_hash) => {
                self.migrate_on_verify(user, &new_hash).await;
                Ok(true)
            }
        }
    }

    /// Persist a migrated hash. A failed write leaves the legacy value in
    /// place and does not fail the verification.
    async fn migrate_on_verify(&self, user: &str, new_hash: &str) {
        match self.set_user_password_hash(user, new_hash).await {
            Ok(()) => tracing::info!(username = %user, "Migrated legacy plaintext password"),
            Err(e) => tracing::warn!(
                username = %user,
                "Failed to persist migrated password hash: {}",
                e
            ),
        }
    }

    async fn change_password(&self, user: &str, new_password: &str) -> Result<()> {
        let hash = hash_password(new_password)?;
        self.set_user_password_hash(user, &hash).await
    }

    // Search history, most recent first

    async fn get_search_history(&self, user: &str) -> Result<Vec<String>>;

    /// Move `keyword` to the front, keeping at most 20 entries
    async fn add_search_history(&self, user: &str, keyword: &str) -> Result<()>;

    /// Delete one keyword, or the whole history when `keyword` is None
    async fn delete_search_history(&self, user: &str, keyword: Option<&str>) -> Result<()>;

    // Admin configuration
    async fn get_admin_config(&self) -> Result<Option<AdminConfig>>;
    async fn set_admin_config(&self, config: &AdminConfig) -> Result<()>;

    /// Delete every user with their data, then the admin configuration
    async fn clear_all_data(&self) -> Result<()>;
}
