//! Authentication request/response models

use crate::core::error::{LunaError, Result};
use crate::db::models::UserRole;
use serde::{Deserialize, Serialize};

/// Login request. The username may be omitted in browser-local mode, where
/// only the site password is checked.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub ok: bool,
    pub username: String,
    pub role: UserRole,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub new_password: String,
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> Result<()> {
        if self.new_password.trim().is_empty() {
            return Err(LunaError::ValidationError("New password cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Generic success response
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub ok: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}
