//! Request/response shapes for the admin endpoints

use crate::core::error::{LunaError, Result};
use crate::db::models::{AdminConfig, UserRole};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminConfigResponse {
    pub role: UserRole,
    pub config: AdminConfig,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<()> {
        let username = self.username.trim();
        if username.is_empty() || self.password.is_empty() {
            return Err(LunaError::ValidationError(
                "username and password are required".to_string(),
            ));
        }
        if username
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ':' | '*' | '?' | '[' | ']' | '\\'))
        {
            return Err(LunaError::ValidationError(
                "username cannot contain whitespace or any of : * ? [ ] \\".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserSummary {
    pub username: String,
    pub role: UserRole,
    pub banned: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_user_validation() {
        let ok = CreateUserRequest {
            username: "alice".into(),
            password: "pw".into(),
        };
        assert!(ok.validate().is_ok());

        let colon = CreateUserRequest {
            username: "a:b".into(),
            password: "pw".into(),
        };
        assert!(colon.validate().is_err());

        let empty = CreateUserRequest {
            username: " ".into(),
            password: "pw".into(),
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_create_user_rejects_pattern_characters() {
        for name in ["a*", "b?b", "c[d]", "e\\f"] {
            let req = CreateUserRequest {
                username: name.into(),
                password: "pw".into(),
            };
            assert!(req.validate().is_err(), "{} should be rejected", name);
        }
    }
}
