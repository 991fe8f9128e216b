//! JWT token generation and validation

use crate::core::error::{LunaError, Result};
use crate::db::models::UserRole;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub role: UserRole,
    pub exp: usize,
}

/// Generate a JWT token for a user, valid for `ttl_hours`
pub fn generate_token(username: &str, role: UserRole, secret: &str, ttl_hours: i64) -> Result<String> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(ttl_hours))
        .ok_or_else(|| LunaError::AuthenticationError("Failed to calculate expiration".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        username: username.to_string(),
        role,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| LunaError::AuthenticationError(format!("Failed to generate token: {}", e)))
}

/// Validate a JWT token and extract claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| LunaError::AuthenticationError(format!("Invalid token: {}", e)))?;

    Ok(token_data.claims)
}
