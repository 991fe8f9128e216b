//! Password hashing and verification using bcrypt
//!
//! Stored credentials are bcrypt hashes. Values that do not carry the
//! bcrypt `$2` prefix are legacy plaintext passwords; a successful match
//! against one yields a fresh hash that the backend persists in its
//! migrate-on-verify step.

use crate::core::error::{LunaError, Result};

/// Work factor for every stored hash
pub const BCRYPT_COST: u32 = 10;

/// Outcome of checking a password against a stored credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialCheck {
    Rejected,
    Accepted,
    /// Matched a legacy plaintext value; the new hash should replace it
    AcceptedNeedsMigration(String),
}

impl CredentialCheck {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, CredentialCheck::Rejected)
    }
}

/// Hash a password using bcrypt
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, BCRYPT_COST)
        .map_err(|e| LunaError::AuthenticationError(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a bcrypt hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash)
        .map_err(|e| LunaError::AuthenticationError(format!("Failed to verify password: {}", e)))
}

pub fn is_bcrypt_hash(stored: &str) -> bool {
    stored.starts_with("$2")
}

/// Check `password` against whatever is stored for the user
pub fn verify_credential(stored: &str, password: &str) -> Result<CredentialCheck> {
    if is_bcrypt_hash(stored) {
        return Ok(if verify_password(password, stored)? {
            CredentialCheck::Accepted
        } else {
            CredentialCheck::Rejected
        });
    }

    if stored == password {
        Ok(CredentialCheck::AcceptedNeedsMigration(hash_password(password)?))
    } else {
        Ok(CredentialCheck::Rejected)
    }
}
