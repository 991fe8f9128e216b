//! Compound `source+id` keys addressing per-user catalog records

use crate::core::error::{LunaError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

/// Separator between source and id
pub const KEY_SEPARATOR: char = '+';

lazy_static! {
    static ref KEY_PATTERN: Regex = Regex::new(r"^.+\+.+$").expect("static key pattern");
}

/// A validated `source+id` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompoundKey {
    source: String,
    id: String,
}

impl CompoundKey {
    /// Build a key from its parts. The source may not contain the separator.
    pub fn new(source: impl Into<String>, id: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let id = id.into();

        if source.is_empty() || id.is_empty() {
            return Err(LunaError::ValidationError(
                "source and id must not be empty".to_string(),
            ));
        }
        if source.contains(KEY_SEPARATOR) {
            return Err(LunaError::ValidationError(format!(
                "source '{}' must not contain '{}'",
                source, KEY_SEPARATOR
            )));
        }

        Ok(Self { source, id })
    }

    /// Parse `source+id`, splitting on the first separator
    pub fn parse(key: &str) -> Result<Self> {
        if !KEY_PATTERN.is_match(key) {
            return Err(LunaError::ValidationError(format!(
                "key '{}' is not of the form source+id",
                key
            )));
        }

        match key.split_once(KEY_SEPARATOR) {
            Some((source, id)) => Self::new(source, id),
            None => Err(LunaError::ValidationError(format!("invalid key '{}'", key))),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for CompoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.source, KEY_SEPARATOR, self.id)
    }
}

/// Render `(source, id)` as a key string after validation
pub fn generate_key(source: &str, id: &str) -> Result<String> {
    CompoundKey::new(source, id).map(|k| k.to_string())
}

/// Check that a raw key string is a well-formed compound key
pub fn validate_key(key: &str) -> Result<()> {
    CompoundKey::parse(key).map(|_| ())
}
