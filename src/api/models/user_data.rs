//! Request shapes for the per-user data endpoints

use crate::core::error::{LunaError, Result};
use crate::core::keys::CompoundKey;
use crate::db::models::{Favorite, PlayRecord, SkipConfig};
use serde::Deserialize;

/// Longest accepted search keyword, in characters
pub const MAX_KEYWORD_CHARS: usize = 100;

/// `?key=source+id`
#[derive(Debug, Default, Deserialize)]
pub struct KeyQuery {
    pub key: Option<String>,
}

impl KeyQuery {
    pub fn parsed(&self) -> Result<Option<CompoundKey>> {
        self.key.as_deref().map(CompoundKey::parse).transpose()
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LunaError::ValidationError(format!("{} cannot be empty", field)));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct SavePlayRecordRequest {
    pub key: String,
    pub record: PlayRecord,
}

impl SavePlayRecordRequest {
    pub fn validate(&self) -> Result<CompoundKey> {
        let key = CompoundKey::parse(&self.key)?;
        require_text("title", &self.record.title)?;
        require_text("source_name", &self.record.source_name)?;
        if self.record.index < 0 || self.record.total_episodes < 0 {
            return Err(LunaError::ValidationError("episode numbers cannot be negative".to_string()));
        }
        if self.record.play_time < 0.0 || self.record.total_time < 0.0 {
            return Err(LunaError::ValidationError("play times cannot be negative".to_string()));
        }
        Ok(key)
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveFavoriteRequest {
    pub key: String,
    pub favorite: Favorite,
}

impl SaveFavoriteRequest {
    pub fn validate(&self) -> Result<CompoundKey> {
        let key = CompoundKey::parse(&self.key)?;
        require_text("title", &self.favorite.title)?;
        require_text("source_name", &self.favorite.source_name)?;
        Ok(key)
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveSkipConfigRequest {
    pub key: String,
    pub config: SkipConfig,
}

impl SaveSkipConfigRequest {
    pub fn validate(&self) -> Result<CompoundKey> {
        let key = CompoundKey::parse(&self.key)?;
        if self.config.intro_time < 0 || self.config.outro_time < 0 {
            return Err(LunaError::ValidationError("skip times cannot be negative".to_string()));
        }
        Ok(key)
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchHistoryRequest {
    pub keyword: String,
}

impl SearchHistoryRequest {
    /// Trimmed keyword
    pub fn validate(&self) -> Result<&str> {
        let keyword = self.keyword.trim();
        let chars = keyword.chars().count();
        if chars == 0 || chars > MAX_KEYWORD_CHARS {
            return Err(LunaError::ValidationError(format!(
                "keyword must be 1 to {} characters",
                MAX_KEYWORD_CHARS
            )));
        }
        Ok(keyword)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct KeywordQuery {
    pub keyword: Option<String>,
}
