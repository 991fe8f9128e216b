//! Network access to the server's user-data endpoints

use crate::core::error::{LunaError, Result};
use crate::db::models::{Favorite, FavoriteMap, PlayRecord, PlayRecordMap, SkipConfig, SkipConfigMap};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

/// Authoritative copy of the signed-in user's data
#[async_trait]
pub trait UserDataApi: Send + Sync {
    async fn fetch_play_records(&self) -> Result<PlayRecordMap>;
    async fn save_play_record(&self, key: &str, record: &PlayRecord) -> Result<()>;
    async fn delete_play_record(&self, key: &str) -> Result<()>;
    async fn clear_play_records(&self) -> Result<()>;

    async fn fetch_favorites(&self) -> Result<FavoriteMap>;
    async fn save_favorite(&self, key: &str, favorite: &Favorite) -> Result<()>;
    async fn delete_favorite(&self, key: &str) -> Result<()>;
    async fn clear_favorites(&self) -> Result<()>;

    async fn fetch_search_history(&self) -> Result<Vec<String>>;
    async fn add_search_history(&self, keyword: &str) -> Result<()>;
    /// Delete one keyword, or everything when `keyword` is None
    async fn delete_search_history(&self, keyword: Option<&str>) -> Result<()>;

    async fn fetch_skip_configs(&self) -> Result<SkipConfigMap>;
    async fn save_skip_config(&self, key: &str, config: &SkipConfig) -> Result<()>;
    async fn delete_skip_config(&self, key: &str) -> Result<()>;
}

/// [`UserDataApi`] over the HTTP API, authenticated with a bearer token
pub struct HttpUserDataApi {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpUserDataApi {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LunaError::InitializationError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LunaError::Timeout(e.to_string())
            } else {
                LunaError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        Err(match status {
            StatusCode::UNAUTHORIZED => LunaError::AuthenticationError("Session expired".to_string()),
            StatusCode::FORBIDDEN => LunaError::PermissionDenied(format!("Request to {} was refused", url)),
            _ => LunaError::NetworkError(format!("Request to {} failed: {}", url, status)),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, path)).await?;
        response
            .json()
            .await
            .map_err(|e| LunaError::DeserializationError(e.to_string()))
    }
}

#[async_trait]
impl UserDataApi for HttpUserDataApi {
    async fn fetch_play_records(&self) -> Result<PlayRecordMap> {
        self.get_json("/api/playrecords").await
    }

    async fn save_play_record(&self, key: &str, record: &PlayRecord) -> Result<()> {
        let body = json!({ "key": key, "record": record });
        self.send(self.request(Method::POST, "/api/playrecords").json(&body)).await?;
        Ok(())
    }

    async fn delete_play_record(&self, key: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, "/api/playrecords").query(&[("key", key)]))
            .await?;
        Ok(())
    }

    async fn clear_play_records(&self) -> Result<()> {
        self.send(self.request(Method::DELETE, "/api/playrecords")).await?;
        Ok(())
    }

    async fn fetch_favorites(&self) -> Result<FavoriteMap> {
        self.get_json("/api/favorites").await
    }

    async fn save_favorite(&self, key: &str, favorite: &Favorite) -> Result<()> {
        let body = json!({ "key": key, "favorite": favorite });
        self.send(self.request(Method::POST, "/api/favorites").json(&body)).await?;
        Ok(())
    }

    async fn delete_favorite(&self, key: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, "/api/favorites").query(&[("key", key)]))
            .await?;
        Ok(())
    }

    async fn clear_favorites(&self) -> Result<()> {
        self.send(self.request(Method::DELETE, "/api/favorites")).await?;
        Ok(())
    }

    async fn fetch_search_history(&self) -> Result<Vec<String>> {
        self.get_json("/api/searchhistory").await
    }

    async fn add_search_history(&self, keyword: &str) -> Result<()> {
        let body = json!({ "keyword": keyword });
        self.send(self.request(Method::POST, "/api/searchhistory").json(&body)).await?;
        Ok(())
    }

    async fn delete_search_history(&self, keyword: Option<&str>) -> Result<()> {
        let mut builder = self.request(Method::DELETE, "/api/searchhistory");
        if let Some(keyword) = keyword {
            builder = builder.query(&[("keyword", keyword)]);
        }
        self.send(builder).await?;
        Ok(())
    }

    async fn fetch_skip_configs(&self) -> Result<SkipConfigMap> {
        self.get_json("/api/skipconfigs").await
    }

    async fn save_skip_config(&self, key: &str, config: &SkipConfig) -> Result<()> {
        let body = json!({ "key": key, "config": config });
        self.send(self.request(Method::POST, "/api/skipconfigs").json(&body)).await?;
        Ok(())
    }

    async fn delete_skip_config(&self, key: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, "/api/skipconfigs").query(&[("key", key)]))
            .await?;
        Ok(())
    }
}
