//! Redis command transport over the Upstash REST protocol
//!
//! A command is a JSON array of strings posted to the database URL; a
//! pipeline is an array of such arrays posted to `{url}/pipeline`. Replies
//! are `{"result": ...}` or `{"error": "..."}` per command.

use crate::core::error::{LunaError, Result};
use crate::core::retry::storage_error;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Build a command from its parts
pub fn cmd<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(Into::into).collect()
}

/// Seam between the key-value backend and its transport
#[async_trait]
pub trait KvClient: Send + Sync {
    async fn command(&self, command: Vec<String>) -> Result<Value>;

    /// Send several commands in one round trip. Replies come back in order.
    async fn pipeline(&self, commands: Vec<Vec<String>>) -> Result<Vec<Value>>;
}

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl Reply {
    fn into_result(self) -> Result<Value> {
        match self.error {
            Some(error) => Err(storage_error(error)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

pub struct UpstashClient {
    http: reqwest::Client,
    url: String,
    token: String,
}

impl UpstashClient {
    pub fn new(url: &str, token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LunaError::InitializationError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn post(&self, url: String, body: Value) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LunaError::TransientStorageError(format!(
                "Upstash responded with {}",
                status
            )));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(LunaError::StorageError(format!(
                "Upstash rejected the access token ({})",
                status
            )));
        }

        Ok(response)
    }
}

fn transport_error(e: reqwest::Error) -> LunaError {
    if e.is_timeout() {
        LunaError::Timeout(format!("Upstash request timed out: {}", e))
    } else if e.is_connect() || e.is_request() {
        LunaError::NetworkError(format!("Connection error: {}", e))
    } else {
        storage_error(e.to_string())
    }
}

#[async_trait]
impl KvClient for UpstashClient {
    async fn command(&self, command: Vec<String>) -> Result<Value> {
        let response = self.post(self.url.clone(), Value::from(command)).await?;
        let reply: Reply = response.json().await.map_err(transport_error)?;
        reply.into_result()
    }

    async fn pipeline(&self, commands: Vec<Vec<String>>) -> Result<Vec<Value>> {
        let expected = commands.len();
        let body = Value::Array(commands.into_iter().map(Value::from).collect());
        let response = self.post(format!("{}/pipeline", self.url), body).await?;
        let replies: Vec<Reply> = response.json().await.map_err(transport_error)?;

        if replies.len() != expected {
            return Err(LunaError::StorageError(format!(
                "Pipeline returned {} replies for {} commands",
                replies.len(),
                expected
            )));
        }

        replies.into_iter().map(Reply::into_result).collect()
    }
}
