//! Linear-backoff retry for calls against the remote backend

use crate::core::error::{LunaError, Result};
use std::future::Future;
use std::time::Duration;

/// Retry schedule. The delay before attempt `n + 1` is `base_delay * n`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Remote storage call failed, retrying: {}",
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(attempt, "Remote storage call failed after retries: {}", e);
                }
                return Err(e);
            }
        }
    }
}

/// Classify an error message from the remote store as transient
pub fn is_transient_message(message: &str) -> bool {
    const MARKERS: [&str; 5] = ["Connection", "ECONNREFUSED", "ECONNRESET", "ENOTFOUND", "EPIPE"];
    MARKERS.iter().any(|m| message.contains(m))
}

/// Map a message to the transient or permanent storage error variant
pub fn storage_error(message: impl Into<String>) -> LunaError {
    let message = message.into();
    if is_transient_message(&message) {
        LunaError::TransientStorageError(message)
    } else {
        LunaError::StorageError(message)
    }
}
