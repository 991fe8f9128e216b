use crate::db::provider::BackendKind;
use serde::Serialize;

/// Overall health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Response for the health endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Active storage backend
    pub storage: BackendKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub version: &'static str,
    pub timestamp: String,
}
