//! REST API module
//!
//! This module provides the HTTP server and REST API endpoints including:
//! - Per-user data endpoints backed by the active storage backend
//! - Admin configuration and user management
//! - Request tracing and error response formatting

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use handlers::AppState;
pub use middleware::{trace_id_middleware, TraceId, TRACE_ID_HEADER};
pub use routes::build_api_routes;
pub use server::ApiServer;
