//! Core application layer
//!
//! This module provides:
//! - Configuration management
//! - Structured logging system
//! - Error handling and type system
//! - Event bus for pub/sub messaging
//! - Compound key handling and remote retry policy

pub mod config;
pub mod error;
pub mod event_bus;
pub mod keys;
pub mod logging;
pub mod retry;

pub use config::Config;
pub use error::{ErrorResponse, LunaError, Result};
pub use event_bus::{Event, EventBus, EventHandler, EventType, Subscription};
pub use keys::{generate_key, validate_key, CompoundKey};
pub use logging::Logger;
pub use retry::{with_retry, RetryPolicy};
