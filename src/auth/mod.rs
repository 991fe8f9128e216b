//! Authentication module
//!
//! This module provides authentication functionality including:
//! - Login against the owner credentials or the storage backend
//! - JWT token generation and validation
//! - Password hashing and legacy plaintext migration
//! - Authentication middleware

pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;

pub use handlers::{change_password, login, logout};
pub use jwt::{generate_token, validate_token, Claims};
pub use middleware::{authenticate, AuthUser};
pub use password::{hash_password, verify_password};
