//! Authentication API handlers

use crate::api::handlers::AppState;
use crate::auth::jwt::generate_token;
use crate::auth::middleware::AuthUser;
use crate::auth::models::{ChangePasswordRequest, LoginRequest, LoginResponse, SuccessResponse};
use crate::core::error::{LunaError, Result};
use crate::db::local::LOCAL_USER;
use crate::db::models::UserRole;
use crate::db::provider::BackendKind;
use axum::{extract::State, Json};

fn invalid_credentials() -> LunaError {
    LunaError::AuthenticationError("Invalid username or password".to_string())
}

/// Handler for POST /api/login
pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Result<Json<LoginResponse>> {
    if req.password.is_empty() {
        return Err(LunaError::ValidationError("Password is required".to_string()));
    }

    let security = &state.security;
    let owner = security.owner_username.as_deref();

    // Browser-local deployments have a single site password and no accounts
    if state.provider.backend_kind().await == BackendKind::LocalStorage {
        if security.owner_password.as_deref() != Some(req.password.as_str()) {
            tracing::warn!("Rejected site password");
            return Err(invalid_credentials());
        }
        let token = generate_token(LOCAL_USER, UserRole::Owner, &security.jwt_secret, security.token_ttl_hours)?;
        return Ok(Json(LoginResponse {
            ok: true,
            username: LOCAL_USER.to_string(),
            role: UserRole::Owner,
            token,
        }));
    }

    let username = req
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| LunaError::ValidationError("Username is required".to_string()))?;

    tracing::info!(username = %username, "Login attempt");

    let role = if Some(username) == owner {
        if security.owner_password.as_deref() != Some(req.password.as_str()) {
            tracing::warn!(username = %username, "Invalid owner password");
            return Err(invalid_credentials());
        }
        UserRole::Owner
    } else {
        let config = state.provider.admin_config_or_default(owner).await?;
        let entry = config.find_user(username);
        if entry.map(|u| u.banned).unwrap_or(false) {
            tracing::warn!(username = %username, "Banned user attempted to log in");
            return Err(LunaError::AuthenticationError("User is banned".to_string()));
        }

        if !state.provider.verify_user(username, &req.password).await? {
            tracing::warn!(username = %username, "Invalid password");
            return Err(invalid_credentials());
        }
        entry.map(|u| u.role).unwrap_or(UserRole::User)
    };

    let token = generate_token(username, role, &security.jwt_secret, security.token_ttl_hours)?;
    tracing::info!(username = %username, role = role.as_str(), "Login successful");

    Ok(Json(LoginResponse {
        ok: true,
        username: username.to_string(),
        role,
        token,
    }))
}

/// Handler for POST /api/logout. Tokens are stateless; the client drops its
/// token and cache.
pub async fn logout(user: AuthUser) -> Json<SuccessResponse> {
    tracing::info!(username = %user.username, "Logout");
    Json(SuccessResponse::ok())
}

/// Handler for POST /api/change-password
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<SuccessResponse>> {
    req.validate()?;

    if state.provider.backend_kind().await == BackendKind::LocalStorage {
        return Err(LunaError::InvalidRequest(
            "Passwords cannot be changed in browser-local mode".to_string(),
        ));
    }
    if user.role == UserRole::Owner {
        return Err(LunaError::PermissionDenied(
            "The owner password is set in the server configuration".to_string(),
        ));
    }

    state.provider.change_password(&user.username, &req.new_password).await?;
    tracing::info!(username = %user.username, "Password changed");

    Ok(Json(SuccessResponse::ok()))
}
