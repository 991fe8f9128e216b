use super::AppState;
use crate::api::models::{AdminConfigResponse, CreateUserRequest, UserSummary};
use crate::auth::middleware::AuthUser;
use crate::auth::models::SuccessResponse;
use crate::core::error::{LunaError, Result};
use crate::db::models::{AdminConfig, UserRole};
use axum::{
    extract::{Path, State},
    Json,
};

/// Handler for GET /api/admin/config
pub async fn get_admin_config(State(state): State<AppState>, user: AuthUser) -> Result<Json<AdminConfigResponse>> {
    user.require_admin()?;
    let config = state.provider.admin_config_or_default(state.owner()).await?;
    Ok(Json(AdminConfigResponse {
        role: user.role,
        config,
    }))
}

/// Handler for POST /api/admin/config. The whole document is replaced.
pub async fn save_admin_config(
    State(state): State<AppState>,
    user: AuthUser,
    Json(mut config): Json<AdminConfig>,
) -> Result<Json<SuccessResponse>> {
    user.require_admin()?;
    if let Some(owner) = state.owner() {
        config.ensure_user(owner, UserRole::Owner);
    }
    state.provider.set_admin_config(&config).await?;
    tracing::info!(by = %user.username, "Admin configuration saved");
    Ok(Json(SuccessResponse::ok()))
}

/// Handler for GET /api/admin/reset
pub async fn reset_admin_config(State(state): State<AppState>, user: AuthUser) -> Result<Json<SuccessResponse>> {
    user.require_owner()?;
    state.provider.reset_admin_config(state.owner()).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Handler for GET /api/admin/users
pub async fn list_users(State(state): State<AppState>, user: AuthUser) -> Result<Json<Vec<UserSummary>>> {
    user.require_admin()?;
    let config = state.provider.admin_config_or_default(state.owner()).await?;
    let users = config
        .user_config
        .users
        .into_iter()
        .map(|u| UserSummary {
            username: u.username,
            role: u.role,
            banned: u.banned,
        })
        .collect();
    Ok(Json(users))
}

/// Handler for POST /api/admin/users
pub async fn create_user(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<SuccessResponse>> {
    user.require_admin()?;
    req.validate()?;
    let username = req.username.trim();

    if Some(username) == state.owner() || state.provider.check_user_exist(username).await? {
        return Err(LunaError::InvalidRequest(format!("User '{}' already exists", username)));
    }

    state.provider.register_user(username, &req.password).await?;

    let mut config = state.provider.admin_config_or_default(state.owner()).await?;
    config.ensure_user(username, UserRole::User);
    state.provider.set_admin_config(&config).await?;

    tracing::info!(username = %username, by = %user.username, "User created");
    Ok(Json(SuccessResponse::ok()))
}

/// Handler for DELETE /api/admin/users/:username
pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(username): Path<String>,
) -> Result<Json<SuccessResponse>> {
    user.require_admin()?;

    if Some(username.as_str()) == state.owner() {
        return Err(LunaError::PermissionDenied("The site owner cannot be deleted".to_string()));
    }

    let mut config = state.provider.admin_config_or_default(state.owner()).await?;
    let target_role = config.find_user(&username).map(|u| u.role);

    if target_role == Some(UserRole::Owner) {
        return Err(LunaError::PermissionDenied("The site owner cannot be deleted".to_string()));
    }
    if target_role == Some(UserRole::Admin) && user.role != UserRole::Owner {
        return Err(LunaError::PermissionDenied(
            "Only the site owner can delete an admin".to_string(),
        ));
    }
    if target_role.is_none() && !state.provider.check_user_exist(&username).await? {
        return Err(LunaError::NotFound(format!("User '{}'", username)));
    }

    state.provider.delete_user(&username).await?;
    config.remove_user(&username);
    state.provider.set_admin_config(&config).await?;

    tracing::info!(username = %username, by = %user.username, "User deleted");
    Ok(Json(SuccessResponse::ok()))
}
