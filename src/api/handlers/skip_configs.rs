use super::AppState;
use crate::api::models::{KeyQuery, SaveSkipConfigRequest};
use crate::auth::middleware::AuthUser;
use crate::auth::models::SuccessResponse;
use crate::core::error::{LunaError, Result};
use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::Value;

/// Handler for GET /api/skipconfigs. With `?key=` returns that config or
/// null, otherwise the full map.
pub async fn get_skip_configs(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<KeyQuery>,
) -> Result<Json<Value>> {
    let value = match query.parsed()? {
        Some(key) => serde_json::to_value(
            state
                .provider
                .get_skip_config(&user.username, key.source(), key.id())
                .await?,
        )?,
        None => serde_json::to_value(state.provider.get_all_skip_configs(&user.username).await?)?,
    };
    Ok(Json(value))
}

/// Handler for POST /api/skipconfigs
pub async fn save_skip_config(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<SaveSkipConfigRequest>,
) -> Result<Json<SuccessResponse>> {
    let key = req.validate()?;
    state
        .provider
        .save_skip_config(&user.username, key.source(), key.id(), &req.config)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Handler for DELETE /api/skipconfigs?key=
pub async fn delete_skip_config(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<KeyQuery>,
) -> Result<Json<SuccessResponse>> {
    let key = query
        .parsed()?
        .ok_or_else(|| LunaError::ValidationError("key is required".to_string()))?;
    state
        .provider
        .delete_skip_config(&user.username, key.source(), key.id())
        .await?;
    Ok(Json(SuccessResponse::ok()))
}
