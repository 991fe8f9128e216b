use super::AppState;
use crate::api::models::{KeyQuery, SaveFavoriteRequest};
use crate::auth::middleware::AuthUser;
use crate::auth::models::SuccessResponse;
use crate::core::error::Result;
use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::Value;

/// Handler for GET /api/favorites. With `?key=` returns that favorite or
/// null, otherwise the full map.
pub async fn get_favorites(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<KeyQuery>,
) -> Result<Json<Value>> {
    let value = match query.parsed()? {
        Some(key) => {
            let favorite = state
                .provider
                .get_favorite(&user.username, key.source(), key.id())
                .await?;
            serde_json::to_value(favorite)?
        }
        None => serde_json::to_value(state.provider.get_all_favorites(&user.username).await?)?,
    };
    Ok(Json(value))
}

/// Handler for POST /api/favorites
pub async fn save_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<SaveFavoriteRequest>,
) -> Result<Json<SuccessResponse>> {
    let key = req.validate()?;

    state
        .provider
        .save_favorite(&user.username, key.source(), key.id(), &req.favorite)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Handler for DELETE /api/favorites
pub async fn delete_favorites(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<KeyQuery>,
) -> Result<Json<SuccessResponse>> {
    match query.parsed()? {
        Some(key) => {
            state
                .provider
                .delete_favorite(&user.username, key.source(), key.id())
                .await?
        }
        None => state.provider.clear_favorites(&user.username).await?,
    }
    Ok(Json(SuccessResponse::ok()))
}
