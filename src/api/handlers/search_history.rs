use super::AppState;
use crate::api::models::{KeywordQuery, SearchHistoryRequest};
use crate::auth::middleware::AuthUser;
use crate::auth::models::SuccessResponse;
use crate::core::error::Result;
use axum::{
    extract::{Query, State},
    Json,
};

/// Handler for GET /api/searchhistory
pub async fn get_search_history(State(state): State<AppState>, user: AuthUser) -> Result<Json<Vec<String>>> {
    Ok(Json(state.provider.get_search_history(&user.username).await?))
}

/// Handler for POST /api/searchhistory. Responds with the updated history.
pub async fn add_search_history(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<SearchHistoryRequest>,
) -> Result<Json<Vec<String>>> {
    let keyword = req.validate()?;
    state.provider.add_search_history(&user.username, keyword).await?;
    Ok(Json(state.provider.get_search_history(&user.username).await?))
}

/// Handler for DELETE /api/searchhistory. Without `?keyword=` the whole
/// history is cleared.
pub async fn delete_search_history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<KeywordQuery>,
) -> Result<Json<SuccessResponse>> {
    let keyword = query.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty());
    state.provider.delete_search_history(&user.username, keyword).await?;
    Ok(Json(SuccessResponse::ok()))
}
