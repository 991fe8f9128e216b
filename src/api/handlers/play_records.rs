use super::AppState;
use crate::api::models::{KeyQuery, SavePlayRecordRequest};
use crate::auth::middleware::AuthUser;
use crate::auth::models::SuccessResponse;
use crate::core::error::Result;
use crate::db::models::PlayRecordMap;
use axum::{
    extract::{Query, State},
    Json,
};

/// Handler for GET /api/playrecords
pub async fn get_play_records(State(state): State<AppState>, user: AuthUser) -> Result<Json<PlayRecordMap>> {
    let records = state.provider.get_all_play_records(&user.username).await?;
    Ok(Json(records))
}

/// Handler for POST /api/playrecords
pub async fn save_play_record(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<SavePlayRecordRequest>,
) -> Result<Json<SuccessResponse>> {
    let key = req.validate()?;

    state
        .provider
        .save_play_record(&user.username, key.source(), key.id(), &req.record)
        .await?;

    tracing::debug!(username = %user.username, key = %key, "Saved play record");
    Ok(Json(SuccessResponse::ok()))
}

/// Handler for DELETE /api/playrecords. Without `?key=` every record is
/// removed.
pub async fn delete_play_records(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<KeyQuery>,
) -> Result<Json<SuccessResponse>> {
    match query.parsed()? {
        Some(key) => {
            state
                .provider
                .delete_play_record(&user.username, key.source(), key.id())
                .await?
        }
        None => state.provider.clear_play_records(&user.username).await?,
    }
    Ok(Json(SuccessResponse::ok()))
}
