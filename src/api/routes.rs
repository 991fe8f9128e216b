//! API routes

use crate::api::handlers::{
    add_search_history, create_user, delete_favorites, delete_play_records, delete_search_history,
    delete_skip_config, delete_user, get_admin_config, get_favorites, get_play_records,
    get_search_history, get_skip_configs, health_check, list_users, reset_admin_config,
    save_admin_config, save_favorite, save_play_record, save_skip_config, AppState,
};
use crate::auth::handlers::{change_password, login, logout};
use crate::auth::middleware::authenticate;
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

/// Build the API routes
pub fn build_api_routes(state: AppState) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(health_check))
        .route("/api/login", post(login));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/api/logout", post(logout))
        .route("/api/change-password", post(change_password))
        // Per-user data
        .route(
            "/api/playrecords",
            get(get_play_records).post(save_play_record).delete(delete_play_records),
        )
        .route(
            "/api/favorites",
            get(get_favorites).post(save_favorite).delete(delete_favorites),
        )
        .route(
            "/api/searchhistory",
            get(get_search_history)
                .post(add_search_history)
                .delete(delete_search_history),
        )
        .route(
            "/api/skipconfigs",
            get(get_skip_configs).post(save_skip_config).delete(delete_skip_config),
        )
        // Admin endpoints
        .route("/api/admin/config", get(get_admin_config).post(save_admin_config))
        .route("/api/admin/reset", get(reset_admin_config))
        .route("/api/admin/users", get(list_users).post(create_user))
        .route("/api/admin/users/:username", delete(delete_user))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate));

    public_routes.merge(protected_routes).with_state(state)
}
