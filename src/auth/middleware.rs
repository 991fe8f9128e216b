//! Authentication middleware

use crate::api::handlers::AppState;
use crate::auth::jwt::validate_token;
use crate::core::error::{LunaError, Result};
use crate::db::models::UserRole;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Authenticated caller, stored in request extensions
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub username: String,
    pub role: UserRole,
}

impl AuthUser {
    /// Fail unless the caller is an admin or the owner
    pub fn require_admin(&self) -> Result<()> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(LunaError::PermissionDenied("Admin privileges required".to_string()))
        }
    }

    pub fn require_owner(&self) -> Result<()> {
        if self.role == UserRole::Owner {
            Ok(())
        } else {
            Err(LunaError::PermissionDenied("Only the site owner can do this".to_string()))
        }
    }
}

/// Bearer token from the Authorization header, or the `token` query parameter
fn extract_token(request: &Request) -> Option<String> {
    let from_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string);

    from_header.or_else(|| {
        request.uri().query().and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(k, _)| k == "token")
                .map(|(_, v)| v.into_owned())
        })
    })
}

/// Authentication middleware
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(token) = extract_token(&request) else {
        return LunaError::AuthenticationError("Missing authentication token".to_string()).into_response();
    };

    let claims = match validate_token(&token, &state.security.jwt_secret) {
        Ok(c) => c,
        Err(e) => return e.into_response(),
    };

    let role = match current_role(&state, &claims.username, claims.role).await {
        Ok(role) => role,
        Err(e) => return e.into_response(),
    };

    request.extensions_mut().insert(AuthUser {
        username: claims.username,
        role,
    });

    next.run(request).await
}

/// Role of a token holder as of now. Tokens of banned or deleted accounts
/// stop working before they expire, and role changes apply at once.
async fn current_role(state: &AppState, username: &str, claimed: UserRole) -> Result<UserRole> {
    // Owner tokens are only issued from the configured credentials
    if claimed == UserRole::Owner {
        return Ok(claimed);
    }

    let config = state.provider.get_admin_config().await?;
    let entry = config.as_ref().and_then(|c| c.find_user(username));
    if entry.map(|u| u.banned).unwrap_or(false) {
        tracing::warn!(username = %username, "Rejected token of banned user");
        return Err(LunaError::AuthenticationError("User is banned".to_string()));
    }

    if !state.provider.check_user_exist(username).await? {
        tracing::warn!(username = %username, "Rejected token of deleted user");
        return Err(LunaError::AuthenticationError("User no longer exists".to_string()));
    }

    Ok(entry.map(|u| u.role).unwrap_or(UserRole::User))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = LunaError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| LunaError::AuthenticationError("User not authenticated".to_string()))
    }
}
