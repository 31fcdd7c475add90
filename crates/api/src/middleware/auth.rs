//! JWT authentication extractor.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use natours_core::error::CoreError;
use natours_core::query::Filter;
use natours_core::roles::ROLE_USER;
use natours_core::types::{DocId, Document, ID_FIELD};
use natours_db::models::{Model, User};

use crate::auth::cookie::token_from_cookies;
use crate::auth::jwt::validate_token;
use crate::auth::password::changed_password_after;
use crate::error::AppError;
use crate::state::AppState;

/// The authenticated user, from a Bearer token or the `jwt` cookie.
///
/// The token's user must still exist and be active, and must not have changed
/// their password after the token was issued. The resolved user is cached in
/// the request extensions so stacked guards look it up once.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %user.user_id, role = %user.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DocId,
    pub role: String,
    /// The stored user document, password hash included.
    pub user: Document,
}

fn unauthorized(message: &str) -> AppError {
    AppError::Core(CoreError::Unauthorized(message.into()))
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let token = bearer_token(parts)
            .or_else(|| token_from_cookies(&parts.headers))
            .ok_or_else(|| unauthorized("You are not logged in! Please log in to get access."))?;

        let claims = validate_token(token, &state.config.jwt)
            .map_err(|_| unauthorized("Invalid or expired token. Please log in again!"))?;

        let mut filters = User::base_filters();
        filters.push(Filter::eq(ID_FIELD, claims.sub.clone()));
        let user = state
            .store
            .collection(User::COLLECTION)
            .find_one(&filters)
            .await?
            .ok_or_else(|| unauthorized("The user belonging to this token no longer exists."))?;

        if changed_password_after(&user, claims.iat) {
            return Err(unauthorized(
                "User recently changed password! Please log in again.",
            ));
        }

        let role = user
            .get("role")
            .and_then(|v| v.as_str())
            .unwrap_or(ROLE_USER)
            .to_string();
        let auth_user = AuthUser {
            user_id: claims.sub,
            role,
            user,
        };
        parts.extensions.insert(auth_user.clone());
        Ok(auth_user)
    }
}
