//! Handlers for signup, login, logout and password changes.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use natours_core::error::CoreError;
use natours_core::query::Filter;
use natours_core::types::{doc_id, format_timestamp, Document};
use natours_core::update::UpdateSpec;
use natours_db::models::user::MIN_PASSWORD_LENGTH;
use natours_db::models::{Model, User};
use serde_json::{json, Value};

use crate::auth::cookie::{logout_cookie, session_cookie};
use crate::auth::jwt::generate_token;
use crate::auth::password::{hash_password, password_changed_now, verify_password};
use crate::error::{AppError, AppResult};
use crate::factory::present;
use crate::middleware::auth::AuthUser;
use crate::query::JsonBody;
use crate::response::TokenEnvelope;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/users/signup
///
/// Body: `name`, `email`, `password`, `passwordConfirm`. Roles cannot be
/// self-assigned. Responds 201 with a token and sets the `jwt` cookie.
pub async fn signup(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> AppResult<Response> {
    let password = body.get("password").and_then(Value::as_str);
    let confirm = body.get("passwordConfirm").and_then(Value::as_str);
    if password.is_some() && password != confirm {
        return Err(CoreError::Validation("Passwords are not the same!".into()).into());
    }

    let mut user = User::from_document(&body)?;
    user.role = None;
    user.active = None;
    user.password_changed_at = None;
    user.check()?;
    user.prepare();
    user.password = user.password.as_deref().map(hash).transpose()?;

    let created = state
        .store
        .collection(User::COLLECTION)
        .create(user.to_document()?)
        .await?;
    tracing::info!(user_id = doc_id(&created).unwrap_or_default(), "User signed up");

    send_token(&state, created, StatusCode::CREATED)
}

/// POST /api/v1/users/login
///
/// 400 without email or password, 401 on bad credentials, 403 for a
/// deactivated account.
pub async fn login(
    State(state): State<AppState>,
    body: JsonBody,
) -> AppResult<Response> {
    let (Some(email), Some(password)) = (body.str_field("email"), body.str_field("password"))
    else {
        return Err(CoreError::Validation("Please provide email and password!".into()).into());
    };

    let user = state
        .store
        .collection(User::COLLECTION)
        .find_one(&[Filter::eq("email", email.trim().to_lowercase())])
        .await?;
    let invalid = || AppError::Core(CoreError::Unauthorized("Incorrect email or password".into()));

    let user = user.ok_or_else(invalid)?;
    let hash = user
        .get("password")
        .and_then(Value::as_str)
        .ok_or_else(invalid)?;
    let valid = verify_password(password, hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !valid {
        return Err(invalid());
    }

    if user.get("active") == Some(&Value::Bool(false)) {
        return Err(CoreError::Forbidden("This account has been deactivated".into()).into());
    }

    send_token(&state, user, StatusCode::OK)
}

/// GET /api/v1/users/logout
///
/// Overwrites the `jwt` cookie with a short-lived placeholder.
pub async fn logout() -> Response {
    (
        StatusCode::OK,
        [(SET_COOKIE, logout_cookie())],
        Json(json!({ "status": "success" })),
    )
        .into_response()
}

/// PATCH /api/v1/users/updateMyPassword
///
/// Body: `passwordCurrent`, `password`, `passwordConfirm`. Issues a new token;
/// tokens issued before the change stop working.
pub async fn update_my_password(
    auth: AuthUser,
    State(state): State<AppState>,
    body: JsonBody,
) -> AppResult<Response> {
    let current = body.str_field("passwordCurrent").unwrap_or_default();
    let stored = auth
        .user
        .get("password")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let matches = verify_password(current, stored)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !matches {
        return Err(CoreError::Unauthorized("Your current password is wrong.".into()).into());
    }

    let password = body.str_field("password").unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LENGTH as usize {
        return Err(CoreError::Validation(format!(
            "A password must have at least {MIN_PASSWORD_LENGTH} characters"
        ))
        .into());
    }
    if Some(password) != body.str_field("passwordConfirm") {
        return Err(CoreError::Validation("Passwords are not the same!".into()).into());
    }

    let mut set = Document::new();
    set.insert("password".into(), Value::String(hash(password)?));
    set.insert(
        "passwordChangedAt".into(),
        Value::String(format_timestamp(&password_changed_now())),
    );
    let updated = state
        .store
        .collection(User::COLLECTION)
        .update_by_id(&auth.user_id, &UpdateSpec::set(set), User::validate_document)
        .await?
        .ok_or_else(|| CoreError::not_found(User::ENTITY, auth.user_id.as_str()))?;
    tracing::info!(user_id = %auth.user_id, "Password changed");

    send_token(&state, updated, StatusCode::OK)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn hash(password: &str) -> AppResult<String> {
    hash_password(password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))
}

/// Issue a token for `user`: JSON body plus the `jwt` cookie.
fn send_token(state: &AppState, user: Document, status: StatusCode) -> AppResult<Response> {
    let user_id = doc_id(&user)
        .ok_or_else(|| AppError::InternalError("user document without an id".into()))?;
    let token = generate_token(user_id, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;
    let cookie = session_cookie(&token, &state.config);

    let body = TokenEnvelope::new(token, present::<User>(user));
    Ok((status, [(SET_COOKIE, cookie)], Json(body)).into_response())
}
