//! Self-service handlers for the logged-in user. Admin CRUD on `/users`
//! mounts the generic factory handlers directly.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use natours_core::error::CoreError;
use natours_core::types::Document;
use natours_core::update::UpdateSpec;
use natours_db::models::{Model, User};
use serde_json::Value;

use crate::error::AppResult;
use crate::factory::{present, Resource};
use crate::middleware::auth::AuthUser;
use crate::middleware::request_time::RequestTime;
use crate::query::JsonBody;
use crate::response::Envelope;
use crate::state::AppState;

/// Fields a user may change about themselves.
const SELF_EDITABLE: &[&str] = &["name", "email"];

/// GET /api/v1/users/me
pub async fn get_me(
    auth: AuthUser,
    State(state): State<AppState>,
    RequestTime(requested_time): RequestTime,
) -> AppResult<Json<Envelope<Document>>> {
    let me = Resource::<User>::new(&state).get_one(&auth.user_id).await?;
    Ok(Json(Envelope::success(me).requested_at(requested_time)))
}

/// PATCH /api/v1/users/updateMe
///
/// Only `name` and `email` are applied; everything else in the body is
/// ignored. Password fields are rejected outright.
pub async fn update_me(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> AppResult<Json<Envelope<Document>>> {
    if body.contains_key("password") || body.contains_key("passwordConfirm") {
        return Err(CoreError::Validation(
            "This route is not for password updates. Please use /updateMyPassword.".into(),
        )
        .into());
    }

    let mut set: Document = body
        .into_iter()
        .filter(|(key, _)| SELF_EDITABLE.contains(&key.as_str()))
        .collect();
    if let Some(Value::String(email)) = set.get_mut("email") {
        *email = email.trim().to_lowercase();
    }

    let updated = state
        .store
        .collection(User::COLLECTION)
        .update_by_id(&auth.user_id, &UpdateSpec::set(set), User::validate_document)
        .await?
        .ok_or_else(|| CoreError::not_found(User::ENTITY, auth.user_id.as_str()))?;
    tracing::info!(user_id = %auth.user_id, "Profile updated");

    Ok(Json(Envelope::success(present::<User>(updated))))
}

/// DELETE /api/v1/users/deleteMe
///
/// Deactivates the account; the document stays but no longer appears
/// anywhere and its tokens stop working.
pub async fn delete_me(auth: AuthUser, State(state): State<AppState>) -> AppResult<StatusCode> {
    let mut set = Document::new();
    set.insert("active".into(), Value::Bool(false));
    state
        .store
        .collection(User::COLLECTION)
        .update_by_id(&auth.user_id, &UpdateSpec::set(set), User::validate_document)
        .await?
        .ok_or_else(|| CoreError::not_found(User::ENTITY, auth.user_id.as_str()))?;
    tracing::info!(user_id = %auth.user_id, "Account deactivated");

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/users
///
/// Accounts are only created through signup.
pub async fn create_user() -> AppResult<StatusCode> {
    Err(CoreError::Operational {
        status: 500,
        message: "This route is not defined! Please use /signup instead".into(),
    }
    .into())
}
