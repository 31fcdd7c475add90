//! Review handlers.
//!
//! Reviews live under `/reviews` and, scoped to one tour, under
//! `/tours/{tour_id}/reviews`. The author is always the logged-in user, a
//! user reviews a tour at most once, and every write refreshes the tour's
//! `ratingsAverage` / `ratingsQuantity`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use natours_core::error::CoreError;
use natours_core::query::{Filter, QuerySpec, RetrievalRequest};
use natours_core::roles::ROLE_USER;
use natours_core::types::Document;
use natours_core::update::UpdateSpec;
use natours_db::models::{Model, Review, Tour};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::factory::Resource;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::{RequireCustomer, RequireCustomerOrAdmin};
use crate::middleware::request_time::RequestTime;
use crate::query::{JsonBody, ListQuery};
use crate::response::Envelope;
use crate::state::AppState;

/// Rating a tour shows before anyone reviewed it.
pub const DEFAULT_RATING: f64 = 4.5;

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/reviews
pub async fn list_reviews(
    _auth: AuthUser,
    State(state): State<AppState>,
    RequestTime(requested_time): RequestTime,
    ListQuery(spec): ListQuery,
) -> AppResult<Json<Envelope<Vec<Document>>>> {
    list(&state, None, spec, requested_time).await
}

/// GET /api/v1/tours/{tour_id}/reviews
pub async fn list_tour_reviews(
    _auth: AuthUser,
    State(state): State<AppState>,
    RequestTime(requested_time): RequestTime,
    Path(tour_id): Path<String>,
    ListQuery(spec): ListQuery,
) -> AppResult<Json<Envelope<Vec<Document>>>> {
    list(&state, Some(&tour_id), spec, requested_time).await
}

/// POST /api/v1/reviews
pub async fn create_review(
    RequireCustomer(auth): RequireCustomer,
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> AppResult<(StatusCode, Json<Envelope<Document>>)> {
    create(&state, &auth, None, body).await
}

/// POST /api/v1/tours/{tour_id}/reviews
pub async fn create_tour_review(
    RequireCustomer(auth): RequireCustomer,
    State(state): State<AppState>,
    Path(tour_id): Path<String>,
    JsonBody(body): JsonBody,
) -> AppResult<(StatusCode, Json<Envelope<Document>>)> {
    create(&state, &auth, Some(&tour_id), body).await
}

/// PATCH /api/v1/reviews/{id}
///
/// Only `review` and `rating` can change; a `user` may only edit their own.
pub async fn update_review(
    RequireCustomerOrAdmin(auth): RequireCustomerOrAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> AppResult<Json<Envelope<Document>>> {
    let tour_id = authorize_write(&state, &auth, &id).await?;
    let updated = Resource::<Review>::new(&state).update(&id, body).await?;
    refresh_tour_ratings(&state, &tour_id).await?;
    Ok(Json(Envelope::success(updated)))
}

/// DELETE /api/v1/reviews/{id}
pub async fn delete_review(
    RequireCustomerOrAdmin(auth): RequireCustomerOrAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let tour_id = authorize_write(&state, &auth, &id).await?;
    Resource::<Review>::new(&state).delete(&id).await?;
    refresh_tour_ratings(&state, &tour_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Shared logic
// ---------------------------------------------------------------------------

async fn list(
    state: &AppState,
    tour_id: Option<&str>,
    spec: QuerySpec,
    requested_time: String,
) -> AppResult<Json<Envelope<Vec<Document>>>> {
    let scope = match (Review::PARENT, tour_id) {
        (Some(parent), Some(id)) => vec![Filter::eq(parent.field, id)],
        _ => Vec::new(),
    };
    let reviews = Resource::<Review>::new(state).get_all(scope, spec).await?;
    Ok(Json(Envelope::list(reviews).requested_at(requested_time)))
}

async fn create(
    state: &AppState,
    auth: &AuthUser,
    tour_id: Option<&str>,
    mut body: Document,
) -> AppResult<(StatusCode, Json<Envelope<Document>>)> {
    if let Some(tour_id) = tour_id {
        body.insert("tour".into(), Value::String(tour_id.to_string()));
    }
    body.insert("user".into(), Value::String(auth.user_id.clone()));

    let tour_id = body
        .get("tour")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CoreError::Validation("Review must belong to a tour".into()))?;
    Resource::<Tour>::new(state)
        .find_visible(&tour_id)
        .await?
        .ok_or_else(|| CoreError::not_found(Tour::ENTITY, tour_id.as_str()))?;

    let existing = state
        .store
        .collection(Review::COLLECTION)
        .find_one(&[
            Filter::eq("tour", tour_id.as_str()),
            Filter::eq("user", auth.user_id.as_str()),
        ])
        .await?;
    if existing.is_some() {
        return Err(CoreError::Conflict("You have already reviewed this tour".into()).into());
    }

    let created = Resource::<Review>::new(state).create(body).await?;
    refresh_tour_ratings(state, &tour_id).await?;
    Ok((StatusCode::CREATED, Json(Envelope::success(created))))
}

/// Load the review, enforce ownership for plain users and return its tour.
async fn authorize_write(state: &AppState, auth: &AuthUser, id: &str) -> AppResult<String> {
    let review = state
        .store
        .collection(Review::COLLECTION)
        .find_by_id(id)
        .await?
        .ok_or_else(|| CoreError::not_found(Review::ENTITY, id))?;

    let author = review.get("user").and_then(Value::as_str);
    if auth.role == ROLE_USER && author != Some(auth.user_id.as_str()) {
        return Err(CoreError::Forbidden("You can only change your own reviews".into()).into());
    }
    Ok(review
        .get("tour")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

/// Recompute a tour's rating summary from its reviews.
pub async fn refresh_tour_ratings(state: &AppState, tour_id: &str) -> AppResult<()> {
    let request = RetrievalRequest::new().filter(Filter::eq("tour", tour_id));
    let reviews = state
        .store
        .collection(Review::COLLECTION)
        .find(&request)
        .await?;

    let (quantity, average) = rating_summary(&reviews);
    let mut set = Document::new();
    set.insert("ratingsQuantity".into(), json!(quantity));
    set.insert("ratingsAverage".into(), json!(average));

    let updated = state
        .store
        .collection(Tour::COLLECTION)
        .update_by_id(tour_id, &UpdateSpec::set(set), Tour::validate_document)
        .await?;
    if updated.is_some() {
        tracing::debug!(tour_id, quantity, average, "Tour ratings refreshed");
    }
    Ok(())
}

/// Number of ratings and their mean rounded to one decimal.
fn rating_summary(reviews: &[Document]) -> (u64, f64) {
    let ratings: Vec<f64> = reviews
        .iter()
        .filter_map(|r| r.get("rating").and_then(Value::as_f64))
        .collect();
    if ratings.is_empty() {
        return (0, DEFAULT_RATING);
    }
    let mean = ratings.iter().sum::<f64>() / ratings.len() as f64;
    (ratings.len() as u64, (mean * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: f64) -> Document {
        json!({ "rating": rating }).as_object().cloned().unwrap()
    }

    #[test]
    fn summary_rounds_to_one_decimal() {
        let reviews = vec![review(5.0), review(4.0), review(4.0)];
        assert_eq!(rating_summary(&reviews), (3, 4.3));
    }

    #[test]
    fn no_reviews_falls_back_to_default() {
        assert_eq!(rating_summary(&[]), (0, DEFAULT_RATING));
    }
}
