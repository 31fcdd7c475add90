//! Request extractors shared by handler modules.

use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use natours_core::error::CoreError;
use natours_core::query::QuerySpec;
use natours_core::types::Document;
use serde_json::Value;

use crate::error::AppError;

/// The raw query string of a list request, parsed into a [`QuerySpec`].
///
/// `?price[gte]=100&sort=-price,name&fields=name,price&page=2&limit=5`
#[derive(Debug, Clone, Default)]
pub struct ListQuery(pub QuerySpec);

impl<S: Send + Sync> FromRequestParts<S> for ListQuery {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(ListQuery(QuerySpec::from_pairs(pairs)?))
    }
}

/// A JSON object request body.
///
/// Rejections (wrong content type, malformed JSON, non-object bodies) become
/// JSON error responses like every other failure.
#[derive(Debug, Clone, Default)]
pub struct JsonBody(pub Document);

impl<S: Send + Sync> FromRequest<S> for JsonBody {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        match value {
            Value::Object(map) => Ok(JsonBody(map)),
            _ => Err(AppError::Core(CoreError::Validation(
                "Request body must be a JSON object".into(),
            ))),
        }
    }
}

impl JsonBody {
    /// A string field of the body, if present and non-empty.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}
