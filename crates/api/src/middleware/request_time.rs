//! Stamps each request with its arrival time.
//!
//! List and read handlers echo the stamp as `requestedTime`.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use natours_core::types::format_timestamp;

/// Arrival time of the current request, ISO-8601.
#[derive(Debug, Clone)]
pub struct RequestTime(pub String);

/// Middleware function; use with `axum::middleware::from_fn`.
pub async fn stamp_request_time(mut request: Request, next: Next) -> Response {
    let now = format_timestamp(&Utc::now());
    request.extensions_mut().insert(RequestTime(now));
    next.run(request).await
}

impl<S: Send + Sync> FromRequestParts<S> for RequestTime {
    type Rejection = Infallible;

    /// Falls back to the current time when the middleware is not installed.
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestTime>()
            .cloned()
            .unwrap_or_else(|| RequestTime(format_timestamp(&Utc::now()))))
    }
}
