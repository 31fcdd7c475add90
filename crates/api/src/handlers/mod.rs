//! Request handlers, one module per resource. Plain CRUD is served by the
//! generic handlers in [`crate::factory`]; these modules hold the rest.

pub mod auth;
pub mod bookings;
pub mod reviews;
pub mod tours;
pub mod users;

use axum::http::Uri;
use natours_core::error::CoreError;

use crate::error::AppError;

/// Fallback for every unmatched route.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::Core(CoreError::Operational {
        status: 404,
        message: format!("Can't find {uri} on this server!"),
    })
}
