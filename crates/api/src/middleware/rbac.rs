//! Role-based access control (RBAC) extractors.
//!
//! Each extractor wraps [`AuthUser`] and rejects requests whose role is not in
//! its allowed set with 403 Forbidden.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use natours_core::error::CoreError;
use natours_core::roles::{ROLE_ADMIN, ROLE_GUIDE, ROLE_LEAD_GUIDE, ROLE_USER};

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Reject `user` unless their role is one of `allowed`.
pub fn restrict_to(user: &AuthUser, allowed: &[&str]) -> Result<(), AppError> {
    if allowed.contains(&user.role.as_str()) {
        return Ok(());
    }
    Err(AppError::Core(CoreError::Forbidden(
        "You do not have permission to perform this action".into(),
    )))
}

/// No access restriction. Fills the guard slot of the generic factory
/// handlers on public routes.
pub struct Public;

impl FromRequestParts<AppState> for Public {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Public)
    }
}

macro_rules! role_guard {
    ($(#[$doc:meta])* $name:ident, [$($role:expr),+ $(,)?]) => {
        $(#[$doc])*
        pub struct $name(pub AuthUser);

        impl FromRequestParts<AppState> for $name {
            type Rejection = AppError;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &AppState,
            ) -> Result<Self, Self::Rejection> {
                let user = AuthUser::from_request_parts(parts, state).await?;
                restrict_to(&user, &[$($role),+])?;
                Ok($name(user))
            }
        }
    };
}

role_guard!(
    /// Requires the `admin` role.
    RequireAdmin,
    [ROLE_ADMIN]
);

role_guard!(
    /// Requires `admin` or `lead-guide`.
    ///
    /// ```ignore
    /// async fn create_tour(RequireLeadGuide(user): RequireLeadGuide) -> AppResult<Json<()>> {
    ///     Ok(Json(()))
    /// }
    /// ```
    RequireLeadGuide,
    [ROLE_ADMIN, ROLE_LEAD_GUIDE]
);

role_guard!(
    /// Requires any staff role: `admin`, `lead-guide` or `guide`.
    RequireStaff,
    [ROLE_ADMIN, ROLE_LEAD_GUIDE, ROLE_GUIDE]
);

role_guard!(
    /// Requires the plain `user` role (customers writing reviews).
    RequireCustomer,
    [ROLE_USER]
);

role_guard!(
    /// Requires `user` or `admin`.
    RequireCustomerOrAdmin,
    [ROLE_USER, ROLE_ADMIN]
);
