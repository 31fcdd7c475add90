//! Request middleware and guard extractors.
//!
//! - [`auth::AuthUser`] -- the authenticated user (Bearer token or `jwt` cookie).
//! - [`rbac`] -- role guards (`RequireAdmin`, `RequireLeadGuide`, `RequireStaff`, ...).
//! - [`request_time`] -- arrival timestamp echoed as `requestedTime`.
//! - [`error_detail`] -- error text in response bodies outside production.

pub mod auth;
pub mod error_detail;
pub mod rbac;
pub mod request_time;
