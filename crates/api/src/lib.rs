//! HTTP layer of the Natours tour-booking API.

pub mod auth;
pub mod config;
pub mod error;
pub mod factory;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
