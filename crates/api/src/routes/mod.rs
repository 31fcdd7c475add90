pub mod bookings;
pub mod health;
pub mod reviews;
pub mod tours;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /tours                      tours, stats, geo queries, nested reviews
/// /users                      auth, self-service, admin user management
/// /reviews                    reviews (auth required)
/// /bookings                   bookings (lead guide), my-tours (auth)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/tours", tours::router())
        .nest("/users", users::router())
        .nest("/reviews", reviews::router())
        .nest("/bookings", bookings::router())
}
