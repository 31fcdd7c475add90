//! Route definitions for the `/reviews` resource.

use axum::routing::get;
use axum::Router;
use natours_db::models::Review;

use crate::factory;
use crate::handlers::reviews;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Routes mounted at `/reviews`. Every route requires authentication.
///
/// ```text
/// GET    /        list
/// POST   /        create (role user)
/// GET    /{id}    get
/// PATCH  /{id}    update (own review, or admin)
/// DELETE /{id}    delete (own review, or admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route(
            "/{id}",
            get(factory::get_one::<Review, AuthUser>)
                .patch(reviews::update_review)
                .delete(reviews::delete_review),
        )
}
