//! Route definitions for the `/tours` resource.

use axum::routing::get;
use axum::Router;
use natours_db::models::Tour;

use crate::factory;
use crate::handlers::{reviews, tours};
use crate::middleware::rbac::{Public, RequireLeadGuide};
use crate::state::AppState;

/// Routes mounted at `/tours`.
///
/// ```text
/// GET    /                                               list (public)
/// POST   /                                               create (lead guide)
/// GET    /top-5-cheap                                    best rated, cheapest first
/// GET    /tour-stats                                     per-difficulty statistics
/// GET    /tour-state                                     same, legacy path
/// GET    /monthly-plan/{year}                            tour starts per month (staff)
/// GET    /tours-within/{distance}/center/{latlng}/unit/{unit}
/// GET    /tour-within/{distance}/center/{latlng}/unit/{unit}   same, legacy path
/// GET    /distances/{latlng}/unit/{unit}
/// GET    /{id}                                           get (public)
/// PATCH  /{id}                                           update, addGuide/deleteGuide (lead guide)
/// DELETE /{id}                                           delete with reviews and bookings (lead guide)
/// GET    /{id}/reviews                                   reviews of the tour (auth)
/// POST   /{id}/reviews                                   review the tour (role user)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(factory::get_all::<Tour, Public>).post(factory::create_one::<Tour, RequireLeadGuide>),
        )
        .route("/top-5-cheap", get(tours::top_5_cheap))
        .route("/tour-stats", get(tours::tour_stats))
        .route("/tour-state", get(tours::tour_stats))
        .route("/monthly-plan/{year}", get(tours::monthly_plan))
        .route(
            "/tours-within/{distance}/center/{latlng}/unit/{unit}",
            get(tours::tours_within),
        )
        .route(
            "/tour-within/{distance}/center/{latlng}/unit/{unit}",
            get(tours::tours_within),
        )
        .route("/distances/{latlng}/unit/{unit}", get(tours::distances))
        .route(
            "/{id}",
            get(factory::get_one::<Tour, Public>)
                .patch(factory::update_one::<Tour, RequireLeadGuide>)
                .delete(factory::delete_one::<Tour, RequireLeadGuide>),
        )
        .route(
            "/{id}/reviews",
            get(reviews::list_tour_reviews).post(reviews::create_tour_review),
        )
}
