//! Route definitions for the `/bookings` resource.

use axum::routing::get;
use axum::Router;
use natours_db::models::Booking;

use crate::factory;
use crate::handlers::bookings;
use crate::middleware::rbac::RequireLeadGuide;
use crate::state::AppState;

/// Routes mounted at `/bookings`.
///
/// ```text
/// GET    /my-tours    tours booked by the caller (auth)
/// GET    /            list (lead guide)
/// POST   /            create (lead guide)
/// GET    /{id}        get (lead guide)
/// PATCH  /{id}        update (lead guide)
/// DELETE /{id}        delete (lead guide)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/my-tours", get(bookings::my_tours))
        .route(
            "/",
            get(factory::get_all::<Booking, RequireLeadGuide>)
                .post(factory::create_one::<Booking, RequireLeadGuide>),
        )
        .route(
            "/{id}",
            get(factory::get_one::<Booking, RequireLeadGuide>)
                .patch(factory::update_one::<Booking, RequireLeadGuide>)
                .delete(factory::delete_one::<Booking, RequireLeadGuide>),
        )
}
