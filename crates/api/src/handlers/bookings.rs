//! Booking handlers beyond the lead-guide factory CRUD.

use axum::extract::State;
use axum::Json;
use natours_core::query::{Filter, Projection, RetrievalRequest};
use natours_core::types::Document;
use natours_db::models::{Booking, Model, Tour};
use serde_json::Value;

use crate::error::AppResult;
use crate::factory::present;
use crate::middleware::auth::AuthUser;
use crate::middleware::request_time::RequestTime;
use crate::response::Envelope;
use crate::state::AppState;

/// GET /api/v1/bookings/my-tours
///
/// The tours the logged-in user has booked, in booking order. Each tour
/// appears once; hidden tours are left out.
pub async fn my_tours(
    auth: AuthUser,
    State(state): State<AppState>,
    RequestTime(requested_time): RequestTime,
) -> AppResult<Json<Envelope<Vec<Document>>>> {
    let request = RetrievalRequest::new().filter(Filter::eq("user", auth.user_id.as_str()));
    let bookings = state
        .store
        .collection(Booking::COLLECTION)
        .find(&request)
        .await?;

    let mut tour_ids: Vec<String> = Vec::new();
    for id in bookings
        .iter()
        .filter_map(|b| b.get("tour").and_then(Value::as_str))
    {
        if !tour_ids.iter().any(|known| known == id) {
            tour_ids.push(id.to_string());
        }
    }

    let visible = Tour::base_filters();
    let tours: Vec<Document> = state
        .store
        .collection(Tour::COLLECTION)
        .find_by_ids(&tour_ids, &Projection::default_list())
        .await?
        .into_iter()
        .filter(|tour| visible.iter().all(|f| f.matches(tour)))
        .map(present::<Tour>)
        .collect();

    Ok(Json(Envelope::list(tours).requested_at(requested_time)))
}
