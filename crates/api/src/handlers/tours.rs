//! Tour handlers beyond the generic factory: the top-5 alias, aggregations
//! and geo queries.

use axum::extract::{Path, State};
use axum::Json;
use natours_core::error::CoreError;
use natours_core::geo::{self, DistanceUnit, LatLng};
use natours_core::query::{Projection, RetrievalRequest, SortKey};
use natours_core::stats::{self, DifficultyStats, MonthPlan};
use natours_core::types::{Document, ID_FIELD};
use natours_db::models::{Model, Tour};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::factory::{present, Resource};
use crate::middleware::rbac::RequireStaff;
use crate::middleware::request_time::RequestTime;
use crate::query::ListQuery;
use crate::response::Envelope;
use crate::state::AppState;

/// Location field used by the geo endpoints.
const START_LOCATION: &str = "startLocation";

/// GET /api/v1/tours/top-5-cheap
///
/// The five best rated tours, cheapest first among equals. Filters from the
/// query string still apply; sort, fields and limit are fixed.
pub async fn top_5_cheap(
    State(state): State<AppState>,
    RequestTime(requested_time): RequestTime,
    ListQuery(mut spec): ListQuery,
) -> AppResult<Json<Envelope<Vec<Document>>>> {
    spec.pagination.limit = 5;
    spec.sort = Some(SortKey::parse_list("-ratingsAverage,price"));
    spec.projection = Some(Projection::include(&[
        "name",
        "price",
        "ratingsAverage",
        "summary",
        "difficulty",
    ]));

    let tours = Resource::<Tour>::new(&state).get_all(Vec::new(), spec).await?;
    Ok(Json(Envelope::list(tours).requested_at(requested_time)))
}

/// GET /api/v1/tours/tour-stats
pub async fn tour_stats(
    State(state): State<AppState>,
    RequestTime(requested_time): RequestTime,
) -> AppResult<Json<Envelope<Vec<DifficultyStats>>>> {
    let tours = visible_tours(&state).await?;
    let stats = stats::tour_stats(&tours);
    Ok(Json(Envelope::list(stats).requested_at(requested_time)))
}

/// GET /api/v1/tours/monthly-plan/{year}
pub async fn monthly_plan(
    _staff: RequireStaff,
    State(state): State<AppState>,
    RequestTime(requested_time): RequestTime,
    Path(year): Path<String>,
) -> AppResult<Json<Envelope<Vec<MonthPlan>>>> {
    let year: i32 = year
        .trim()
        .parse()
        .map_err(|_| CoreError::Validation(format!("Invalid year: {year}")))?;

    let tours = visible_tours(&state).await?;
    let plan = stats::monthly_plan(&tours, year);
    Ok(Json(Envelope::list(plan).requested_at(requested_time)))
}

/// GET /api/v1/tours/tours-within/{distance}/center/{latlng}/unit/{unit}
///
/// Tours whose start location lies within `distance` of `latlng`.
pub async fn tours_within(
    State(state): State<AppState>,
    RequestTime(requested_time): RequestTime,
    Path((distance, latlng, unit)): Path<(String, String, String)>,
) -> AppResult<Json<Envelope<Vec<Document>>>> {
    let center: LatLng = latlng.parse()?;
    let unit: DistanceUnit = unit.parse()?;
    let radius: f64 = distance
        .parse()
        .ok()
        .filter(|d: &f64| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| CoreError::Validation(format!("Invalid distance: {distance}")))?;

    let tours = visible_tours(&state).await?;
    let found: Vec<Document> = geo::within(&tours, START_LOCATION, center, radius, unit)
        .into_iter()
        .cloned()
        .map(present::<Tour>)
        .collect();
    Ok(Json(Envelope::list(found).requested_at(requested_time)))
}

/// GET /api/v1/tours/distances/{latlng}/unit/{unit}
///
/// Every tour with a start location and its distance from `latlng`, nearest
/// first. Each entry carries only `_id`, `name` and `distance`.
pub async fn distances(
    State(state): State<AppState>,
    RequestTime(requested_time): RequestTime,
    Path((latlng, unit)): Path<(String, String)>,
) -> AppResult<Json<Envelope<Vec<Value>>>> {
    let center: LatLng = latlng.parse()?;
    let unit: DistanceUnit = unit.parse()?;

    let tours = visible_tours(&state).await?;
    let measured = geo::distances(&tours, START_LOCATION, center, unit)
        .into_iter()
        .map(|(distance, tour)| {
            json!({
                "_id": tour.get(ID_FIELD),
                "name": tour.get("name"),
                "distance": distance,
            })
        })
        .collect();
    Ok(Json(Envelope::list(measured).requested_at(requested_time)))
}

/// Every tour the base filters let through, unshaped. Aggregations and geo
/// math run in process over this set.
async fn visible_tours(state: &AppState) -> AppResult<Vec<Document>> {
    let request = RetrievalRequest::new().filters(Tour::base_filters());
    let tours = state
        .store
        .collection(Tour::COLLECTION)
        .find(&request)
        .await?;
    tracing::debug!(count = tours.len(), "Loaded tours for in-process aggregation");
    Ok(tours)
}
