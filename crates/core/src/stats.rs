//! Tour aggregations: statistics per difficulty and the monthly start plan.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::types::Document;

/// Only tours rated at least this high count towards difficulty stats.
pub const STATS_MIN_RATING: f64 = 4.5;

/// Maximum number of months returned by the monthly plan.
pub const MONTHLY_PLAN_LIMIT: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyStats {
    /// Upper-cased difficulty (`EASY`, `MEDIUM`, `DIFFICULT`).
    pub difficulty: String,
    pub num_tours: u64,
    pub num_ratings: f64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthPlan {
    /// 1-based month number.
    pub month: u32,
    pub num_tour_starts: u64,
    pub tours: Vec<String>,
}

fn number(doc: &Document, field: &str) -> Option<f64> {
    doc.get(field).and_then(|v| v.as_f64())
}

/// Group highly rated tours by difficulty, cheapest average first.
pub fn tour_stats<'a>(tours: impl IntoIterator<Item = &'a Document>) -> Vec<DifficultyStats> {
    #[derive(Default)]
    struct Acc {
        count: u64,
        ratings: f64,
        rating_sum: f64,
        price_sum: f64,
        min: Option<f64>,
        max: Option<f64>,
    }

    let mut groups: BTreeMap<String, Acc> = BTreeMap::new();
    for tour in tours {
        let rating = number(tour, "ratingsAverage").unwrap_or(0.0);
        if rating < STATS_MIN_RATING {
            continue;
        }
        let difficulty = tour
            .get("difficulty")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_uppercase();
        let price = number(tour, "price").unwrap_or(0.0);

        let acc = groups.entry(difficulty).or_default();
        acc.count += 1;
        acc.ratings += number(tour, "ratingsQuantity").unwrap_or(0.0);
        acc.rating_sum += rating;
        acc.price_sum += price;
        acc.min = Some(acc.min.map_or(price, |m| m.min(price)));
        acc.max = Some(acc.max.map_or(price, |m| m.max(price)));
    }

    let mut stats: Vec<DifficultyStats> = groups
        .into_iter()
        .map(|(difficulty, acc)| {
            let n = acc.count as f64;
            DifficultyStats {
                difficulty,
                num_tours: acc.count,
                num_ratings: acc.ratings,
                avg_rating: acc.rating_sum / n,
                avg_price: acc.price_sum / n,
                min_price: acc.min.unwrap_or(0.0),
                max_price: acc.max.unwrap_or(0.0),
            }
        })
        .collect();
    stats.sort_by(|a, b| a.avg_price.total_cmp(&b.avg_price));
    stats
}

/// Parse a stored start date. Accepts RFC 3339 timestamps as well as the
/// `2021-04-25,10:00` and `2021-04-25` forms found in imported data.
pub fn parse_start_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    for format in ["%Y-%m-%d,%H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts.date());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Count tour starts per month of `year`, busiest month first.
pub fn monthly_plan<'a>(tours: impl IntoIterator<Item = &'a Document>, year: i32) -> Vec<MonthPlan> {
    let mut months: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for tour in tours {
        let name = tour
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let dates = tour
            .get("startDates")
            .and_then(|v| v.as_array())
            .map(|a| a.as_slice())
            .unwrap_or_default();
        for date in dates.iter().filter_map(|d| d.as_str()).filter_map(parse_start_date) {
            if date.year() == year {
                months.entry(date.month()).or_default().push(name.clone());
            }
        }
    }

    let mut plan: Vec<MonthPlan> = months
        .into_iter()
        .map(|(month, tours)| MonthPlan {
            month,
            num_tour_starts: tours.len() as u64,
            tours,
        })
        .collect();
    plan.sort_by(|a, b| b.num_tour_starts.cmp(&a.num_tour_starts));
    plan.truncate(MONTHLY_PLAN_LIMIT);
    plan
}
