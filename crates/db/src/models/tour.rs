use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

use natours_core::query::{Filter, Projection};
use natours_core::slug::slugify;
use natours_core::stats::parse_start_date;
use natours_core::types::Document;
use natours_core::update::{ArrayField, GUIDES};

use super::{whole_number, Cascade, Model};
use crate::populate::{Join, Populate};

pub const DIFFICULTIES: &[&str] = &["easy", "medium", "difficult"];

pub const DEFAULT_RATING: f64 = 4.5;

/// A GeoJSON point, `coordinates` in `[lng, lat]` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type", default = "point_type")]
    pub kind: String,
    pub coordinates: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<i64>,
}

fn point_type() -> String {
    "Point".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_price_discount"))]
pub struct Tour {
    #[validate(
        required(message = "A tour must have a name"),
        length(
            min = 10,
            max = 40,
            message = "A tour name must have between 10 and 40 characters"
        )
    )]
    pub name: Option<String>,
    pub slug: Option<String>,
    #[validate(
        required(message = "A tour must have a duration"),
        range(min = 1, message = "A tour must last at least one day")
    )]
    pub duration: Option<i64>,
    #[validate(
        required(message = "A tour must have a group size"),
        range(min = 1, message = "A group must have at least one person")
    )]
    pub max_group_size: Option<i64>,
    #[validate(
        required(message = "A tour must have a difficulty"),
        custom(function = "validate_difficulty")
    )]
    pub difficulty: Option<String>,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    #[serde(serialize_with = "whole_number")]
    pub ratings_average: Option<f64>,
    #[validate(range(min = 0, message = "Ratings quantity cannot be negative"))]
    pub ratings_quantity: Option<i64>,
    #[validate(
        required(message = "A tour must have a price"),
        range(min = 0.0, message = "Price cannot be negative")
    )]
    #[serde(serialize_with = "whole_number")]
    pub price: Option<f64>,
    #[serde(serialize_with = "whole_number")]
    pub price_discount: Option<f64>,
    #[validate(required(message = "A tour must have a summary"))]
    pub summary: Option<String>,
    pub description: Option<String>,
    #[validate(required(message = "A tour must have a cover image"))]
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    #[validate(custom(function = "validate_start_dates"))]
    pub start_dates: Option<Vec<String>>,
    pub secret_tour: Option<bool>,
    pub start_location: Option<GeoPoint>,
    pub locations: Option<Vec<GeoPoint>>,
    pub guides: Option<Vec<String>>,
}

fn validate_difficulty(difficulty: &str) -> Result<(), ValidationError> {
    if DIFFICULTIES.contains(&difficulty) {
        return Ok(());
    }
    Err(ValidationError::new("difficulty")
        .with_message("Difficulty is either: easy, medium, difficult".into()))
}

fn validate_start_dates(dates: &[String]) -> Result<(), ValidationError> {
    if dates.iter().all(|d| parse_start_date(d).is_some()) {
        return Ok(());
    }
    Err(ValidationError::new("start_dates").with_message("Start dates must be valid dates".into()))
}

fn validate_price_discount(tour: &Tour) -> Result<(), ValidationError> {
    match (tour.price_discount, tour.price) {
        (Some(discount), Some(price)) if discount >= price => Err(ValidationError::new(
            "price_discount",
        )
        .with_message(format!("Discount price ({discount}) should be below regular price").into())),
        _ => Ok(()),
    }
}

impl Model for Tour {
    const COLLECTION: &'static str = "tours";
    const ENTITY: &'static str = "Tour";
    const HIDDEN_FIELDS: &'static [&'static str] = &["createdAt"];
    const PROTECTED_FIELDS: &'static [&'static str] = &["slug"];
    const ARRAY_FIELD: Option<ArrayField> = Some(GUIDES);
    const CASCADE: &'static [Cascade] = &[
        Cascade {
            collection: "reviews",
            field: "tour",
        },
        Cascade {
            collection: "bookings",
            field: "tour",
        },
    ];

    /// Secret tours never show up in reads.
    fn base_filters() -> Vec<Filter> {
        vec![Filter::ne("secretTour", true)]
    }

    fn populate() -> Vec<Populate> {
        vec![
            Populate {
                path: "guides",
                collection: "users",
                join: Join::Local,
                projection: Projection::exclude(&["__v", "passwordChangedAt"]),
                single_only: false,
            },
            Populate {
                path: "reviews",
                collection: "reviews",
                join: Join::Foreign("tour"),
                projection: Projection::default_list(),
                single_only: true,
            },
        ]
    }

    /// `durationWeak`: the duration in weeks.
    fn decorate(doc: &mut Document) {
        if let Some(days) = doc.get("duration").and_then(Value::as_f64) {
            doc.insert("durationWeak".to_string(), Value::from(days / 7.0));
        }
    }

    fn prepare(&mut self) {
        if let Some(name) = &mut self.name {
            *name = name.trim().to_string();
            self.slug = Some(slugify(name));
        }
        if let Some(summary) = &mut self.summary {
            *summary = summary.trim().to_string();
        }
        self.ratings_average.get_or_insert(DEFAULT_RATING);
        self.ratings_quantity.get_or_insert(0);
        self.secret_tour.get_or_insert(false);
        self.guides.get_or_insert_with(Vec::new);
    }
}
