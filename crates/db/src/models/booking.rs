use serde::{Deserialize, Serialize};
use validator::Validate;

use natours_core::query::Projection;

use super::{whole_number, Model};
use crate::populate::{Join, Populate};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[validate(required(message = "Booking must belong to a tour"))]
    pub tour: Option<String>,
    #[validate(required(message = "Booking must belong to a user"))]
    pub user: Option<String>,
    #[validate(
        required(message = "Booking must have a price"),
        range(min = 0.0, message = "Price cannot be negative")
    )]
    #[serde(serialize_with = "whole_number")]
    pub price: Option<f64>,
    pub paid: Option<bool>,
}

impl Model for Booking {
    const COLLECTION: &'static str = "bookings";
    const ENTITY: &'static str = "Booking";

    fn populate() -> Vec<Populate> {
        vec![
            Populate {
                path: "user",
                collection: "users",
                join: Join::Local,
                projection: Projection::include(&["name", "email", "photo"]),
                single_only: false,
            },
            Populate {
                path: "tour",
                collection: "tours",
                join: Join::Local,
                projection: Projection::include(&["name", "slug", "imageCover"]),
                single_only: false,
            },
        ]
    }

    fn prepare(&mut self) {
        self.paid.get_or_insert(true);
    }
}
