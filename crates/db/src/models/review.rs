use serde::{Deserialize, Serialize};
use validator::Validate;

use natours_core::query::Projection;

use super::{whole_number, Model, ParentScope};
use crate::populate::{Join, Populate};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[validate(
        required(message = "Review can not be empty"),
        length(min = 1, message = "Review can not be empty")
    )]
    pub review: Option<String>,
    #[validate(
        required(message = "A review must have a rating"),
        range(min = 1.0, max = 5.0, message = "Rating must be between 1 and 5")
    )]
    #[serde(serialize_with = "whole_number")]
    pub rating: Option<f64>,
    #[validate(required(message = "Review must belong to a tour"))]
    pub tour: Option<String>,
    #[validate(required(message = "Review must belong to a user"))]
    pub user: Option<String>,
}

impl Model for Review {
    const COLLECTION: &'static str = "reviews";
    const ENTITY: &'static str = "Review";
    const PROTECTED_FIELDS: &'static [&'static str] = &["tour", "user"];
    const PARENT: Option<ParentScope> = Some(ParentScope { field: "tour" });

    fn populate() -> Vec<Populate> {
        vec![Populate {
            path: "user",
            collection: "users",
            join: Join::Local,
            projection: Projection::include(&["name", "photo"]),
            single_only: false,
        }]
    }
}
