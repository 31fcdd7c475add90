//! Entity schemas.
//!
//! A model is a serde struct whose fields are all optional on the wire, with
//! `validator` rules describing what a stored document must satisfy. The
//! [`Model`] trait adds the collection-level behaviour the resource factory
//! relies on: hidden and protected fields, parent scoping, base filters,
//! population and cascades.

pub mod booking;
pub mod review;
pub mod tour;
pub mod user;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;
use validator::{Validate, ValidationErrors};

use natours_core::error::CoreError;
use natours_core::query::Filter;
use natours_core::types::{Document, RESERVED_FIELDS};
use natours_core::update::ArrayField;

use crate::populate::Populate;

pub use booking::Booking;
pub use review::Review;
pub use tour::{GeoPoint, Tour};
pub use user::User;

/// Scopes a nested resource to its parent: the reviews of
/// `/tours/{id}/reviews` are those whose `tour` field equals the path id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentScope {
    /// Field holding the parent's id.
    pub field: &'static str,
}

/// Documents of another collection that go when their parent is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cascade {
    pub collection: &'static str,
    /// Field in `collection` holding the parent's id.
    pub field: &'static str,
}

pub trait Model: Serialize + DeserializeOwned + Validate + Send + Sync + 'static {
    const COLLECTION: &'static str;

    /// Entity name used in error messages.
    const ENTITY: &'static str;

    /// Never serialized to clients.
    const HIDDEN_FIELDS: &'static [&'static str] = &[];

    /// Never written by the generic update operation.
    const PROTECTED_FIELDS: &'static [&'static str] = &[];

    const PARENT: Option<ParentScope> = None;

    /// Array field with flag-driven add/remove on update.
    const ARRAY_FIELD: Option<ArrayField> = None;

    const CASCADE: &'static [Cascade] = &[];

    /// Filters applied to every read of the collection.
    fn base_filters() -> Vec<Filter> {
        Vec::new()
    }

    fn populate() -> Vec<Populate> {
        Vec::new()
    }

    /// Create-time hook: defaults and derived fields. Runs after validation.
    fn prepare(&mut self) {}

    /// Computed fields added to every client response. Never stored.
    fn decorate(_doc: &mut Document) {}

    fn from_document(doc: &Document) -> Result<Self, CoreError> {
        serde_json::from_value(Value::Object(doc.clone()))
            .map_err(|e| CoreError::Validation(format!("Invalid input data. {e}")))
    }

    /// Serialize, dropping unset fields.
    fn to_document(&self) -> Result<Document, CoreError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => {
                map.retain(|_, v| !v.is_null());
                Ok(map)
            }
            Ok(other) => Err(CoreError::Internal(format!(
                "{} serialized to a non-object: {other}",
                Self::ENTITY
            ))),
            Err(e) => Err(CoreError::Internal(e.to_string())),
        }
    }

    fn check(&self) -> Result<(), CoreError> {
        self.validate().map_err(validation_error)
    }

    /// Validate a whole stored document and drop fields the schema does not
    /// know. Store-managed fields pass through untouched.
    fn validate_document(doc: Document) -> Result<Document, CoreError> {
        let model = Self::from_document(&doc)?;
        model.check()?;
        let mut normalized = model.to_document()?;
        for key in RESERVED_FIELDS {
            if let Some(value) = doc.get(*key) {
                normalized.insert(key.to_string(), value.clone());
            }
        }
        Ok(normalized)
    }
}

/// Static facts about a collection, for code that only knows its name.
#[derive(Clone, Copy)]
pub struct ModelInfo {
    pub collection: &'static str,
    pub hidden: &'static [&'static str],
    pub base_filters: fn() -> Vec<Filter>,
    pub populate: fn() -> Vec<Populate>,
}

impl ModelInfo {
    pub fn of<M: Model>() -> Self {
        Self {
            collection: M::COLLECTION,
            hidden: M::HIDDEN_FIELDS,
            base_filters: M::base_filters,
            populate: M::populate,
        }
    }
}

/// Look up a collection's model facts by name.
pub fn info_for(collection: &str) -> Option<ModelInfo> {
    [
        ModelInfo::of::<Tour>(),
        ModelInfo::of::<User>(),
        ModelInfo::of::<Review>(),
        ModelInfo::of::<Booking>(),
    ]
    .into_iter()
    .find(|info| info.collection == collection)
}

/// Serialize a whole-valued number as an integer, so `397` round-trips as
/// `397` rather than `397.0`.
pub(crate) fn whole_number<S: Serializer>(
    value: &Option<f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < 9_007_199_254_740_992.0 => {
            serializer.serialize_i64(*v as i64)
        }
        Some(v) => serializer.serialize_f64(*v),
        None => serializer.serialize_none(),
    }
}

/// Remove `hidden` fields from a document in place.
pub fn strip_hidden(doc: &mut Document, hidden: &[&str]) {
    for field in hidden {
        doc.remove(*field);
    }
}

/// Flatten validator output into one client-facing message, fields in name
/// order.
pub fn validation_error(errors: ValidationErrors) -> CoreError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let messages: Vec<String> = fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |err| match &err.message {
                Some(message) => message.to_string(),
                None => format!("Invalid value for {field}"),
            })
        })
        .collect();
    CoreError::Validation(format!("Invalid input data. {}", messages.join(". ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn validate_document_drops_unknown_fields_and_keeps_reserved() {
        let stored = doc(json!({
            "_id": "r1",
            "__v": 3,
            "createdAt": "2024-01-01T00:00:00.000Z",
            "review": "Loved it",
            "rating": 5,
            "tour": "t1",
            "user": "u1",
            "bogus": true
        }));
        let normalized = Review::validate_document(stored).unwrap();
        assert!(!normalized.contains_key("bogus"));
        assert_eq!(normalized["__v"], json!(3));
        assert_eq!(normalized["_id"], json!("r1"));
    }

    #[test]
    fn validation_messages_are_collected() {
        let err = Review::validate_document(doc(json!({ "rating": 9 }))).unwrap_err();
        assert_matches!(&err, CoreError::Validation(msg) if msg.contains("Rating must be between 1 and 5"));
        assert_matches!(&err, CoreError::Validation(msg) if msg.contains("Review can not be empty"));
    }

    #[test]
    fn wrong_types_are_validation_errors() {
        let err = Tour::from_document(&doc(json!({ "duration": "five" }))).unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[test]
    fn whole_numbers_keep_integer_form() {
        let normalized = Review::validate_document(doc(json!({
            "review": "Fine",
            "rating": 4,
            "tour": "t1",
            "user": "u1"
        })))
        .unwrap();
        assert_eq!(normalized["rating"], json!(4));
        assert!(normalized["rating"].is_i64());

        let normalized = Review::validate_document(doc(json!({
            "review": "Fine",
            "rating": 4.5,
            "tour": "t1",
            "user": "u1"
        })))
        .unwrap();
        assert_eq!(normalized["rating"], json!(4.5));
    }

    #[test]
    fn registry_knows_every_collection() {
        for name in ["tours", "users", "reviews", "bookings"] {
            assert!(info_for(name).is_some(), "{name}");
        }
        assert!(info_for("sessions").is_none());
        assert!(info_for("users").unwrap().hidden.contains(&"password"));
    }
}
