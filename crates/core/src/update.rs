//! Partial-update expressions.
//!
//! An [`UpdateSpec`] combines an optional set-mutation on one array field
//! (add-to-set or pull) with a shallow field merge. Storage backends apply the
//! whole expression to a locked document in a single write.

use serde_json::Value;

use crate::error::CoreError;
use crate::types::{Document, RESERVED_FIELDS, VERSION_FIELD};

/// An array field that supports flag-driven add/remove in update bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayField {
    pub field: &'static str,
    /// Body flag requesting add-to-set semantics.
    pub add_flag: &'static str,
    /// Body flag requesting pull semantics.
    pub remove_flag: &'static str,
}

/// Tour guides: `{ "guides": "<id>", "addGuide": true }`.
pub const GUIDES: ArrayField = ArrayField {
    field: "guides",
    add_flag: "addGuide",
    remove_flag: "deleteGuide",
};

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayOp {
    /// Append each value that is not already present.
    AddToSet { field: String, values: Vec<Value> },
    /// Remove every occurrence of each value.
    Pull { field: String, values: Vec<Value> },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSpec {
    /// Top-level fields merged into the document.
    pub set: Document,
    pub array_op: Option<ArrayOp>,
}

impl UpdateSpec {
    /// A plain field merge.
    pub fn set(set: Document) -> Self {
        Self {
            set,
            array_op: None,
        }
    }

    /// Build an update from a request body.
    ///
    /// Store-managed keys and `protected` keys are dropped. When
    /// `array_field` is given, its value is never merged as-is: it only
    /// becomes an add-to-set or pull when the matching flag is truthy, and
    /// is ignored otherwise. Both flags at once is a validation failure.
    pub fn from_body(
        mut body: Document,
        array_field: Option<ArrayField>,
        protected: &[&str],
    ) -> Result<Self, CoreError> {
        for key in RESERVED_FIELDS.iter().chain(protected) {
            body.remove(*key);
        }

        let mut array_op = None;
        if let Some(spec) = array_field {
            let add = body.remove(spec.add_flag).is_some_and(|v| truthy(&v));
            let remove = body.remove(spec.remove_flag).is_some_and(|v| truthy(&v));
            if add && remove {
                return Err(CoreError::Validation(format!(
                    "{} and {} cannot be combined",
                    spec.add_flag, spec.remove_flag
                )));
            }
            let value = body.remove(spec.field);
            if add || remove {
                if let Some(value) = value {
                    let values = match value {
                        Value::Array(items) => items,
                        other => vec![other],
                    };
                    let field = spec.field.to_string();
                    array_op = Some(if add {
                        ArrayOp::AddToSet { field, values }
                    } else {
                        ArrayOp::Pull { field, values }
                    });
                }
            }
        }

        Ok(Self {
            set: body,
            array_op,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.array_op.is_none()
    }

    /// Apply the expression: array mutation first, then the merge, then bump
    /// the version counter.
    pub fn apply(&self, doc: &mut Document) {
        match &self.array_op {
            Some(ArrayOp::AddToSet { field, values }) => {
                let items = array_entry(doc, field);
                for value in values {
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                }
            }
            Some(ArrayOp::Pull { field, values }) => {
                if let Some(Value::Array(items)) = doc.get_mut(field) {
                    items.retain(|item| !values.contains(item));
                }
            }
            None => {}
        }

        for (key, value) in &self.set {
            doc.insert(key.clone(), value.clone());
        }

        let version = doc.get(VERSION_FIELD).and_then(Value::as_i64).unwrap_or(0);
        doc.insert(VERSION_FIELD.to_string(), Value::from(version + 1));
    }
}

/// The array stored under `field`, created (or replaced, if it held a
/// non-array value) on demand.
fn array_entry<'a>(doc: &'a mut Document, field: &str) -> &'a mut Vec<Value> {
    let slot = doc
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => items,
        _ => unreachable!("slot was just made an array"),
    }
}

/// Loose truthiness for body flags: `null`, `false`, `0` and `""` are false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn add_guide_is_idempotent() {
        let mut tour = doc(json!({ "_id": "t1", "guides": ["g1"] }));
        let update = UpdateSpec::from_body(
            doc(json!({ "guides": "g2", "addGuide": true })),
            Some(GUIDES),
            &[],
        )
        .unwrap();
        assert!(update.set.is_empty());

        update.apply(&mut tour);
        update.apply(&mut tour);
        assert_eq!(tour["guides"], json!(["g1", "g2"]));
        assert_eq!(tour["__v"], json!(2));
    }

    #[test]
    fn delete_guide_removes_and_tolerates_absence() {
        let mut tour = doc(json!({ "guides": ["g1", "g2"] }));
        let update = UpdateSpec::from_body(
            doc(json!({ "guides": "g1", "deleteGuide": true })),
            Some(GUIDES),
            &[],
        )
        .unwrap();

        update.apply(&mut tour);
        assert_eq!(tour["guides"], json!(["g2"]));
        update.apply(&mut tour);
        assert_eq!(tour["guides"], json!(["g2"]));
    }

    #[test]
    fn guide_op_combines_with_field_merge() {
        let mut tour = doc(json!({ "price": 100 }));
        let update = UpdateSpec::from_body(
            doc(json!({ "guides": ["g1", "g2"], "addGuide": true, "price": 120 })),
            Some(GUIDES),
            &[],
        )
        .unwrap();
        update.apply(&mut tour);
        assert_eq!(tour["guides"], json!(["g1", "g2"]));
        assert_eq!(tour["price"], json!(120));
    }

    #[test]
    fn both_flags_are_rejected() {
        let result = UpdateSpec::from_body(
            doc(json!({ "guides": "g1", "addGuide": true, "deleteGuide": true })),
            Some(GUIDES),
            &[],
        );
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn guides_without_flags_are_ignored() {
        let mut tour = doc(json!({ "guides": ["g1", "g2"], "price": 100 }));
        let update = UpdateSpec::from_body(
            doc(json!({ "guides": ["zzz"], "price": 400 })),
            Some(GUIDES),
            &[],
        )
        .unwrap();
        assert!(update.array_op.is_none());
        assert!(!update.set.contains_key("guides"));

        update.apply(&mut tour);
        assert_eq!(tour["guides"], json!(["g1", "g2"]));
        assert_eq!(tour["price"], json!(400));
    }

    #[test]
    fn reserved_and_protected_keys_are_dropped() {
        let update = UpdateSpec::from_body(
            doc(json!({ "_id": "x", "__v": 9, "createdAt": "now", "password": "p", "name": "n" })),
            None,
            &["password"],
        )
        .unwrap();
        assert_eq!(update.set, doc(json!({ "name": "n" })));
    }

    #[test]
    fn falsy_flags_do_nothing() {
        let update = UpdateSpec::from_body(
            doc(json!({ "guides": ["g1"], "addGuide": false, "deleteGuide": 0 })),
            Some(GUIDES),
            &[],
        )
        .unwrap();
        assert!(update.array_op.is_none());
        assert!(!update.set.contains_key("addGuide"));
        assert!(!update.set.contains_key("guides"));
    }
}
