//! Evaluation of filters, orderings and projections against in-memory
//! documents.
//!
//! The in-memory store executes retrieval requests entirely through this
//! module; the PostgreSQL store renders the same semantics into SQL.

use std::cmp::Ordering;

use serde_json::Value;

use crate::query::{CompareOp, Filter, Projection, RetrievalRequest, SortDirection, SortKey};
use crate::types::{Document, ID_FIELD};

/// Resolve a dotted path (`startLocation.coordinates`) inside a document.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Equality with numeric normalisation (`100` equals `100.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering between two values of the same JSON type; `None` across types.
fn same_type_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Object(_)) => 4,
        Some(Value::Array(_)) => 5,
        Some(Value::Bool(_)) => 6,
    }
}

/// Total order used for sorting. Missing values sort first, then by JSON
/// type (null, numbers, strings, objects, arrays, booleans), then by value.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let by_rank = type_rank(a).cmp(&type_rank(b));
    if by_rank != Ordering::Equal {
        return by_rank;
    }
    match (a, b) {
        (Some(Value::Array(x)), Some(Value::Array(y))) => {
            for (left, right) in x.iter().zip(y) {
                let ord = compare_values(Some(left), Some(right));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Some(Value::Object(x)), Some(Value::Object(y))) => {
            let left = serde_json::to_string(x).unwrap_or_default();
            let right = serde_json::to_string(y).unwrap_or_default();
            left.cmp(&right)
        }
        (Some(x), Some(y)) => same_type_cmp(x, y).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

impl Filter {
    /// Whether `doc` satisfies this condition.
    ///
    /// Equality also matches any element of an array field. Range operators
    /// only match values of the same JSON type. `Ne` matches missing fields.
    pub fn matches(&self, doc: &Document) -> bool {
        let field = lookup(doc, &self.field);
        match self.op {
            CompareOp::Eq => field.is_some_and(|v| self.equals(v)),
            CompareOp::Ne => !field.is_some_and(|v| self.equals(v)),
            op => field
                .and_then(|v| same_type_cmp(v, &self.value))
                .is_some_and(|ord| match op {
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::Gte => ord != Ordering::Less,
                    CompareOp::Lt => ord == Ordering::Less,
                    CompareOp::Lte => ord != Ordering::Greater,
                    CompareOp::Eq | CompareOp::Ne => unreachable!("handled above"),
                }),
        }
    }

    fn equals(&self, field: &Value) -> bool {
        if values_equal(field, &self.value) {
            return true;
        }
        match field {
            Value::Array(items) => items.iter().any(|item| values_equal(item, &self.value)),
            _ => false,
        }
    }
}

/// Stable sort by the given keys; documents that tie keep their relative
/// order.
pub fn sort_documents(docs: &mut [&Document], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for key in keys {
            let ord = compare_values(lookup(a, &key.field), lookup(b, &key.field));
            let ord = match key.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// The top-level key a projection entry refers to.
pub fn top_level(field: &str) -> &str {
    field.split('.').next().unwrap_or(field)
}

impl Projection {
    /// Apply this projection to a document. Projections operate on top-level
    /// keys; `_id` survives an inclusion projection.
    pub fn apply(&self, doc: &Document) -> Document {
        match self {
            Projection::All => doc.clone(),
            Projection::Include(fields) => doc
                .iter()
                .filter(|(key, _)| {
                    key.as_str() == ID_FIELD || fields.iter().any(|f| top_level(f) == key.as_str())
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            Projection::Exclude(fields) => doc
                .iter()
                .filter(|(key, _)| !fields.iter().any(|f| top_level(f) == key.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Execute a retrieval request over documents held in natural order.
pub fn execute<'a>(
    docs: impl IntoIterator<Item = &'a Document>,
    request: &RetrievalRequest,
) -> Vec<Document> {
    let mut matched: Vec<&Document> = docs
        .into_iter()
        .filter(|doc| request.filters.iter().all(|f| f.matches(doc)))
        .collect();
    sort_documents(&mut matched, &request.sort);

    let limit = request
        .limit
        .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
        .unwrap_or(usize::MAX);
    matched
        .into_iter()
        .skip(usize::try_from(request.skip).unwrap_or(usize::MAX))
        .take(limit)
        .map(|doc| request.projection.apply(doc))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    fn tours() -> Vec<Document> {
        vec![
            doc(json!({ "_id": "a", "name": "Forest Hiker", "price": 100, "guides": ["g1", "g2"] })),
            doc(json!({ "_id": "b", "name": "Sea Explorer", "price": 150 })),
            doc(json!({ "_id": "c", "name": "Snow Adventurer", "price": 50, "startLocation": { "address": "Aspen" } })),
            doc(json!({ "_id": "d", "name": "City Wanderer", "price": 150, "__v": 0 })),
        ]
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d["_id"].as_str().unwrap()).collect()
    }

    #[test]
    fn lookup_follows_dotted_paths() {
        let all = tours();
        assert_eq!(lookup(&all[2], "startLocation.address"), Some(&json!("Aspen")));
        assert_eq!(lookup(&all[0], "startLocation.address"), None);
    }

    #[test]
    fn equality_matches_array_elements_and_normalises_numbers() {
        let all = tours();
        assert!(Filter::eq("guides", "g2").matches(&all[0]));
        assert!(!Filter::eq("guides", "g3").matches(&all[0]));
        assert!(Filter::eq("price", 100.0).matches(&all[0]));
    }

    #[test]
    fn ranges_only_match_same_type() {
        let all = tours();
        let gte = Filter::new("price", CompareOp::Gte, 100);
        let matched: Vec<_> = all.iter().filter(|d| gte.matches(d)).collect();
        assert_eq!(matched.len(), 3);
        assert!(!Filter::new("price", CompareOp::Gt, "10").matches(&all[0]));
        assert!(!Filter::new("missing", CompareOp::Lt, 10).matches(&all[0]));
    }

    #[test]
    fn ne_matches_missing_fields() {
        let all = tours();
        let hide_secret = Filter::ne("secretTour", true);
        assert!(all.iter().all(|d| hide_secret.matches(d)));
    }

    #[test]
    fn sort_descending_then_ascending_tiebreak() {
        let all = tours();
        let request = RetrievalRequest::new().sort(vec![SortKey::desc("price"), SortKey::asc("name")]);
        assert_eq!(ids(&execute(&all, &request)), vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn missing_values_sort_first_ascending() {
        let all = tours();
        let request = RetrievalRequest::new().sort(vec![SortKey::asc("guides")]);
        let sorted = execute(&all, &request);
        assert_eq!(ids(&sorted).last(), Some(&"a"));
    }

    #[test]
    fn projection_include_keeps_id() {
        let all = tours();
        let projected = Projection::include(&["name"]).apply(&all[0]);
        assert_eq!(projected.len(), 2);
        assert!(projected.contains_key("_id"));
        assert!(projected.contains_key("name"));
    }

    #[test]
    fn projection_exclude_drops_fields() {
        let all = tours();
        let projected = Projection::default_list().apply(&all[3]);
        assert!(!projected.contains_key("__v"));
        assert_eq!(projected.len(), 3);
    }

    #[test]
    fn execute_paginates_after_filter_and_sort() {
        let all = tours();
        let request = RetrievalRequest::new()
            .filter(Filter::new("price", CompareOp::Gte, 100))
            .sort(vec![SortKey::asc("price"), SortKey::asc("name")])
            .skip(1)
            .limit(1);
        assert_eq!(ids(&execute(&all, &request)), vec!["d"]);

        let beyond = RetrievalRequest::new().skip(10).limit(10);
        assert!(execute(&all, &beyond).is_empty());
    }
}
