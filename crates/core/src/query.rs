//! Query shaping for list endpoints.
//!
//! A raw query string is parsed once into an immutable [`QuerySpec`]. A
//! [`QueryShaper`] then refines a [`RetrievalRequest`] in four stages:
//! filter, sort, field projection and pagination. The request is a plain
//! value passed by ownership through each stage; storage backends execute it.
//!
//! ```text
//! ?price[gte]=100&difficulty=easy&sort=-price,name&fields=name,price&page=2&limit=5
//! ```

use serde_json::Value;

use crate::error::CoreError;
use crate::types::{CREATED_AT_FIELD, VERSION_FIELD};

/// Query keys that control shaping and never become filters.
pub const RESERVED_KEYS: &[&str] = &["fields", "limit", "page", "sort"];

/// Page used when `page` is missing or unusable.
pub const DEFAULT_PAGE: u64 = 1;

/// Page size used when `limit` is missing or unusable.
pub const DEFAULT_LIMIT: u64 = 10;

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Comparison operator of a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    /// Not reachable from a query string; used by model base filters.
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    /// Parse the operator inside `field[op]`. Only range operators are
    /// recognised.
    pub fn from_bracket(op: &str) -> Option<Self> {
        match op {
            "gt" => Some(CompareOp::Gt),
            "gte" => Some(CompareOp::Gte),
            "lt" => Some(CompareOp::Lt),
            "lte" => Some(CompareOp::Lte),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
        }
    }
}

/// A single `(field, operator, value)` condition. Filters on a request are
/// combined with logical AND.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Field name, possibly a dotted path (`startLocation.address`).
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, CompareOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, CompareOp::Ne, value)
    }
}

// ---------------------------------------------------------------------------
// Sorting and projection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Parse `-price,name` into ordered sort keys. A leading `-` means
    /// descending. Commas and whitespace both separate keys.
    pub fn parse_list(raw: &str) -> Vec<SortKey> {
        split_list(raw)
            .map(|item| match item.strip_prefix('-') {
                Some(field) => SortKey::desc(field),
                None => SortKey::asc(item),
            })
            .filter(|key| !key.field.is_empty())
            .collect()
    }
}

/// Top-level field selection applied to each returned document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    /// Every field.
    #[default]
    All,
    /// Only the listed fields (plus `_id`).
    Include(Vec<String>),
    /// Every field except the listed ones.
    Exclude(Vec<String>),
}

impl Projection {
    /// Projection used when a list request does not ask for specific fields.
    pub fn default_list() -> Self {
        Projection::Exclude(vec![VERSION_FIELD.to_string()])
    }

    pub fn exclude(fields: &[&str]) -> Self {
        Projection::Exclude(fields.iter().map(|f| f.to_string()).collect())
    }

    pub fn include(fields: &[&str]) -> Self {
        Projection::Include(fields.iter().map(|f| f.to_string()).collect())
    }

    /// Parse `name,price` (inclusion) or `-summary,-images` (exclusion).
    /// Mixing both forms is rejected.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for item in split_list(raw) {
            match item.strip_prefix('-') {
                Some("") => {}
                Some(field) => exclude.push(field.to_string()),
                None => include.push(item.to_string()),
            }
        }

        match (include.is_empty(), exclude.is_empty()) {
            (true, true) => Ok(Projection::default_list()),
            (false, true) => Ok(Projection::Include(include)),
            (true, false) => Ok(Projection::Exclude(exclude)),
            (false, false) => Err(CoreError::Validation(
                "Projection cannot have a mix of inclusion and exclusion".into(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    /// Coerce raw `page` / `limit` values. Anything that is not a positive
    /// integer falls back to the default.
    pub fn from_raw(page: Option<&str>, limit: Option<&str>) -> Self {
        Self {
            page: positive_or(page, DEFAULT_PAGE),
            limit: positive_or(limit, DEFAULT_LIMIT),
        }
    }

    /// Number of documents to skip before the requested page.
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

fn positive_or(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v >= 1)
        .map(|v| v as u64)
        .unwrap_or(default)
}

// ---------------------------------------------------------------------------
// Query specification
// ---------------------------------------------------------------------------

/// Client-requested shaping of a result set, parsed from query parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    pub filters: Vec<Filter>,
    pub sort: Option<Vec<SortKey>>,
    pub projection: Option<Projection>,
    pub pagination: Pagination,
}

impl QuerySpec {
    /// Parse decoded query-string pairs.
    ///
    /// - `sort`, `fields`, `page`, `limit` control shaping.
    /// - `field[gt|gte|lt|lte]=v` becomes a range comparison.
    /// - `field[other]=v` becomes an equality on the mapping `{other: v}`.
    /// - `field=v` becomes an equality.
    ///
    /// When a key is repeated the last value wins.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut entries: Vec<(String, String)> = Vec::new();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match entries.iter_mut().find(|(k, _)| k == key) {
                Some(existing) => existing.1 = value.to_string(),
                None => entries.push((key.to_string(), value.to_string())),
            }
        }

        let lookup = |name: &str| {
            entries
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };

        let sort = lookup("sort")
            .map(SortKey::parse_list)
            .filter(|keys| !keys.is_empty());
        let projection = lookup("fields").map(Projection::parse).transpose()?;
        let pagination = Pagination::from_raw(lookup("page"), lookup("limit"));

        let filters = entries
            .iter()
            .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
            .map(|(k, v)| parse_filter(k, v))
            .collect();

        Ok(Self {
            filters,
            sort,
            projection,
            pagination,
        })
    }
}

fn parse_filter(key: &str, raw: &str) -> Filter {
    let value = coerce_scalar(raw);
    match split_bracket(key) {
        Some((field, op)) => match CompareOp::from_bracket(op) {
            Some(op) => Filter::new(field, op, value),
            None => {
                let mut nested = serde_json::Map::new();
                nested.insert(op.to_string(), value);
                Filter::eq(field, Value::Object(nested))
            }
        },
        None => Filter::eq(key, value),
    }
}

/// Split `price[gte]` into `("price", "gte")`.
fn split_bracket(key: &str) -> Option<(&str, &str)> {
    let inner = key.strip_suffix(']')?;
    let (field, op) = inner.split_once('[')?;
    if field.is_empty() || op.is_empty() {
        return None;
    }
    Some((field, op))
}

/// Interpret a query-string value: integers and decimals become numbers,
/// `true`/`false` become booleans, everything else stays a string.
pub fn coerce_scalar(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        if let Some(number) = serde_json::Number::from_f64(float) {
            return Value::Number(number);
        }
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Retrieval request
// ---------------------------------------------------------------------------

/// A not-yet-executed storage query. Each modifier consumes and returns the
/// request so modifiers chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalRequest {
    pub filters: Vec<Filter>,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl RetrievalRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// Replace the ordering.
    pub fn sort(mut self, keys: Vec<SortKey>) -> Self {
        self.sort = keys;
        self
    }

    pub fn select(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

// ---------------------------------------------------------------------------
// Query shaper
// ---------------------------------------------------------------------------

/// Applies a [`QuerySpec`] to a [`RetrievalRequest`], one stage at a time.
///
/// Stages are meant to run in the order filter, sort, limit_fields, paginate:
///
/// ```
/// use natours_core::query::{QueryShaper, QuerySpec, RetrievalRequest};
///
/// let spec = QuerySpec::from_pairs([("price[gte]", "100"), ("page", "2")]).unwrap();
/// let request = QueryShaper::new(RetrievalRequest::new(), spec)
///     .filter()
///     .sort()
///     .limit_fields()
///     .paginate()
///     .into_request();
/// assert_eq!(request.skip, 10);
/// ```
#[derive(Debug)]
pub struct QueryShaper {
    request: RetrievalRequest,
    spec: QuerySpec,
}

impl QueryShaper {
    pub fn new(request: RetrievalRequest, spec: QuerySpec) -> Self {
        Self { request, spec }
    }

    /// AND the requested filters onto whatever the request already holds.
    pub fn filter(mut self) -> Self {
        let filters = std::mem::take(&mut self.spec.filters);
        self.request = self.request.filters(filters);
        self
    }

    /// Requested ordering, or newest first.
    pub fn sort(mut self) -> Self {
        let keys = self
            .spec
            .sort
            .take()
            .unwrap_or_else(|| vec![SortKey::desc(CREATED_AT_FIELD)]);
        self.request = self.request.sort(keys);
        self
    }

    /// Requested projection, or everything except the version field.
    pub fn limit_fields(mut self) -> Self {
        let projection = self
            .spec
            .projection
            .take()
            .unwrap_or_else(Projection::default_list);
        self.request = self.request.select(projection);
        self
    }

    pub fn paginate(mut self) -> Self {
        let page = self.spec.pagination;
        self.request = self.request.skip(page.skip()).limit(page.limit);
        self
    }

    pub fn into_request(self) -> RetrievalRequest {
        self.request
    }

    /// Run all four stages in order.
    pub fn shape(request: RetrievalRequest, spec: QuerySpec) -> RetrievalRequest {
        Self::new(request, spec)
            .filter()
            .sort()
            .limit_fields()
            .paginate()
            .into_request()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn spec(pairs: &[(&str, &str)]) -> QuerySpec {
        QuerySpec::from_pairs(pairs.iter().copied()).expect("query should parse")
    }

    #[test]
    fn reserved_keys_never_filter() {
        let parsed = spec(&[
            ("sort", "price"),
            ("fields", "name"),
            ("page", "2"),
            ("limit", "3"),
            ("difficulty", "easy"),
        ]);
        assert_eq!(parsed.filters, vec![Filter::eq("difficulty", "easy")]);
    }

    #[test]
    fn bracket_operators_become_comparisons() {
        let parsed = spec(&[("price[gte]", "100"), ("duration[lt]", "7.5")]);
        assert_eq!(
            parsed.filters,
            vec![
                Filter::new("price", CompareOp::Gte, 100),
                Filter::new("duration", CompareOp::Lt, 7.5),
            ]
        );
    }

    #[test]
    fn unknown_bracket_operator_is_nested_equality() {
        let parsed = spec(&[("price[regex]", "abc")]);
        assert_eq!(
            parsed.filters,
            vec![Filter::eq("price", json!({ "regex": "abc" }))]
        );
    }

    #[test]
    fn last_value_wins_for_repeated_keys() {
        let parsed = spec(&[("duration", "5"), ("sort", "price"), ("duration", "9"), ("sort", "-name")]);
        assert_eq!(parsed.filters, vec![Filter::eq("duration", 9)]);
        assert_eq!(parsed.sort, Some(vec![SortKey::desc("name")]));
    }

    #[test]
    fn scalars_are_coerced() {
        assert_eq!(coerce_scalar("42"), json!(42));
        assert_eq!(coerce_scalar("4.5"), json!(4.5));
        assert_eq!(coerce_scalar("true"), json!(true));
        assert_eq!(coerce_scalar("easy"), json!("easy"));
        assert_eq!(coerce_scalar("NaN"), json!("NaN"));
        assert_eq!(coerce_scalar("5c88fa8cf4afda39709c2955"), json!("5c88fa8cf4afda39709c2955"));
    }

    #[test]
    fn sort_list_parses_directions() {
        assert_eq!(
            SortKey::parse_list("-price, name"),
            vec![SortKey::desc("price"), SortKey::asc("name")]
        );
        assert!(SortKey::parse_list(" , ").is_empty());
    }

    #[test]
    fn projection_forms() {
        assert_eq!(
            Projection::parse("name,price").unwrap(),
            Projection::include(&["name", "price"])
        );
        assert_eq!(
            Projection::parse("-images").unwrap(),
            Projection::exclude(&["images"])
        );
        assert_eq!(Projection::parse("").unwrap(), Projection::default_list());
        assert_matches!(
            Projection::parse("name,-price"),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn mixed_projection_rejects_the_whole_query() {
        let result = QuerySpec::from_pairs([("fields", "name,-price")]);
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn pagination_defaults_and_fallbacks() {
        assert_eq!(Pagination::from_raw(None, None), Pagination::default());
        assert_eq!(
            Pagination::from_raw(Some("abc"), Some("0")),
            Pagination { page: 1, limit: 10 }
        );
        assert_eq!(
            Pagination::from_raw(Some("-3"), Some("-1")),
            Pagination { page: 1, limit: 10 }
        );
        let page = Pagination::from_raw(Some("3"), Some("5"));
        assert_eq!(page.skip(), 10);
        assert_eq!(Pagination::default().skip(), 0);
    }

    #[test]
    fn shaper_applies_defaults() {
        let request = QueryShaper::shape(RetrievalRequest::new(), QuerySpec::default());
        assert!(request.filters.is_empty());
        assert_eq!(request.sort, vec![SortKey::desc("createdAt")]);
        assert_eq!(request.projection, Projection::exclude(&["__v"]));
        assert_eq!(request.skip, 0);
        assert_eq!(request.limit, Some(10));
    }

    #[test]
    fn shaper_keeps_existing_scope_filters() {
        let scoped = RetrievalRequest::new().filter(Filter::eq("tour", "t1"));
        let request = QueryShaper::new(scoped, spec(&[("rating[gte]", "4")]))
            .filter()
            .into_request();
        assert_eq!(
            request.filters,
            vec![
                Filter::eq("tour", "t1"),
                Filter::new("rating", CompareOp::Gte, 4)
            ]
        );
    }

    #[test]
    fn shaper_applies_requested_shape() {
        let request = QueryShaper::shape(
            RetrievalRequest::new(),
            spec(&[("sort", "-price,name"), ("fields", "name,price"), ("page", "2"), ("limit", "5")]),
        );
        assert_eq!(request.sort, vec![SortKey::desc("price"), SortKey::asc("name")]);
        assert_eq!(request.projection, Projection::include(&["name", "price"]));
        assert_eq!(request.skip, 5);
        assert_eq!(request.limit, Some(5));
    }
}
