use chrono::SecondsFormat;

/// Document identifiers are opaque strings (generated ids are UUID v7 in
/// simple form, imported data may carry 24-hex object ids).
pub type DocId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A stored entity: a JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Key holding the document identifier.
pub const ID_FIELD: &str = "_id";

/// Internal version counter, incremented on every update.
pub const VERSION_FIELD: &str = "__v";

/// Creation timestamp; the default sort key for list requests.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Keys managed by the store that a request body may never overwrite.
pub const RESERVED_FIELDS: &[&str] = &[ID_FIELD, VERSION_FIELD, CREATED_AT_FIELD];

/// Generate a fresh, time-ordered document id.
pub fn new_doc_id() -> DocId {
    uuid::Uuid::now_v7().simple().to_string()
}

/// Render a timestamp the way documents store it.
///
/// Fixed millisecond precision with a `Z` suffix keeps lexicographic order
/// equal to chronological order.
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Read the `_id` of a document, if it is a string.
pub fn doc_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(|v| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_lexicographically() {
        let a = chrono::Utc.with_ymd_and_hms(2021, 3, 9, 8, 0, 0).unwrap();
        let b = chrono::Utc.with_ymd_and_hms(2021, 11, 1, 8, 0, 0).unwrap();
        assert_eq!(format_timestamp(&a), "2021-03-09T08:00:00.000Z");
        assert!(format_timestamp(&a) < format_timestamp(&b));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(new_doc_id(), new_doc_id());
        assert_eq!(new_doc_id().len(), 32);
    }
}
