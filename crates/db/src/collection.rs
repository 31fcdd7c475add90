//! Storage capability traits.
//!
//! Handlers and the resource factory only ever see `dyn DocumentStore` and
//! `dyn Collection`, so the Postgres and in-memory backends are
//! interchangeable.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use natours_core::error::CoreError;
use natours_core::query::{Filter, Projection, RetrievalRequest};
use natours_core::types::{
    format_timestamp, new_doc_id, DocId, Document, Timestamp, CREATED_AT_FIELD, ID_FIELD,
    VERSION_FIELD,
};
use natours_core::update::UpdateSpec;

use crate::error::StoreResult;

/// Validates and normalizes a merged document before it is written.
pub type Normalizer = fn(Document) -> Result<Document, CoreError>;

/// Fields that must be unique within a collection, as `(collection, field)`.
///
/// Mirrors the `uq_*` indexes created by the migrations.
pub const UNIQUE_FIELDS: &[(&str, &str)] = &[("tours", "name"), ("users", "email")];

/// Unique fields of one collection.
pub fn unique_fields(collection: &str) -> Vec<&'static str> {
    UNIQUE_FIELDS
        .iter()
        .filter(|(c, _)| *c == collection)
        .map(|(_, f)| *f)
        .collect()
}

/// Message used for a unique-field violation.
pub fn duplicate_message(value: &Value) -> String {
    let shown = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    format!("Duplicate field value: \"{shown}\". Please use another value!")
}

#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// Insert a document and return it as stored.
    async fn create(&self, doc: Document) -> StoreResult<Document>;

    async fn find(&self, request: &RetrievalRequest) -> StoreResult<Vec<Document>>;

    async fn find_one(&self, filters: &[Filter]) -> StoreResult<Option<Document>> {
        let request = RetrievalRequest::new()
            .filters(filters.iter().cloned())
            .limit(1);
        Ok(self.find(&request).await?.into_iter().next())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Document>>;

    /// Documents with the given ids, in the order of `ids`. Unknown ids are
    /// skipped.
    async fn find_by_ids(
        &self,
        ids: &[String],
        projection: &Projection,
    ) -> StoreResult<Vec<Document>>;

    /// Apply `update` to the document atomically. `check` sees the merged
    /// document; if it fails nothing is written. `None` when no document has
    /// this id.
    async fn update_by_id(
        &self,
        id: &str,
        update: &UpdateSpec,
        check: Normalizer,
    ) -> StoreResult<Option<Document>>;

    /// Remove a document, returning it.
    async fn delete_by_id(&self, id: &str) -> StoreResult<Option<Document>>;

    /// Remove every document matching `filters`, returning how many went.
    async fn delete_many(&self, filters: &[Filter]) -> StoreResult<u64>;

    async fn count(&self, filters: &[Filter]) -> StoreResult<u64>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn collection(&self, name: &str) -> Arc<dyn Collection>;

    /// Confirm the backend is reachable.
    async fn ping(&self) -> StoreResult<()>;
}

/// Fill in the store-managed fields of a new document and return its id and
/// creation time.
pub fn stamp_new(doc: &mut Document) -> (DocId, Timestamp) {
    let id = match doc.get(ID_FIELD).and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => new_doc_id(),
    };
    doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));

    let created_at = doc
        .get(CREATED_AT_FIELD)
        .and_then(Value::as_str)
        .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    doc.insert(
        CREATED_AT_FIELD.to_string(),
        Value::String(format_timestamp(&created_at)),
    );
    doc.insert(VERSION_FIELD.to_string(), Value::from(0));
    (id, created_at)
}
