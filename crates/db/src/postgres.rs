//! PostgreSQL backend.
//!
//! Every collection shares the `documents` table; a document is one JSONB
//! value keyed by `(collection, id)`. Retrieval requests are rendered to a
//! single statement with [`QueryBuilder`], binding every user-supplied value.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use natours_core::document::top_level;
use natours_core::error::CoreError;
use natours_core::query::{CompareOp, Filter, Projection, RetrievalRequest, SortDirection};
use natours_core::types::{Document, ID_FIELD};
use natours_core::update::UpdateSpec;

use crate::collection::{duplicate_message, stamp_new, Collection, DocumentStore, Normalizer};
use crate::error::{StoreError, StoreResult};

/// Postgres unique violation.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        Arc::new(PgCollection {
            pool: self.pool.clone(),
            name: name.to_string(),
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }
}

pub struct PgCollection {
    pool: PgPool,
    name: String,
}

#[async_trait]
impl Collection for PgCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self, mut doc: Document) -> StoreResult<Document> {
        let (id, created_at) = stamp_new(&mut doc);
        sqlx::query(
            "INSERT INTO documents (collection, id, doc, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&self.name)
        .bind(&id)
        .bind(Json(&doc))
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &doc))?;
        Ok(doc)
    }

    async fn find(&self, request: &RetrievalRequest) -> StoreResult<Vec<Document>> {
        let mut query = select_query(&self.name, request);
        let rows = query
            .build_query_scalar::<Json<Value>>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(into_document).collect()
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Document>> {
        let row = sqlx::query_scalar::<_, Json<Value>>(
            "SELECT doc FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(&self.name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(into_document).transpose()
    }

    async fn find_by_ids(
        &self,
        ids: &[String],
        projection: &Projection,
    ) -> StoreResult<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = QueryBuilder::<Postgres>::new("SELECT id, ");
        push_projection(&mut query, projection);
        query
            .push(" FROM documents WHERE collection = ")
            .push_bind(self.name.clone())
            .push(" AND id = ANY(")
            .push_bind(ids.to_vec())
            .push(")");
        let rows = query
            .build_query_as::<(String, Json<Value>)>()
            .fetch_all(&self.pool)
            .await?;

        let mut by_id: HashMap<String, Json<Value>> = rows.into_iter().collect();
        ids.iter()
            .filter_map(|id| by_id.remove(id))
            .map(into_document)
            .collect()
    }

    async fn update_by_id(
        &self,
        id: &str,
        update: &UpdateSpec,
        check: Normalizer,
    ) -> StoreResult<Option<Document>> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_scalar::<_, Json<Value>>(
            "SELECT doc FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(&self.name)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(current) = current else {
            return Ok(None);
        };

        let mut merged = into_document(current)?;
        update.apply(&mut merged);
        let merged = check(merged)?;

        sqlx::query("UPDATE documents SET doc = $3 WHERE collection = $1 AND id = $2")
            .bind(&self.name)
            .bind(id)
            .bind(Json(&merged))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, &merged))?;
        tx.commit().await?;

        tracing::debug!(collection = %self.name, id, "Document updated");
        Ok(Some(merged))
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<Option<Document>> {
        let row = sqlx::query_scalar::<_, Json<Value>>(
            "DELETE FROM documents WHERE collection = $1 AND id = $2 RETURNING doc",
        )
        .bind(&self.name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(into_document).transpose()
    }

    async fn delete_many(&self, filters: &[Filter]) -> StoreResult<u64> {
        let mut query = QueryBuilder::<Postgres>::new("DELETE FROM documents");
        push_where(&mut query, &self.name, filters);
        let result = query.build().execute(&self.pool).await?;
        tracing::debug!(
            collection = %self.name,
            deleted = result.rows_affected(),
            "Documents deleted"
        );
        Ok(result.rows_affected())
    }

    async fn count(&self, filters: &[Filter]) -> StoreResult<u64> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents");
        push_where(&mut query, &self.name, filters);
        let count = query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

fn into_document(Json(value): Json<Value>) -> StoreResult<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CoreError::Internal(format!(
            "stored document is not an object: {other}"
        ))
        .into()),
    }
}

/// Turn a unique-index violation into a conflict naming the offending value.
fn map_write_error(err: sqlx::Error, doc: &Document) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            // Index names follow `uq_<collection>_<field>`.
            let value = db_err
                .constraint()
                .and_then(|c| c.strip_prefix("uq_"))
                .and_then(|rest| rest.split_once('_'))
                .and_then(|(_, field)| doc.get(field));
            let message = match value {
                Some(value) => duplicate_message(value),
                None => "Duplicate document".to_string(),
            };
            return CoreError::Conflict(message).into();
        }
    }
    err.into()
}

// ---------------------------------------------------------------------------
// SQL rendering
// ---------------------------------------------------------------------------

/// Render a full retrieval request.
pub(crate) fn select_query(
    collection: &str,
    request: &RetrievalRequest,
) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new("SELECT ");
    push_projection(&mut query, &request.projection);
    query.push(" FROM documents");
    push_where(&mut query, collection, &request.filters);

    query.push(" ORDER BY ");
    for key in &request.sort {
        push_path(&mut query, &key.field);
        query.push(match key.direction {
            SortDirection::Asc => " ASC NULLS FIRST, ",
            SortDirection::Desc => " DESC NULLS LAST, ",
        });
    }
    query.push("created_at ASC, id ASC");

    if request.skip > 0 {
        query
            .push(" OFFSET ")
            .push_bind(i64::try_from(request.skip).unwrap_or(i64::MAX));
    }
    if let Some(limit) = request.limit {
        query
            .push(" LIMIT ")
            .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    }
    query
}

fn push_projection(query: &mut QueryBuilder<'static, Postgres>, projection: &Projection) {
    match projection {
        Projection::All => {
            query.push("doc");
        }
        Projection::Include(fields) => {
            let mut keys: Vec<String> = fields.iter().map(|f| top_level(f).to_string()).collect();
            keys.push(ID_FIELD.to_string());
            query
                .push("(SELECT COALESCE(jsonb_object_agg(e.key, e.value), '{}'::jsonb) ")
                .push("FROM jsonb_each(doc) AS e WHERE e.key = ANY(")
                .push_bind(keys)
                .push("))");
        }
        Projection::Exclude(fields) => {
            let keys: Vec<String> = fields.iter().map(|f| top_level(f).to_string()).collect();
            query.push("(doc - ").push_bind(keys).push("::text[])");
        }
    }
}

fn push_where(query: &mut QueryBuilder<'static, Postgres>, collection: &str, filters: &[Filter]) {
    query
        .push(" WHERE collection = ")
        .push_bind(collection.to_string());
    for filter in filters {
        query.push(" AND ");
        push_filter(query, filter);
    }
}

fn push_path(query: &mut QueryBuilder<'static, Postgres>, field: &str) {
    let path: Vec<String> = field.split('.').map(str::to_string).collect();
    query.push("(doc #> ").push_bind(path).push("::text[])");
}

fn push_filter(query: &mut QueryBuilder<'static, Postgres>, filter: &Filter) {
    match filter.op {
        CompareOp::Eq => push_equals(query, filter),
        CompareOp::Ne => {
            query.push("NOT ");
            push_equals(query, filter);
        }
        CompareOp::Gt => push_range(query, filter, ">"),
        CompareOp::Gte => push_range(query, filter, ">="),
        CompareOp::Lt => push_range(query, filter, "<"),
        CompareOp::Lte => push_range(query, filter, "<="),
    }
}

/// Equality that also matches any element of an array field. Missing fields
/// compare false rather than NULL so `NOT` works for `ne`.
fn push_equals(query: &mut QueryBuilder<'static, Postgres>, filter: &Filter) {
    query.push("COALESCE((");
    push_path(query, &filter.field);
    query
        .push(" = ")
        .push_bind(Json(filter.value.clone()))
        .push("::jsonb OR CASE WHEN jsonb_typeof(");
    push_path(query, &filter.field);
    query.push(") = 'array' THEN EXISTS (SELECT 1 FROM jsonb_array_elements(");
    push_path(query, &filter.field);
    query
        .push(") AS el WHERE el = ")
        .push_bind(Json(filter.value.clone()))
        .push("::jsonb) ELSE false END), false)");
}

/// Range comparison between values of the same JSON scalar type.
fn push_range(query: &mut QueryBuilder<'static, Postgres>, filter: &Filter, op: &'static str) {
    let kind = match &filter.value {
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Bool(_) => "boolean",
        _ => {
            query.push("false");
            return;
        }
    };
    query.push("(jsonb_typeof(");
    push_path(query, &filter.field);
    query.push(") = '").push(kind).push("' AND ");
    push_path(query, &filter.field);
    query
        .push(" ")
        .push(op)
        .push(" ")
        .push_bind(Json(filter.value.clone()))
        .push("::jsonb)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use natours_core::query::SortKey;

    #[test]
    fn default_list_request_renders_exclusion_and_order() {
        let request = RetrievalRequest::new()
            .select(Projection::default_list())
            .sort(vec![SortKey::desc("createdAt")])
            .limit(10);
        let query = select_query("tours", &request);
        let sql = query.sql();
        assert!(sql.starts_with("SELECT (doc - $1::text[]) FROM documents WHERE collection = $2"));
        assert!(sql.contains("ORDER BY (doc #> $3::text[]) DESC NULLS LAST, created_at ASC, id ASC"));
        assert!(sql.ends_with("LIMIT $4"));
        assert!(!sql.contains("OFFSET"));
    }

    #[test]
    fn filters_are_bound_not_inlined() {
        let request = RetrievalRequest::new()
            .filter(Filter::new("price", CompareOp::Gte, 100))
            .filter(Filter::eq("difficulty", "easy'; DROP TABLE documents; --"))
            .skip(20);
        let query = select_query("tours", &request);
        let sql = query.sql();
        assert!(!sql.contains("DROP TABLE"));
        assert!(sql.contains("jsonb_typeof((doc #> $2::text[])) = 'number'"));
        assert!(sql.contains(">= $4::jsonb"));
        assert!(sql.contains("jsonb_array_elements"));
        assert!(sql.contains("OFFSET $"));
    }

    #[test]
    fn inclusion_projection_keeps_id() {
        let mut query = QueryBuilder::<Postgres>::new("SELECT ");
        push_projection(&mut query, &Projection::include(&["name", "price"]));
        assert!(query.sql().contains("jsonb_object_agg"));
        assert!(query.sql().contains("e.key = ANY($1)"));
    }

    #[test]
    fn range_on_non_scalar_matches_nothing() {
        let mut query = QueryBuilder::<Postgres>::new("");
        push_filter(
            &mut query,
            &Filter::new("guides", CompareOp::Gt, serde_json::json!(["a"])),
        );
        assert_eq!(query.sql(), "false");
    }

    #[test]
    fn not_equal_negates_coalesced_equality() {
        let mut query = QueryBuilder::<Postgres>::new("");
        push_filter(&mut query, &Filter::ne("active", false));
        assert!(query.sql().starts_with("NOT COALESCE(("));
    }
}
