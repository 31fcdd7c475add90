//! Resource handler factory.
//!
//! [`Resource`] implements create / read-one / list / update / delete once for
//! any [`Model`]; the generic handler functions below bind it to axum so a
//! route table can mount `factory::get_all::<Tour, Public>` and friends directly.
//! Resources with extra rules (nested reviews, auth-scoped bookings) call
//! [`Resource`] from their own handlers.

use std::marker::PhantomData;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, State};
use axum::http::StatusCode;
use axum::Json;
use natours_core::error::CoreError;
use natours_core::query::{Filter, QueryShaper, QuerySpec, RetrievalRequest};
use natours_core::types::{doc_id, Document, ID_FIELD};
use natours_core::update::UpdateSpec;
use natours_db::models::{strip_hidden, Model};
use natours_db::populate::populate;
use natours_db::{Collection, DocumentStore};

use crate::error::AppResult;
use crate::middleware::request_time::RequestTime;
use crate::query::{JsonBody, ListQuery};
use crate::response::Envelope;
use crate::state::AppState;

pub struct Resource<M: Model> {
    store: Arc<dyn DocumentStore>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Resource<M> {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
            _model: PhantomData,
        }
    }

    fn collection(&self) -> Arc<dyn Collection> {
        self.store.collection(M::COLLECTION)
    }

    fn not_found(id: &str) -> CoreError {
        CoreError::not_found(M::ENTITY, id)
    }

    /// Validate `body` against the model and persist it. Nothing is written
    /// when validation fails.
    pub async fn create(&self, body: Document) -> AppResult<Document> {
        let mut model = M::from_document(&body)?;
        model.check()?;
        model.prepare();
        let created = self.collection().create(model.to_document()?).await?;

        tracing::info!(
            collection = M::COLLECTION,
            id = doc_id(&created).unwrap_or_default(),
            "Document created"
        );
        Ok(present::<M>(created))
    }

    /// A single visible document, fully populated.
    pub async fn get_one(&self, id: &str) -> AppResult<Document> {
        let mut doc = self
            .find_visible(id)
            .await?
            .ok_or_else(|| Self::not_found(id))?;
        populate(
            self.store.as_ref(),
            std::slice::from_mut(&mut doc),
            &M::populate(),
            true,
        )
        .await?;
        Ok(present::<M>(doc))
    }

    /// A shaped list: base filters, then `scope`, then the query stages.
    pub async fn get_all(&self, scope: Vec<Filter>, spec: QuerySpec) -> AppResult<Vec<Document>> {
        let request = RetrievalRequest::new()
            .filters(M::base_filters())
            .filters(scope);
        let request = QueryShaper::shape(request, spec);

        let mut docs = self.collection().find(&request).await?;
        populate(self.store.as_ref(), &mut docs, &M::populate(), false).await?;
        Ok(docs.into_iter().map(present::<M>).collect())
    }

    /// Apply a partial update from a request body: the model's array flags,
    /// the field merge and validation happen in one atomic write.
    pub async fn update(&self, id: &str, body: Document) -> AppResult<Document> {
        let update = UpdateSpec::from_body(body, M::ARRAY_FIELD, M::PROTECTED_FIELDS)?;
        self.update_with(id, &update).await
    }

    /// Apply a prepared update expression.
    pub async fn update_with(&self, id: &str, update: &UpdateSpec) -> AppResult<Document> {
        self.ensure_visible(id).await?;
        let mut doc = self
            .collection()
            .update_by_id(id, update, M::validate_document)
            .await?
            .ok_or_else(|| Self::not_found(id))?;

        tracing::info!(collection = M::COLLECTION, id, "Document updated");
        populate(
            self.store.as_ref(),
            std::slice::from_mut(&mut doc),
            &M::populate(),
            false,
        )
        .await?;
        Ok(present::<M>(doc))
    }

    /// Remove a document and everything that cascades from it.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.ensure_visible(id).await?;
        self.collection()
            .delete_by_id(id)
            .await?
            .ok_or_else(|| Self::not_found(id))?;

        for cascade in M::CASCADE {
            let removed = self
                .store
                .collection(cascade.collection)
                .delete_many(&[Filter::eq(cascade.field, id)])
                .await?;
            if removed > 0 {
                tracing::info!(
                    collection = cascade.collection,
                    parent = id,
                    removed,
                    "Cascaded delete"
                );
            }
        }
        tracing::info!(collection = M::COLLECTION, id, "Document deleted");
        Ok(())
    }

    /// The stored document if the model's base filters let it be seen.
    pub async fn find_visible(&self, id: &str) -> AppResult<Option<Document>> {
        let mut filters = M::base_filters();
        filters.push(Filter::eq(ID_FIELD, id));
        Ok(self.collection().find_one(&filters).await?)
    }

    async fn ensure_visible(&self, id: &str) -> AppResult<()> {
        if M::base_filters().is_empty() {
            return Ok(());
        }
        match self.find_visible(id).await? {
            Some(_) => Ok(()),
            None => Err(Self::not_found(id).into()),
        }
    }
}

/// Strip the model's hidden fields and add its computed ones for a client
/// response.
pub fn present<M: Model>(mut doc: Document) -> Document {
    strip_hidden(&mut doc, M::HIDDEN_FIELDS);
    M::decorate(&mut doc);
    doc
}

// ---------------------------------------------------------------------------
// Generic handlers
// ---------------------------------------------------------------------------
//
// `G` is the access guard extractor for the route (`Public`, `AuthUser`,
// `RequireAdmin`, ...). It runs before the body is read.

/// POST -> 201 `{ status, data: { Data } }`
pub async fn create_one<M, G>(
    _guard: G,
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> AppResult<(StatusCode, Json<Envelope<Document>>)>
where
    M: Model,
    G: FromRequestParts<AppState> + Send,
{
    let created = Resource::<M>::new(&state).create(body).await?;
    Ok((StatusCode::CREATED, Json(Envelope::success(created))))
}

/// GET /{id} -> 200 `{ status, requestedTime, data: { Data } }`
pub async fn get_one<M, G>(
    _guard: G,
    State(state): State<AppState>,
    RequestTime(requested_time): RequestTime,
    Path(id): Path<String>,
) -> AppResult<Json<Envelope<Document>>>
where
    M: Model,
    G: FromRequestParts<AppState> + Send,
{
    let doc = Resource::<M>::new(&state).get_one(&id).await?;
    Ok(Json(Envelope::success(doc).requested_at(requested_time)))
}

/// GET -> 200 `{ status, requestedTime, result, data: { Data: [...] } }`
pub async fn get_all<M, G>(
    _guard: G,
    State(state): State<AppState>,
    RequestTime(requested_time): RequestTime,
    ListQuery(spec): ListQuery,
) -> AppResult<Json<Envelope<Vec<Document>>>>
where
    M: Model,
    G: FromRequestParts<AppState> + Send,
{
    let docs = Resource::<M>::new(&state).get_all(Vec::new(), spec).await?;
    Ok(Json(Envelope::list(docs).requested_at(requested_time)))
}

/// PATCH /{id} -> 200 `{ status, data: { Data } }`
pub async fn update_one<M, G>(
    _guard: G,
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> AppResult<Json<Envelope<Document>>>
where
    M: Model,
    G: FromRequestParts<AppState> + Send,
{
    let doc = Resource::<M>::new(&state).update(&id, body).await?;
    Ok(Json(Envelope::success(doc)))
}

/// DELETE /{id} -> 204, empty body
pub async fn delete_one<M, G>(
    _guard: G,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode>
where
    M: Model,
    G: FromRequestParts<AppState> + Send,
{
    Resource::<M>::new(&state).delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
