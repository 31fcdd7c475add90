//! In-process document store.
//!
//! Documents live in insertion-ordered vectors, one per collection. Every
//! write takes the collection's write lock for its whole read-modify-write,
//! so updates are atomic with respect to each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::RwLock;

use natours_core::document::{execute, values_equal};
use natours_core::error::CoreError;
use natours_core::query::{Filter, Projection, RetrievalRequest};
use natours_core::types::{doc_id, Document};
use natours_core::update::UpdateSpec;

use crate::collection::{
    duplicate_message, stamp_new, unique_fields, Collection, DocumentStore, Normalizer,
};
use crate::error::StoreResult;

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Arc<MemoryCollection>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, name: &str) -> Arc<MemoryCollection> {
        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new(name)))
            .clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        self.handle(name)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

pub struct MemoryCollection {
    name: String,
    unique: Vec<&'static str>,
    docs: RwLock<Vec<Document>>,
}

impl MemoryCollection {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            unique: unique_fields(name),
            docs: RwLock::new(Vec::new()),
        }
    }

    /// Reject `doc` if it repeats a unique value held by another document.
    fn check_unique(&self, docs: &[Document], doc: &Document) -> Result<(), CoreError> {
        let own_id = doc_id(doc);
        for field in &self.unique {
            let Some(value) = doc.get(*field).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = docs
                .iter()
                .filter(|other| doc_id(other) != own_id)
                .any(|other| other.get(*field).is_some_and(|v| values_equal(v, value)));
            if taken {
                return Err(CoreError::Conflict(duplicate_message(value)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self, mut doc: Document) -> StoreResult<Document> {
        let mut docs = self.docs.write().await;
        let (id, _) = stamp_new(&mut doc);
        if docs.iter().any(|d| doc_id(d) == Some(id.as_str())) {
            return Err(CoreError::Conflict(format!("Duplicate id: {id}")).into());
        }
        self.check_unique(&docs, &doc)?;
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn find(&self, request: &RetrievalRequest) -> StoreResult<Vec<Document>> {
        let docs = self.docs.read().await;
        Ok(execute(docs.iter(), request))
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Document>> {
        let docs = self.docs.read().await;
        Ok(docs.iter().find(|d| doc_id(d) == Some(id)).cloned())
    }

    async fn find_by_ids(
        &self,
        ids: &[String],
        projection: &Projection,
    ) -> StoreResult<Vec<Document>> {
        let docs = self.docs.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| docs.iter().find(|d| doc_id(d) == Some(id.as_str())))
            .map(|d| projection.apply(d))
            .collect())
    }

    async fn update_by_id(
        &self,
        id: &str,
        update: &UpdateSpec,
        check: Normalizer,
    ) -> StoreResult<Option<Document>> {
        let mut docs = self.docs.write().await;
        let Some(index) = docs.iter().position(|d| doc_id(d) == Some(id)) else {
            return Ok(None);
        };

        let mut merged = docs[index].clone();
        update.apply(&mut merged);
        let merged = check(merged)?;
        self.check_unique(&docs, &merged)?;

        docs[index] = merged.clone();
        Ok(Some(merged))
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<Option<Document>> {
        let mut docs = self.docs.write().await;
        Ok(docs
            .iter()
            .position(|d| doc_id(d) == Some(id))
            .map(|index| docs.remove(index)))
    }

    async fn delete_many(&self, filters: &[Filter]) -> StoreResult<u64> {
        let mut docs = self.docs.write().await;
        let before = docs.len();
        docs.retain(|d| !filters.iter().all(|f| f.matches(d)));
        Ok((before - docs.len()) as u64)
    }

    async fn count(&self, filters: &[Filter]) -> StoreResult<u64> {
        let docs = self.docs.read().await;
        Ok(docs
            .iter()
            .filter(|d| filters.iter().all(|f| f.matches(d)))
            .count() as u64)
    }
}
