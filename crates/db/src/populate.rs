//! Read-time joins between collections.
//!
//! A [`Populate`] directive either swaps ids held in a field for the
//! referenced documents ([`Join::Local`]) or attaches the documents of another
//! collection that point back at this one ([`Join::Foreign`], a virtual
//! field). Populated documents get their own collection's base filters and
//! hidden fields applied, and foreign documents are populated one level
//! further with their own local joins.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use natours_core::query::{Filter, Projection, RetrievalRequest};
use natours_core::types::{doc_id, Document};

use crate::collection::DocumentStore;
use crate::error::StoreResult;
use crate::models::{info_for, strip_hidden};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    /// `path` holds one id or an array of ids.
    Local,
    /// Documents whose field equals this document's `_id`.
    Foreign(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Populate {
    pub path: &'static str,
    pub collection: &'static str,
    pub join: Join,
    pub projection: Projection,
    /// Only populate on single-document reads.
    pub single_only: bool,
}

/// Apply `directives` to `docs`. `single` marks a read of one document.
pub async fn populate(
    store: &dyn DocumentStore,
    docs: &mut [Document],
    directives: &[Populate],
    single: bool,
) -> StoreResult<()> {
    for directive in directives.iter().filter(|d| single || !d.single_only) {
        match directive.join {
            Join::Local => populate_local(store, docs, directive).await?,
            Join::Foreign(field) => populate_foreign(store, docs, directive, field).await?,
        }
    }
    Ok(())
}

fn ids_in(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(id)) => vec![id.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

async fn populate_local(
    store: &dyn DocumentStore,
    docs: &mut [Document],
    directive: &Populate,
) -> StoreResult<()> {
    let mut seen = HashSet::new();
    let ids: Vec<String> = docs
        .iter()
        .flat_map(|doc| ids_in(doc.get(directive.path)))
        .filter(|id| seen.insert(id.clone()))
        .collect();
    if ids.is_empty() {
        return Ok(());
    }

    let info = info_for(directive.collection);
    let base: Vec<Filter> = info.map(|i| (i.base_filters)()).unwrap_or_default();
    let hidden = info.map(|i| i.hidden).unwrap_or_default();

    // Fetch whole documents so base filters can see fields the projection drops.
    let found = store
        .collection(directive.collection)
        .find_by_ids(&ids, &Projection::All)
        .await?;
    let by_id: HashMap<String, Document> = found
        .into_iter()
        .filter(|doc| base.iter().all(|f| f.matches(doc)))
        .filter_map(|doc| {
            let id = doc_id(&doc)?.to_string();
            let mut shown = directive.projection.apply(&doc);
            strip_hidden(&mut shown, hidden);
            Some((id, shown))
        })
        .collect();

    for doc in docs.iter_mut() {
        let replacement = match doc.get(directive.path) {
            Some(Value::String(id)) => by_id
                .get(id)
                .cloned()
                .map(Value::Object)
                .unwrap_or(Value::Null),
            Some(Value::Array(items)) => Value::Array(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|id| by_id.get(id).cloned().map(Value::Object))
                    .collect(),
            ),
            _ => continue,
        };
        doc.insert(directive.path.to_string(), replacement);
    }
    Ok(())
}

async fn populate_foreign(
    store: &dyn DocumentStore,
    docs: &mut [Document],
    directive: &Populate,
    field: &'static str,
) -> StoreResult<()> {
    let info = info_for(directive.collection);
    let base: Vec<Filter> = info.map(|i| (i.base_filters)()).unwrap_or_default();
    let hidden = info.map(|i| i.hidden).unwrap_or_default();
    let nested: Vec<Populate> = info
        .map(|i| (i.populate)())
        .unwrap_or_default()
        .into_iter()
        .filter(|p| p.join == Join::Local && !p.single_only)
        .collect();
    let collection = store.collection(directive.collection);

    for doc in docs.iter_mut() {
        let Some(id) = doc_id(doc).map(str::to_string) else {
            continue;
        };
        let request = RetrievalRequest::new()
            .filters(base.iter().cloned())
            .filter(Filter::eq(field, id))
            .select(directive.projection.clone());
        let mut related = collection.find(&request).await?;
        for nested_directive in &nested {
            populate_local(store, &mut related, nested_directive).await?;
        }
        for item in &mut related {
            strip_hidden(item, hidden);
        }
        doc.insert(
            directive.path.to_string(),
            Value::Array(related.into_iter().map(Value::Object).collect()),
        );
    }
    Ok(())
}
