use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::{json, Value};

use natours_core::error::CoreError;
use natours_core::query::{CompareOp, Filter, Projection, RetrievalRequest, SortKey};
use natours_core::types::Document;
use natours_core::update::{UpdateSpec, GUIDES};
use natours_db::models::{Model, Review, Tour};
use natours_db::populate::populate;
use natours_db::{DocumentStore, MemoryStore, StoreError};

fn doc(value: Value) -> Document {
    value.as_object().cloned().expect("object")
}

fn tour(name: &str, price: u32) -> Document {
    doc(json!({
        "name": name,
        "duration": 5,
        "maxGroupSize": 10,
        "difficulty": "easy",
        "price": price,
        "summary": "A tour",
        "imageCover": "cover.jpg"
    }))
}

#[tokio::test]
async fn create_assigns_store_fields() {
    let store = MemoryStore::new();
    let tours = store.collection("tours");

    let created = tours.create(tour("The Forest Hiker", 397)).await.unwrap();
    assert!(created["_id"].as_str().is_some_and(|id| !id.is_empty()));
    assert_eq!(created["__v"], json!(0));
    assert!(created.contains_key("createdAt"));

    let id = created["_id"].as_str().unwrap();
    let found = tours.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(found, created);
}

#[tokio::test]
async fn unique_fields_conflict() {
    let store = MemoryStore::new();
    let tours = store.collection("tours");
    tours.create(tour("The Forest Hiker", 397)).await.unwrap();

    let err = tours.create(tour("The Forest Hiker", 500)).await.unwrap_err();
    assert_matches!(err, StoreError::Rejected(CoreError::Conflict(m)) if m.contains("The Forest Hiker"));
    assert_eq!(tours.count(&[]).await.unwrap(), 1);
}

#[tokio::test]
async fn find_filters_sorts_and_pages() {
    let store = MemoryStore::new();
    let tours = store.collection("tours");
    for (name, price) in [
        ("The Sea Explorer", 497),
        ("The Forest Hiker", 397),
        ("The Snow Adventurer", 997),
        ("The City Wanderer", 1197),
    ] {
        tours.create(tour(name, price)).await.unwrap();
    }

    let request = RetrievalRequest::new()
        .filter(Filter::new("price", CompareOp::Lt, 1000))
        .sort(vec![SortKey::asc("price")])
        .select(Projection::include(&["name"]))
        .skip(1)
        .limit(2);
    let page = tours.find(&request).await.unwrap();

    let names: Vec<_> = page.iter().map(|d| d["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["The Sea Explorer", "The Snow Adventurer"]);
    assert!(page.iter().all(|d| d.len() == 2 && d.contains_key("_id")));
}

#[tokio::test]
async fn update_applies_guides_and_validation_atomically() {
    let store = MemoryStore::new();
    let tours = store.collection("tours");
    let created = tours.create(tour("The Forest Hiker", 397)).await.unwrap();
    let id = created["_id"].as_str().unwrap();

    let add = UpdateSpec::from_body(
        doc(json!({ "guides": "g1", "addGuide": true, "price": 450 })),
        Some(GUIDES),
        &[],
    )
    .unwrap();
    let updated = tours
        .update_by_id(id, &add, Tour::validate_document)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated["guides"], json!(["g1"]));
    assert_eq!(updated["__v"], json!(1));

    // A failing check leaves the stored document untouched.
    let bad = UpdateSpec::from_body(
        doc(json!({ "guides": "g2", "addGuide": true, "difficulty": "extreme" })),
        Some(GUIDES),
        &[],
    )
    .unwrap();
    let err = tours
        .update_by_id(id, &bad, Tour::validate_document)
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Rejected(CoreError::Validation(_)));

    let stored = tours.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored["guides"], json!(["g1"]));
    assert_eq!(stored["difficulty"], json!("easy"));
}

#[tokio::test]
async fn concurrent_guide_additions_are_not_lost() {
    let store = Arc::new(MemoryStore::new());
    let tours = store.collection("tours");
    let created = tours.create(tour("The Forest Hiker", 397)).await.unwrap();
    let id = created["_id"].as_str().unwrap().to_string();

    let mut handles = Vec::new();
    for n in 0..10 {
        let tours = store.collection("tours");
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            let update = UpdateSpec::from_body(
                doc(json!({ "guides": format!("g{n}"), "addGuide": true })),
                Some(GUIDES),
                &[],
            )
            .unwrap();
            tours
                .update_by_id(&id, &update, Tour::validate_document)
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stored = tours.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(stored["guides"].as_array().unwrap().len(), 10);
    assert_eq!(stored["__v"], json!(10));
}

#[tokio::test]
async fn missing_ids_return_none() {
    let store = MemoryStore::new();
    let reviews = store.collection("reviews");
    let update = UpdateSpec::set(doc(json!({ "rating": 4 })));
    assert!(reviews
        .update_by_id("nope", &update, Review::validate_document)
        .await
        .unwrap()
        .is_none());
    assert!(reviews.delete_by_id("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn delete_many_matches_filters() {
    let store = MemoryStore::new();
    let reviews = store.collection("reviews");
    for (tour, rating) in [("t1", 5), ("t1", 4), ("t2", 3)] {
        reviews
            .create(doc(json!({ "review": "ok", "rating": rating, "tour": tour, "user": "u1" })))
            .await
            .unwrap();
    }
    assert_eq!(reviews.delete_many(&[Filter::eq("tour", "t1")]).await.unwrap(), 2);
    assert_eq!(reviews.count(&[]).await.unwrap(), 1);
}

#[tokio::test]
async fn population_replaces_ids_and_attaches_virtuals() {
    let store = MemoryStore::new();
    let users = store.collection("users");
    let guide = users
        .create(doc(json!({
            "name": "Lead Guide", "email": "lead@example.com", "password": "hash", "role": "lead-guide"
        })))
        .await
        .unwrap();
    let retired = users
        .create(doc(json!({
            "name": "Retired", "email": "old@example.com", "password": "hash", "active": false
        })))
        .await
        .unwrap();
    let reviewer = users
        .create(doc(json!({ "name": "Reviewer", "email": "r@example.com", "photo": "r.jpg", "password": "hash" })))
        .await
        .unwrap();

    let mut forest = tour("The Forest Hiker", 397);
    forest.insert("guides".into(), json!([guide["_id"], retired["_id"]]));
    let forest = store.collection("tours").create(forest).await.unwrap();

    store
        .collection("reviews")
        .create(doc(json!({
            "review": "Great", "rating": 5, "tour": forest["_id"], "user": reviewer["_id"]
        })))
        .await
        .unwrap();

    let mut docs = vec![forest.clone()];
    populate(&store, &mut docs, &Tour::populate(), true).await.unwrap();

    let guides = docs[0]["guides"].as_array().unwrap();
    assert_eq!(guides.len(), 1, "inactive users are not populated");
    assert_eq!(guides[0]["name"], json!("Lead Guide"));
    assert!(guides[0].get("password").is_none());

    let reviews = docs[0]["reviews"].as_array().unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0]["user"]["name"], json!("Reviewer"));
    assert_eq!(reviews[0]["user"]["photo"], json!("r.jpg"));

    // List reads skip single-only directives.
    let mut docs = vec![forest];
    populate(&store, &mut docs, &Tour::populate(), false).await.unwrap();
    assert!(docs[0].get("reviews").is_none());
}
