//! Integration tests for reviews, nested under tours and standalone, and
//! for bookings.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, delete_auth, get, get_auth, patch_json_auth, post_json_auth, seed_tour, seed_user,
};
use natours_db::models::{Booking, Model, Tour};
use natours_db::DocumentStore;
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: nested create and list
// ---------------------------------------------------------------------------

#[tokio::test]
async fn nested_review_takes_tour_from_path_and_user_from_token() {
    let store = common::new_store();
    let (user_id, token) = seed_user(&store, "Author", "author@example.com", "user").await;
    let (_, other_token) = seed_user(&store, "Other", "other@example.com", "user").await;
    let tour = seed_tour(&store, "The Forest Hiker", 397.0, json!({})).await;
    let other_tour = seed_tour(&store, "The Sea Explorer", 497.0, json!({})).await;
    let app = common::build_test_app(store.clone());

    let uri = format!("/api/v1/tours/{tour}/reviews");
    let body = json!({ "review": "Amazing", "rating": 5, "user": "someone-else" });
    let response = post_json_auth(app.clone(), &uri, body, &token).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["Data"]["tour"], tour.as_str());
    assert_eq!(json["data"]["Data"]["user"], user_id.as_str());

    let body = json!({ "review": "Good", "rating": 4 });
    post_json_auth(app.clone(), &uri, body, &other_token).await;
    let body = json!({ "review": "Wet", "rating": 3, "tour": other_tour });
    let response = post_json_auth(app.clone(), "/api/v1/reviews", body, &token).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(get_auth(app.clone(), &uri, &token).await).await;
    assert_eq!(json["result"], 2);
    assert!(json["data"]["Data"][0]["user"]["name"].is_string());

    let json = body_json(get_auth(app, "/api/v1/reviews", &token).await).await;
    assert_eq!(json["result"], 3);

    let stored = store
        .collection(Tour::COLLECTION)
        .find_by_id(&tour)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["ratingsQuantity"], 2);
    assert_eq!(stored["ratingsAverage"].as_f64(), Some(4.5));
}

#[tokio::test]
async fn reviews_require_login() {
    let store = common::new_store();
    let tour = seed_tour(&store, "The Forest Hiker", 397.0, json!({})).await;
    let app = common::build_test_app(store);

    let response = get(app, &format!("/api/v1/tours/{tour}/reviews")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn only_customers_review_and_only_once() {
    let store = common::new_store();
    let (_, customer) = seed_user(&store, "Author", "author@example.com", "user").await;
    let (_, guide) = seed_user(&store, "Guide", "guide@example.com", "guide").await;
    let tour = seed_tour(&store, "The Forest Hiker", 397.0, json!({})).await;
    let app = common::build_test_app(store);
    let uri = format!("/api/v1/tours/{tour}/reviews");
    let body = json!({ "review": "Amazing", "rating": 5 });

    let response = post_json_auth(app.clone(), &uri, body.clone(), &guide).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post_json_auth(app.clone(), &uri, body.clone(), &customer).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = post_json_auth(app.clone(), &uri, body.clone(), &customer).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = post_json_auth(
        app,
        "/api/v1/tours/no-such-tour/reviews",
        body,
        &customer,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_rating_is_rejected() {
    let store = common::new_store();
    let (_, customer) = seed_user(&store, "Author", "author@example.com", "user").await;
    let tour = seed_tour(&store, "The Forest Hiker", 397.0, json!({})).await;
    let app = common::build_test_app(store);

    let body = json!({ "review": "Off the charts", "rating": 6 });
    let response = post_json_auth(app, &format!("/api/v1/tours/{tour}/reviews"), body, &customer).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: ownership on update and delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn users_change_only_their_own_reviews() {
    let store = common::new_store();
    let (_, author) = seed_user(&store, "Author", "author@example.com", "user").await;
    let (_, other) = seed_user(&store, "Other", "other@example.com", "user").await;
    let (_, admin) = seed_user(&store, "Admin", "admin@example.com", "admin").await;
    let tour = seed_tour(&store, "The Forest Hiker", 397.0, json!({})).await;
    let app = common::build_test_app(store.clone());

    let body = json!({ "review": "Amazing", "rating": 5 });
    let created = body_json(
        post_json_auth(app.clone(), &format!("/api/v1/tours/{tour}/reviews"), body, &author).await,
    )
    .await;
    let id = created["data"]["Data"]["_id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/reviews/{id}");

    let response = patch_json_auth(app.clone(), &uri, json!({ "rating": 1 }), &other).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = patch_json_auth(app.clone(), &uri, json!({ "rating": 3 }), &author).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["Data"]["rating"].as_f64(), Some(3.0));

    let response = delete_auth(app.clone(), &uri, &admin).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let stored = store
        .collection(Tour::COLLECTION)
        .find_by_id(&tour)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["ratingsQuantity"], 0);
    assert_eq!(stored["ratingsAverage"].as_f64(), Some(4.5));
}

// ---------------------------------------------------------------------------
// Test: bookings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn my_tours_lists_booked_tours() {
    let store = common::new_store();
    let (user, token) = seed_user(&store, "Traveller", "traveller@example.com", "user").await;
    let (_, lead) = seed_user(&store, "Lead", "lead@example.com", "lead-guide").await;
    let booked = seed_tour(&store, "The Forest Hiker", 397.0, json!({})).await;
    seed_tour(&store, "The Sea Explorer", 497.0, json!({})).await;
    let app = common::build_test_app(store.clone());

    let body = json!({ "tour": booked, "user": user, "price": 397 });
    let response = post_json_auth(app.clone(), "/api/v1/bookings", body.clone(), &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = post_json_auth(app.clone(), "/api/v1/bookings", body, &lead).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["data"]["Data"]["paid"], true);

    let json = body_json(get_auth(app.clone(), "/api/v1/bookings/my-tours", &token).await).await;
    assert_eq!(json["result"], 1);
    assert_eq!(json["data"]["Data"][0]["name"], "The Forest Hiker");

    let json = body_json(get_auth(app, "/api/v1/bookings", &lead).await).await;
    assert_eq!(json["data"]["Data"][0]["tour"]["name"], "The Forest Hiker");
    assert_eq!(json["data"]["Data"][0]["user"]["email"], "traveller@example.com");
    assert_eq!(store.collection(Booking::COLLECTION).count(&[]).await.unwrap(), 1);
}
