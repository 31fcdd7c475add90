#![allow(dead_code)]

use std::sync::{Arc, LazyLock};

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use natours_core::types::{doc_id, Document};
use natours_db::models::{Model, Tour, User};
use natours_db::{DocumentStore, MemoryStore};
use serde_json::{json, Value};
use tower::ServiceExt;

use natours_api::auth::jwt::{generate_token, JwtConfig};
use natours_api::auth::password::hash_password;
use natours_api::config::{Environment, ServerConfig};
use natours_api::router::build_app_router;
use natours_api::state::AppState;

/// Password of every seeded user.
pub const TEST_PASSWORD: &str = "test1234";

/// Argon2 is slow in debug builds; hash once per test binary.
static TEST_PASSWORD_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password(TEST_PASSWORD).expect("hashing should succeed"));

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        environment: Environment::Development,
        database_url: None,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough".to_string(),
            expires_in_days: 90,
            cookie_expires_in_days: 90,
        },
    }
}

/// A fresh, empty in-memory store.
pub fn new_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

/// Build the full application router over `store`, with the same middleware
/// stack production uses.
pub fn build_test_app(store: Arc<MemoryStore>) -> Router {
    let config = test_config();
    let state = AppState::new(store, config.clone());
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

/// Insert a user with [`TEST_PASSWORD`] and return its id and a valid token.
pub async fn seed_user(store: &MemoryStore, name: &str, email: &str, role: &str) -> (String, String) {
    let doc = json!({
        "name": name,
        "email": email,
        "role": role,
        "photo": "default.jpg",
        "active": true,
        "password": TEST_PASSWORD_HASH.as_str(),
    });
    let created = store
        .collection(User::COLLECTION)
        .create(as_document(doc))
        .await
        .expect("seeding a user should succeed");
    let id = doc_id(&created).expect("created user has an id").to_string();
    let token = generate_token(&id, &test_config().jwt).expect("token generation should succeed");
    (id, token)
}

/// A valid tour body; `overrides` replace or add fields.
pub fn tour_body(name: &str, price: f64, overrides: Value) -> Value {
    let mut body = json!({
        "name": name,
        "duration": 5,
        "maxGroupSize": 10,
        "difficulty": "easy",
        "price": price,
        "summary": "A tour used in tests",
        "imageCover": "tour-cover.jpg",
    });
    if let (Some(base), Value::Object(extra)) = (body.as_object_mut(), overrides) {
        base.extend(extra);
    }
    body
}

/// Insert a tour through the model (defaults and slug applied) and return
/// its id.
pub async fn seed_tour(store: &MemoryStore, name: &str, price: f64, overrides: Value) -> String {
    let mut tour = Tour::from_document(&as_document(tour_body(name, price, overrides)))
        .expect("tour body should deserialize");
    tour.check().expect("tour body should validate");
    tour.prepare();
    let created = store
        .collection(Tour::COLLECTION)
        .create(tour.to_document().expect("tour should serialize"))
        .await
        .expect("seeding a tour should succeed");
    doc_id(&created).expect("created tour has an id").to_string()
}

pub fn as_document(value: Value) -> Document {
    value.as_object().cloned().expect("expected a JSON object")
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

async fn send(app: Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn patch_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response {
    send(app, Method::PATCH, uri, Some(token), Some(body)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, Method::DELETE, uri, Some(token), None).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Names of the entities in a list envelope, in order.
pub fn names(json: &Value) -> Vec<String> {
    json["data"]["Data"]
        .as_array()
        .expect("expected a list envelope")
        .iter()
        .map(|doc| doc["name"].as_str().unwrap_or_default().to_string())
        .collect()
}
