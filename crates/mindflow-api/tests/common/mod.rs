//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use mindflow_store::PgCustomerRepository;
use mindflow_test_support::FixedClock;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use mindflow_api::state::AppState;

/// Build the full app router with a real `PgCustomerRepository` and a clock
/// fixed at 2026-01-15T10:00:00Z. Uses the same route structure as `main.rs`.
pub fn build_test_app(pool: PgPool) -> Router {
    let clock = Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ));
    let customers = Arc::new(PgCustomerRepository::new(pool));
    mindflow_api::app(AppState::new(clock, customers))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, json_request("POST", uri, body)).await
}

/// Send a PUT request with a JSON body and return the response.
pub async fn put_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, json_request("PUT", uri, body)).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, empty_request("GET", uri)).await
}

/// Send a DELETE request and return the response.
pub async fn delete(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, empty_request("DELETE", uri)).await
}

/// Create a customer through the API and return its id.
pub async fn create_customer(app: Router, name: &str) -> String {
    let (status, json) = post_json(
        app,
        "/api/v1/customers",
        &serde_json::json!({ "customerName": name, "customerType": "PRODUCTION" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_str().unwrap().to_owned()
}

/// Insert a job row referencing the customer.
pub async fn insert_job(pool: &PgPool, customer_id: &str) {
    sqlx::query("INSERT INTO jobs (id, customer_id, job_name) VALUES ($1, $2, $3)")
        .bind(Uuid::new_v4())
        .bind(Uuid::parse_str(customer_id).unwrap())
        .bind("Lot 12")
        .execute(pool)
        .await
        .unwrap();
}
