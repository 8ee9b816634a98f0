use analytics::query::QueryService;
use analytics::rest::create_router;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use telemetry::testing::{sample_reading, MemoryStore};
use tower::ServiceExt; // for `oneshot`

fn app(store: MemoryStore) -> Router {
    create_router(QueryService::new(Arc::new(store)))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn three_readings() -> MemoryStore {
    MemoryStore::with_readings([
        sample_reading("sensor-001", 1, 10.0),
        sample_reading("sensor-002", 2, 20.0),
        sample_reading("sensor-004", 3, 30.0),
    ])
}

#[tokio::test]
async fn test_recent_is_newest_first() {
    let (status, body) = get(app(three_readings()), "/api/v1/recent?limit=2").await;

    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["sensorId"], "sensor-004");
    assert_eq!(rows[1]["sensorId"], "sensor-002");
    assert_eq!(rows[0]["status"], "ok");
}

#[tokio::test]
async fn test_recent_defaults_and_empty_store() {
    let (status, body) = get(app(three_readings()), "/api/v1/recent").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (status, body) = get(app(MemoryStore::new()), "/api/v1/recent").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));
}

#[tokio::test]
async fn test_recent_rejects_bad_limit() {
    for uri in ["/api/v1/recent?limit=0", "/api/v1/recent?limit=-5", "/api/v1/recent?limit=ten"] {
        let (status, body) = get(app(three_readings()), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_averages() {
    let (status, body) = get(app(three_readings()), "/api/v1/averages").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["avgTemperature"], 20.0);
    assert_eq!(body["avgHumidity"], 55.0);
    assert_eq!(body["sampleCount"], 3);
}

#[tokio::test]
async fn test_filtered_averages() {
    let (status, body) = get(
        app(three_readings()),
        "/api/v1/averages?sensorId=sensor-002",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["avgTemperature"], 20.0);
    assert_eq!(body["sampleCount"], 1);

    let (_, body) = get(
        app(three_readings()),
        "/api/v1/averages?since=2023-11-14T22:13:22Z",
    )
    .await;
    assert_eq!(body["sampleCount"], 2);
    assert_eq!(body["avgTemperature"], 25.0);
}

#[tokio::test]
async fn test_empty_averages_are_null() {
    let (status, body) = get(app(MemoryStore::new()), "/api/v1/averages").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sampleCount"], 0);
    assert!(body["avgTemperature"].is_null());
    assert!(body["avgHumidity"].is_null());
    assert!(body["avgPollution"].is_null());
}

#[tokio::test]
async fn test_inverted_window_is_rejected() {
    let (status, body) = get(
        app(three_readings()),
        "/api/v1/averages?since=2024-01-02T00:00:00Z&until=2024-01-01T00:00:00Z",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("after"));
}

#[tokio::test]
async fn test_store_failure_is_distinct_from_empty() {
    let store = MemoryStore::new();
    store.set_fail_reads(true);
    let app = app(store);

    let (status, body) = get(app.clone(), "/api/v1/recent").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());

    let (status, _) = get(app, "/api/v1/averages").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get(app(MemoryStore::new()), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "status": "ok" }));
}
