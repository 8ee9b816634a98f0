use crate::errors::QueryError;
use crate::metrics;
use crate::query::QueryService;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use telemetry::{AggregateSnapshot, ReadingFilter, TelemetryReading};
use tokio::time::Instant;
use tracing::{error, warn};

#[derive(Clone)]
struct AppState {
    service: QueryService,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    limit: Option<i64>,
}

pub fn create_router(service: QueryService) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/api/v1/recent", get(get_recent))
        .route("/api/v1/averages", get(get_averages))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn get_recent(
    State(state): State<AppState>,
    params: Result<Query<RecentQuery>, QueryRejection>,
) -> Result<Json<Vec<TelemetryReading>>, AppError> {
    let start = Instant::now();
    let result = match params {
        Ok(Query(params)) => state.service.recent(params.limit).await.map_err(AppError::from),
        Err(rejection) => Err(AppError::bad_request(rejection)),
    };
    record("recent", start, &result);

    Ok(Json(result?))
}

async fn get_averages(
    State(state): State<AppState>,
    filter: Result<Query<ReadingFilter>, QueryRejection>,
) -> Result<Json<AggregateSnapshot>, AppError> {
    let start = Instant::now();
    let result = match filter {
        Ok(Query(filter)) => state.service.averages(&filter).await.map_err(AppError::from),
        Err(rejection) => Err(AppError::bad_request(rejection)),
    };
    record("averages", start, &result);

    Ok(Json(result?))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}

fn record<T>(endpoint: &str, start: Instant, result: &Result<T, AppError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) if e.status.is_client_error() => "rejected",
        Err(_) => "failed",
    };
    metrics::observe(endpoint, outcome, start.elapsed().as_secs_f64());
}

pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    fn bad_request(err: impl Into<anyhow::Error>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: err.into(),
        }
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            error: err.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("API error: {}", self.error);
        } else {
            warn!("Rejected query: {}", self.error);
        }
        (self.status, Json(json!({ "error": self.error.to_string() }))).into_response()
    }
}
