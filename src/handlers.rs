use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::endpoint::Endpoint;
use crate::error::ApiError;
use crate::health::HealthChecker;
use crate::keys;
use crate::metrics::{MetricsCollector, Outcome};
use crate::orchestrator::{Orchestrator, RequestContext};

/// Shared application state
pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub metrics: MetricsCollector,
    pub health: HealthChecker,
    /// Request body limit in bytes.
    pub body_limit: usize,
}

/// Single entry point for every generation endpoint.
pub async fn dispatch(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let endpoint = match name.parse::<Endpoint>() {
        Ok(endpoint) => endpoint,
        Err(e) => return e.into_response(),
    };

    let ctx = RequestContext {
        device_id: keys::device_id(&headers),
        bot_token: keys::bot_token(&headers),
        remote_ip: keys::client_ip(&headers),
    };

    let result = match body {
        Ok(body) => state.orchestrator.handle(endpoint, &ctx, &body).await,
        Err(rejection) => Err(ApiError::from(rejection)),
    };
    let outcome = match &result {
        Ok(_) => Outcome::Served,
        Err(e) if e.is_rejection() => Outcome::Rejected,
        Err(_) => Outcome::Failed,
    };
    state.metrics.record(endpoint.name(), outcome).await;

    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Fallback for paths outside the API.
pub async fn not_found() -> Response {
    ApiError::UnknownEndpoint("route".to_string()).into_response()
}

/// Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.health.check_health().await)
}

/// Readiness check endpoint
pub async fn readiness_check(State(state): State<SharedState>) -> impl IntoResponse {
    if state.health.is_ready().await {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "not_ready" })),
        )
    }
}

pub async fn metrics(State(state): State<SharedState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "totals": state.metrics.totals().await,
        "endpoints": state.metrics.snapshot().await,
    }))
}
