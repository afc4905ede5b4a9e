use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::keys;

/// Logs one line per request: endpoint, device hash, status, error code and latency.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let device = keys::device_fingerprint(&keys::device_id(request.headers()));
    let request_id = Uuid::new_v4();
    let started = Instant::now();

    let span = tracing::info_span!("request", %request_id);
    let response = next.run(request).instrument(span.clone()).await;

    let status = response.status();
    let code = response
        .extensions()
        .get::<ErrorCode>()
        .map_or("-", |code| code.0);

    span.in_scope(|| {
        info!(
            target: "pawgate::middleware",
            method = %method,
            endpoint = %endpoint_name(&path),
            device = %device,
            status = status.as_u16(),
            code,
            latency_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );
    });

    response
}

fn endpoint_name(path: &str) -> &str {
    path.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or(path)
}
