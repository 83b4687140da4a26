//! Request tracing middleware

use axum::{
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Log every request with its outcome and timing.
///
/// Each request runs inside a span carrying a request id, echoed back in the
/// `x-request-id` response header.
pub async fn request_tracing(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = tracing::info_span!("request", id = %request_id, method = %method, path = %path);
    let start = Instant::now();

    let mut response = next.run(request).instrument(span.clone()).await;

    let duration_ms = start.elapsed().as_millis();
    let status = response.status();
    span.in_scope(|| log_completion(status, duration_ms));

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

fn log_completion(status: StatusCode, duration_ms: u128) {
    let status = status.as_u16();
    if (500..600).contains(&status) {
        tracing::error!(status, duration_ms = %duration_ms, "Request completed with error");
    } else if (400..500).contains(&status) {
        tracing::warn!(status, duration_ms = %duration_ms, "Request completed with client error");
    } else {
        tracing::info!(status, duration_ms = %duration_ms, "Request completed");
    }
}
