//! Request ID middleware for log correlation.
//!
//! Every request gets an `x-request-id` (propagated if the caller sent one),
//! and its completion is logged and counted once here rather than in each
//! handler.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use super::middleware::caller_id;
use crate::{logging, metrics};

/// Header name for request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest inbound request id we propagate
const MAX_REQUEST_ID_LEN: usize = 128;

fn get_or_generate_request_id(headers: &axum::http::HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= MAX_REQUEST_ID_LEN)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Tag the request with an id, echo it on the response, and record the
/// request in logs and metrics.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = get_or_generate_request_id(request.headers());

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let user_id = caller_id(request.headers());
    let started = Instant::now();

    let span = tracing::info_span!("request", request_id = %request_id);
    span.in_scope(|| tracing::debug!(method = %method, path = %path, "Request started"));
    let response = next.run(request).instrument(span.clone()).await;

    let (mut parts, body) = response.into_parts();
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        parts.headers.insert(REQUEST_ID_HEADER, header_value);
    }

    let elapsed = started.elapsed();
    let status = parts.status.as_u16();
    span.in_scope(|| {
        logging::log_api_request(&method, &path, status, elapsed.as_millis() as u64, user_id)
    });
    metrics::http_requests_total(&method, &path, status);
    metrics::http_request_duration_ms(&method, &path, elapsed.as_secs_f64() * 1000.0);

    Response::from_parts(parts, body)
}
