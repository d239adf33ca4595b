// SPDX-License-Identifier: Apache-2.0

use crate::http::api_error_response;
use crate::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use capvisor_api::ApiError;
use std::sync::atomic::Ordering;
use tracing::{info, Instrument};

const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_REQUEST_ID_LEN: usize = 128;

/// Request id attached to every request by the tracing layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    /// Error response stamped with this request id.
    #[must_use]
    pub fn reject(&self, err: ApiError) -> Response {
        api_error_response(err.with_request_id(self.0.clone()))
    }
}

#[must_use]
pub(crate) fn resolve_request_id(headers: &HeaderMap, state: &AppState) -> RequestId {
    let incoming = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(ToString::to_string);
    RequestId(incoming.unwrap_or_else(|| {
        let id = state.request_id_seed.fetch_add(1, Ordering::Relaxed);
        format!("req-{id:016x}")
    }))
}

pub(crate) async fn request_tracing_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let route = request.uri().path().to_string();
    let request_id = resolve_request_id(request.headers(), &state);
    request.extensions_mut().insert(request_id.clone());

    let span = tracing::info_span!(
        "http.request",
        request_id = %request_id.0,
        method = %method,
        route = %route,
    );
    let started = std::time::Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    span.in_scope(|| {
        info!(
            status = response.status().as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "request finished"
        );
    });
    if let Ok(value) = HeaderValue::from_str(&request_id.0) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_request_id_is_reused_and_missing_one_is_generated() {
        let state = crate::test_support::fallback_state();
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-abc"));
        assert_eq!(resolve_request_id(&headers, &state).0, "req-abc");

        let first = resolve_request_id(&HeaderMap::new(), &state);
        let second = resolve_request_id(&HeaderMap::new(), &state);
        assert!(first.0.starts_with("req-"));
        assert_eq!(first.0.len(), "req-".len() + 16);
        assert_ne!(first, second);
    }

    #[test]
    fn oversized_request_id_is_replaced() {
        let state = crate::test_support::fallback_state();
        let mut headers = HeaderMap::new();
        let long = "x".repeat(MAX_REQUEST_ID_LEN + 1);
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(&long).expect("header"));
        assert_ne!(resolve_request_id(&headers, &state).0, long);
    }
}
