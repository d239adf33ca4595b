// SPDX-License-Identifier: Apache-2.0

use crate::auth::AuthUser;
use crate::middleware::RequestId;
use crate::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use capvisor_api::ApiError;
use tracing::debug;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

/// Admits requests carrying a valid bearer token and attaches the caller as [`AuthUser`].
pub(crate) async fn require_auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(|| RequestId("req-unknown".to_string()));
    let Some(token) = bearer_token(request.headers()) else {
        return request_id.reject(ApiError::unauthorized());
    };
    match state.tokens.verify(token) {
        Ok(claims) => {
            request.extensions_mut().insert(AuthUser(claims));
            next.run(request).await
        }
        Err(err) => {
            debug!(error = %err, "bearer token rejected");
            request_id.reject(ApiError::unauthorized())
        }
    }
}
