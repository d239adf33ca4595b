// SPDX-License-Identifier: Apache-2.0

use crate::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

fn allowed_origin(headers: &HeaderMap, state: &AppState) -> Option<HeaderValue> {
    let origin = headers
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= 256)?;
    if !state.config.cors_allowed_origins.iter().any(|o| o == origin) {
        return None;
    }
    HeaderValue::from_str(origin).ok()
}

pub(crate) async fn cors_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let origin = allowed_origin(req.headers(), &state);
    if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        if let Some(origin) = origin {
            let headers = resp.headers_mut();
            headers.insert("access-control-allow-origin", origin);
            headers.insert(
                "access-control-allow-methods",
                HeaderValue::from_static("GET,POST,OPTIONS"),
            );
            headers.insert(
                "access-control-allow-headers",
                HeaderValue::from_static("authorization,content-type,x-request-id"),
            );
            headers.insert("access-control-max-age", HeaderValue::from_static("600"));
            headers.insert("vary", HeaderValue::from_static("Origin"));
        }
        return resp;
    }

    let mut resp = next.run(req).await;
    if let Some(origin) = origin {
        resp.headers_mut()
            .insert("access-control-allow-origin", origin);
        resp.headers_mut()
            .insert("access-control-expose-headers", HeaderValue::from_static("x-request-id"));
        resp.headers_mut()
            .insert("vary", HeaderValue::from_static("Origin"));
    }
    resp
}
