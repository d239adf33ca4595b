// SPDX-License-Identifier: Apache-2.0

use crate::middleware::RequestId;
use crate::AppState;
use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use capvisor_api::ApiError;
use serde::de::DeserializeOwned;
use serde_json::json;

/// JSON body extractor whose rejections use the service error envelope.
pub(crate) struct ApiJson<T>(pub T);

fn rejection_error(rejection: &JsonRejection, limit_bytes: usize) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::payload_too_large(limit_bytes);
    }
    match rejection {
        JsonRejection::MissingJsonContentType(_) => ApiError::invalid_request(
            "expected content-type application/json",
            json!({}),
        ),
        other => ApiError::invalid_request(
            "malformed request body",
            json!({"reason": other.body_text()}),
        ),
    }
}

#[async_trait]
impl<T> FromRequest<AppState> for ApiJson<T>
where
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(|| RequestId("req-unknown".to_string()));
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(request_id.reject(rejection_error(
                &rejection,
                state.config.max_body_bytes,
            ))),
        }
    }
}
