// SPDX-License-Identifier: Apache-2.0

pub(crate) mod extract;
pub(crate) mod handlers;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use capvisor_api::{map_error, ApiError};

/// `{"error": ApiError}` with the status the error code maps to.
pub(crate) fn api_error_response(err: ApiError) -> Response {
    let status = StatusCode::from_u16(map_error(&err).status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.into_body())).into_response()
}
