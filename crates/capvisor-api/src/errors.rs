// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiErrorCode {
    InvalidRequest,
    Unauthorized,
    NotFound,
    PayloadTooLarge,
    RenderFailed,
    Internal,
}

impl ApiErrorCode {
    pub const ALL: [Self; 6] = [
        Self::InvalidRequest,
        Self::Unauthorized,
        Self::NotFound,
        Self::PayloadTooLarge,
        Self::RenderFailed,
        Self::Internal,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "InvalidRequest",
            Self::Unauthorized => "Unauthorized",
            Self::NotFound => "NotFound",
            Self::PayloadTooLarge => "PayloadTooLarge",
            Self::RenderFailed => "RenderFailed",
            Self::Internal => "Internal",
        }
    }
}

impl Display for ApiErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub details: Value,
    pub request_id: String,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiError,
}

impl ApiError {
    #[must_use]
    pub fn new(
        code: ApiErrorCode,
        message: impl Into<String>,
        details: Value,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            request_id: request_id.into(),
        }
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    #[must_use]
    pub fn invalid_request(message: impl Into<String>, details: Value) -> Self {
        Self::new(ApiErrorCode::InvalidRequest, message, details, "req-unknown")
    }

    #[must_use]
    pub fn missing_field(name: &str) -> Self {
        Self::invalid_request(
            format!("missing required field: {name}"),
            json!({"field_errors": [{"field": name, "reason": "required"}]}),
        )
    }

    /// One generic message for every credential or token failure.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(
            ApiErrorCode::Unauthorized,
            "invalid credentials",
            json!({}),
            "req-unknown",
        )
    }

    #[must_use]
    pub fn not_found(path: &str) -> Self {
        Self::new(
            ApiErrorCode::NotFound,
            "route not found",
            json!({"path": path}),
            "req-unknown",
        )
    }

    #[must_use]
    pub fn payload_too_large(limit_bytes: usize) -> Self {
        Self::new(
            ApiErrorCode::PayloadTooLarge,
            "request body too large",
            json!({"limit_bytes": limit_bytes}),
            "req-unknown",
        )
    }

    #[must_use]
    pub fn render_failed(attempts: Value) -> Self {
        Self::new(
            ApiErrorCode::RenderFailed,
            "image generation failed on every configured backend",
            json!({"attempts": attempts}),
            "req-unknown",
        )
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Internal, message, json!({}), "req-unknown")
    }

    #[must_use]
    pub fn into_body(self) -> ApiErrorBody {
        ApiErrorBody { error: self }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

const _: fn() = || {
    fn assert_traits<T: Serialize + for<'de> Deserialize<'de>>() {}
    assert_traits::<ApiErrorCode>();
    assert_traits::<ApiErrorBody>();
};
