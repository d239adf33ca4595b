// SPDX-License-Identifier: Apache-2.0

use crate::errors::ApiError;
use capvisor_model::{ParseError, TargetingParameters};
use serde_json::json;

/// Range checks a deserialized parameter set; label sets are already closed by the types.
pub fn validate_params(params: &TargetingParameters) -> Result<(), ApiError> {
    params.validate().map_err(|err| match err {
        ParseError::OutOfRange {
            field,
            min,
            max,
            actual,
        } => ApiError::invalid_request(
            format!("{field} out of range"),
            json!({"field_errors": [{"field": field, "min": min, "max": max, "value": actual}]}),
        ),
        other => ApiError::invalid_request(other.to_string(), json!({})),
    })
}

/// Text fields whose emptiness makes a request meaningless.
pub fn require_text(name: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::missing_field(name));
    }
    Ok(())
}
