// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackendError {
    Unconfigured(String),
    Transport(String),
    Status { status: u16, body: String },
    Timeout(Duration),
    Malformed(String),
    Empty,
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unconfigured(what) => write!(f, "backend not configured: {what}"),
            Self::Transport(msg) => write!(f, "transport failure: {msg}"),
            Self::Status { status, body } => write!(f, "upstream status {status}: {body}"),
            Self::Timeout(limit) => write!(f, "upstream timed out after {}ms", limit.as_millis()),
            Self::Malformed(msg) => write!(f, "malformed upstream response: {msg}"),
            Self::Empty => f.write_str("upstream returned an empty result"),
        }
    }
}

impl std::error::Error for BackendError {}

/// Prompt plus a response schema constraining the JSON the model may return.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRequest {
    pub prompt: String,
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub mime_type: String,
    pub data_base64: String,
}

impl RenderedImage {
    #[must_use]
    pub fn png(data_base64: impl Into<String>) -> Self {
        Self {
            mime_type: "image/png".to_string(),
            data_base64: data_base64.into(),
        }
    }

    #[must_use]
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data_base64)
    }
}

#[async_trait]
pub trait GenerativeBackend: Send + Sync + 'static {
    fn backend_tag(&self) -> &str;
    /// Returns the raw JSON text produced under `request.schema`.
    async fn generate_structured(&self, request: &StructuredRequest) -> Result<String, BackendError>;
    async fn generate_text(&self, prompt: &str) -> Result<String, BackendError>;
}

#[async_trait]
pub trait ImageBackend: Send + Sync + 'static {
    fn backend_tag(&self) -> &str;
    async fn render(&self, spec: &str) -> Result<RenderedImage, BackendError>;
}

/// Bounds an upstream call; an elapsed limit is reported as [`BackendError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(limit)),
    }
}

/// Strips a markdown code fence some models wrap around JSON output.
#[must_use]
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_code_fence() {
        assert_eq!(strip_code_fence("```json\n[1,2]\n```"), "[1,2]");
        assert_eq!(strip_code_fence("  [1]  "), "[1]");
    }

    #[test]
    fn data_uri_embeds_mime_type() {
        assert_eq!(
            RenderedImage::png("AAAA").data_uri(),
            "data:image/png;base64,AAAA"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_limit_maps_to_timeout_error() {
        let limit = Duration::from_millis(50);
        let result: Result<(), BackendError> = with_timeout(limit, async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(BackendError::Timeout(limit)));
    }
}
