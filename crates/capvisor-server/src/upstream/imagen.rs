// SPDX-License-Identifier: Apache-2.0

use super::{http_client, post_json_with_retry};
use crate::config::RetryPolicy;
use async_trait::async_trait;
use capvisor_synth::{BackendError, ImageBackend, RenderedImage, EDITORIAL_ASPECT_RATIO};
use serde_json::{json, Value};
use tracing::instrument;

const IMAGEN_MODEL: &str = "imagegeneration@006";

/// Vertex AI Imagen `predict`, used after the Gemini image models when a cloud project is set.
pub struct ImagenBackend {
    http: reqwest::Client,
    endpoint: String,
    bearer: Option<String>,
    retry: RetryPolicy,
}

impl ImagenBackend {
    #[must_use]
    pub fn new(project: &str, location: &str, bearer: Option<String>, retry: RetryPolicy) -> Self {
        Self {
            http: http_client(),
            endpoint: format!(
                "https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/google/models/{IMAGEN_MODEL}:predict"
            ),
            bearer: bearer.filter(|b| !b.trim().is_empty()),
            retry,
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

pub fn extract_prediction(reply: &Value) -> Result<RenderedImage, BackendError> {
    let prediction = reply.pointer("/predictions/0").ok_or(BackendError::Empty)?;
    let data = prediction
        .get("bytesBase64Encoded")
        .and_then(Value::as_str)
        .filter(|d| !d.is_empty())
        .ok_or(BackendError::Empty)?;
    let mime = prediction
        .get("mimeType")
        .and_then(Value::as_str)
        .unwrap_or("image/png");
    Ok(RenderedImage {
        mime_type: mime.to_string(),
        data_base64: data.to_string(),
    })
}

#[async_trait]
impl ImageBackend for ImagenBackend {
    fn backend_tag(&self) -> &str {
        IMAGEN_MODEL
    }

    #[instrument(name = "imagen_render", skip_all)]
    async fn render(&self, spec: &str) -> Result<RenderedImage, BackendError> {
        let bearer = self
            .bearer
            .as_deref()
            .ok_or_else(|| BackendError::Unconfigured("GEMINI_API_KEY".to_string()))?;
        let body = json!({
            "instances": [{"prompt": spec}],
            "parameters": {"sampleCount": 1, "aspectRatio": EDITORIAL_ASPECT_RATIO},
        });
        let reply = post_json_with_retry(
            || self.http.post(&self.endpoint).bearer_auth(bearer),
            &body,
            &self.retry,
            IMAGEN_MODEL,
        )
        .await?;
        extract_prediction(&reply)
    }
}
