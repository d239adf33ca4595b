// SPDX-License-Identifier: Apache-2.0

use super::{http_client, post_json_with_retry};
use crate::config::{GeminiConfig, RetryPolicy};
use async_trait::async_trait;
use capvisor_synth::{
    BackendError, GenerativeBackend, ImageBackend, RenderedImage, StructuredRequest,
    EDITORIAL_ASPECT_RATIO,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

/// Shared connection and credentials for the Generative Language API.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    api_key: Option<Arc<str>>,
    retry: RetryPolicy,
}

impl GeminiClient {
    #[must_use]
    pub fn new(config: &GeminiConfig) -> Self {
        Self {
            http: http_client(),
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            api_key: config
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(Arc::from),
            retry: config.retry.clone(),
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate_content(&self, model: &str, body: &Value) -> Result<Value, BackendError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| BackendError::Unconfigured("GEMINI_API_KEY".to_string()))?;
        let url = format!("{}/v1beta/models/{model}:generateContent", self.base_url);
        post_json_with_retry(
            || self.http.post(&url).header("x-goog-api-key", key),
            body,
            &self.retry,
            model,
        )
        .await
    }
}

fn user_turn(text: &str) -> Value {
    json!([{"role": "user", "parts": [{"text": text}]}])
}

fn first_candidate_parts(reply: &Value) -> Result<&Vec<Value>, BackendError> {
    if let Some(reason) = reply
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
    {
        return Err(BackendError::Malformed(format!("prompt blocked: {reason}")));
    }
    reply
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or(BackendError::Empty)
}

/// Concatenated text parts of the first candidate.
pub fn extract_text(reply: &Value) -> Result<String, BackendError> {
    let text: String = first_candidate_parts(reply)?
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        return Err(BackendError::Empty);
    }
    Ok(text)
}

/// First inline image part of the first candidate.
pub fn extract_inline_image(reply: &Value) -> Result<RenderedImage, BackendError> {
    first_candidate_parts(reply)?
        .iter()
        .filter_map(|part| part.get("inlineData"))
        .find_map(|inline| {
            let data = inline.get("data").and_then(Value::as_str)?;
            if data.is_empty() {
                return None;
            }
            let mime = inline
                .get("mimeType")
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            Some(RenderedImage {
                mime_type: mime.to_string(),
                data_base64: data.to_string(),
            })
        })
        .ok_or(BackendError::Empty)
}

pub struct GeminiBackend {
    client: GeminiClient,
    model: String,
}

impl GeminiBackend {
    #[must_use]
    pub fn new(client: GeminiClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    fn backend_tag(&self) -> &str {
        &self.model
    }

    #[instrument(name = "gemini_generate_structured", skip_all, fields(model = %self.model))]
    async fn generate_structured(&self, request: &StructuredRequest) -> Result<String, BackendError> {
        let body = json!({
            "contents": user_turn(&request.prompt),
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": request.schema,
            }
        });
        let reply = self.client.generate_content(&self.model, &body).await?;
        extract_text(&reply)
    }

    #[instrument(name = "gemini_generate_text", skip_all, fields(model = %self.model))]
    async fn generate_text(&self, prompt: &str) -> Result<String, BackendError> {
        let body = json!({ "contents": user_turn(prompt) });
        let reply = self.client.generate_content(&self.model, &body).await?;
        extract_text(&reply)
    }
}

/// Image generation through a Gemini model with image output.
pub struct GeminiImageBackend {
    client: GeminiClient,
    model: String,
}

impl GeminiImageBackend {
    #[must_use]
    pub fn new(client: GeminiClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl ImageBackend for GeminiImageBackend {
    fn backend_tag(&self) -> &str {
        &self.model
    }

    #[instrument(name = "gemini_render", skip_all, fields(model = %self.model))]
    async fn render(&self, spec: &str) -> Result<RenderedImage, BackendError> {
        let body = json!({
            "contents": user_turn(spec),
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": {"aspectRatio": EDITORIAL_ASPECT_RATIO},
            }
        });
        let reply = self.client.generate_content(&self.model, &body).await?;
        extract_inline_image(&reply)
    }
}
