// SPDX-License-Identifier: Apache-2.0

mod gemini;
mod imagen;

pub use gemini::{extract_inline_image, extract_text, GeminiBackend, GeminiClient, GeminiImageBackend};
pub use imagen::{extract_prediction, ImagenBackend};

use crate::config::{ApiConfig, RetryPolicy};
use capvisor_synth::{BackendError, GenerativeBackend, ImageBackend};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

fn retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// POSTs JSON and returns the decoded reply, retrying transport failures, 429 and 5xx.
#[instrument(name = "upstream_post_json", skip(request, body, retry))]
pub(crate) async fn post_json_with_retry(
    request: impl Fn() -> reqwest::RequestBuilder,
    body: &Value,
    retry: &RetryPolicy,
    target: &str,
) -> Result<Value, BackendError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let failure = match request().json(body).send().await {
            Ok(resp) if resp.status().is_success() => {
                return resp
                    .json::<Value>()
                    .await
                    .map_err(|e| BackendError::Malformed(format!("decode body: {e}")));
            }
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                let err = BackendError::Status {
                    status: status.as_u16(),
                    body: truncate(&text, 512),
                };
                if !retryable(status) {
                    return Err(err);
                }
                err
            }
            Err(e) => BackendError::Transport(e.to_string()),
        };
        if attempt >= retry.max_attempts {
            return Err(failure);
        }
        debug!(attempt, error = %failure, "retrying upstream call");
        tokio::time::sleep(Duration::from_millis(
            retry.base_backoff_ms.saturating_mul(attempt as u64),
        ))
        .await;
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Text backend and ordered image candidates for a configuration.
pub struct UpstreamBackends {
    pub text: Arc<dyn GenerativeBackend>,
    pub images: Vec<Arc<dyn ImageBackend>>,
    /// False when no usable API key is set; every call then takes the fallback path.
    pub configured: bool,
}

#[must_use]
pub fn backends_from_config(config: &ApiConfig) -> UpstreamBackends {
    let client = GeminiClient::new(&config.gemini);
    let text: Arc<dyn GenerativeBackend> =
        Arc::new(GeminiBackend::new(client.clone(), &config.gemini.text_model));
    let mut images: Vec<Arc<dyn ImageBackend>> = config
        .gemini
        .image_models
        .iter()
        .map(|model| Arc::new(GeminiImageBackend::new(client.clone(), model)) as Arc<dyn ImageBackend>)
        .collect();
    if let Some(project) = &config.gemini.cloud_project_id {
        images.push(Arc::new(ImagenBackend::new(
            project,
            &config.gemini.cloud_location,
            config.gemini.api_key.clone(),
            config.gemini.retry.clone(),
        )));
    }
    UpstreamBackends {
        text,
        images,
        configured: client.is_configured(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeminiConfig;

    #[test]
    fn blank_key_leaves_backends_unconfigured() {
        let mut config = ApiConfig::default();
        config.gemini = GeminiConfig {
            api_key: Some("   ".to_string()),
            ..GeminiConfig::default()
        };
        assert!(!backends_from_config(&config).configured);
        config.gemini.api_key = Some("k".to_string());
        assert!(backends_from_config(&config).configured);
    }

    #[test]
    fn cloud_project_appends_imagen_last() {
        let mut config = ApiConfig::default();
        config.gemini.cloud_project_id = Some("proj-1".to_string());
        let backends = backends_from_config(&config);
        assert_eq!(backends.images.len(), config.gemini.image_models.len() + 1);
        assert_eq!(
            backends.images.last().map(|b| b.backend_tag().to_string()),
            Some("imagegeneration@006".to_string())
        );
    }
}
