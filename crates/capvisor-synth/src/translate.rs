// SPDX-License-Identifier: Apache-2.0

use crate::backend::{with_timeout, BackendError, GenerativeBackend};
use crate::{Generated, Provenance};
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

pub struct PromptTranslator {
    backend: Arc<dyn GenerativeBackend>,
    timeout: Duration,
}

impl PromptTranslator {
    #[must_use]
    pub fn new(backend: Arc<dyn GenerativeBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Never fails: upstream errors and empty replies yield [`fallback_prompt`].
    #[instrument(skip_all, fields(chars = visual_logic.chars().count()))]
    pub async fn translate(&self, visual_logic: &str) -> Generated<String> {
        match self.request(visual_logic).await {
            Ok(prompt) => Generated::new(prompt, Provenance::Model),
            Err(err) => {
                warn!(error = %err, backend = self.backend.backend_tag(), "prompt translation failed, using template");
                Generated::new(fallback_prompt(visual_logic), Provenance::Template)
            }
        }
    }

    async fn request(&self, visual_logic: &str) -> Result<String, BackendError> {
        if visual_logic.trim().is_empty() {
            return Err(BackendError::Empty);
        }
        let text = with_timeout(
            self.timeout,
            self.backend.generate_text(&translation_brief(visual_logic)),
        )
        .await?;
        let prompt = text.trim();
        if prompt.is_empty() {
            return Err(BackendError::Empty);
        }
        Ok(prompt.to_string())
    }
}

#[must_use]
pub fn translation_brief(visual_logic: &str) -> String {
    format!(
        "Translate the following visual description for an image AI into a detailed, \
         professional English prompt: \"{visual_logic}\""
    )
}

#[must_use]
pub fn fallback_prompt(visual_logic: &str) -> String {
    format!("Fashion portrait, {visual_logic}, professional studio lighting, high quality")
}
