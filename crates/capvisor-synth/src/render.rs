// SPDX-License-Identifier: Apache-2.0

use crate::backend::{with_timeout, BackendError, ImageBackend};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const EDITORIAL_ASPECT_RATIO: &str = "3:4";

/// Wraps a subject prompt in the house editorial photography style.
#[must_use]
pub fn editorial_spec(prompt: &str) -> String {
    format!(
        "High-end commercial fashion editorial portrait.\n\
         Subject: {prompt}.\n\
         Style: Matte skin texture, butterfly lighting, high-key bright studio.\n\
         Environment: Morandi light beige backdrop, wide negative space.\n\
         Camera: Shot on 85mm f/1.2, extreme bokeh, centered symmetry, eye-level perspective.\n\
         Aesthetic: Minimalist, hyper-detailed, 8k resolution, cinematic elegance."
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderAttempt {
    pub backend: String,
    pub error: BackendError,
}

/// Every candidate failed; attempts are listed in the order they ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError {
    pub attempts: Vec<RenderAttempt>,
}

impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.attempts.is_empty() {
            return f.write_str("image generation failed: no image backend configured");
        }
        f.write_str("image generation failed:")?;
        for attempt in &self.attempts {
            write!(f, " [{}: {}]", attempt.backend, attempt.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for RenderError {}

struct RenderCandidate {
    backend: Arc<dyn ImageBackend>,
    timeout: Duration,
}

#[derive(Default)]
pub struct ImageRenderer {
    candidates: Vec<RenderCandidate>,
}

impl ImageRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_candidate(mut self, backend: Arc<dyn ImageBackend>, timeout: Duration) -> Self {
        self.candidates.push(RenderCandidate { backend, timeout });
        self
    }

    #[must_use]
    pub fn candidate_tags(&self) -> Vec<String> {
        self.candidates
            .iter()
            .map(|c| c.backend.backend_tag().to_string())
            .collect()
    }

    /// Tries candidates in order and returns the first image as a base64 data URI.
    #[instrument(skip_all, fields(candidates = self.candidates.len()))]
    pub async fn render(&self, prompt: &str) -> Result<String, RenderError> {
        let spec = editorial_spec(prompt);
        let mut attempts = Vec::new();
        for candidate in &self.candidates {
            let tag = candidate.backend.backend_tag();
            match with_timeout(candidate.timeout, candidate.backend.render(&spec)).await {
                Ok(image) if !image.data_base64.is_empty() => {
                    info!(backend = tag, failed_before = attempts.len(), "image rendered");
                    return Ok(image.data_uri());
                }
                Ok(_) => attempts.push(RenderAttempt {
                    backend: tag.to_string(),
                    error: BackendError::Empty,
                }),
                Err(error) => {
                    warn!(backend = tag, error = %error, "image candidate failed");
                    attempts.push(RenderAttempt {
                        backend: tag.to_string(),
                        error,
                    });
                }
            }
        }
        Err(RenderError { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RenderedImage;
    use crate::fake::FakeImageBackend;

    #[tokio::test]
    async fn first_successful_candidate_wins() {
        let second = Arc::new(FakeImageBackend::succeeding("second", RenderedImage::png("QUJD")));
        let third = Arc::new(FakeImageBackend::succeeding("third", RenderedImage::png("WFla")));
        let renderer = ImageRenderer::new()
            .with_candidate(Arc::new(FakeImageBackend::failing("first")), Duration::from_secs(1))
            .with_candidate(second.clone(), Duration::from_secs(1))
            .with_candidate(third.clone(), Duration::from_secs(1));
        let url = renderer.render("portrait").await.expect("render");
        assert_eq!(url, "data:image/png;base64,QUJD");
        assert_eq!(second.calls(), 1);
        assert_eq!(third.calls(), 0);
        assert!(second.last_spec().is_some_and(|s| s.contains("Subject: portrait.")));
    }

    #[tokio::test(start_paused = true)]
    async fn aggregate_error_lists_every_attempt() {
        let slow = FakeImageBackend::succeeding("slow", RenderedImage::png("QQ=="))
            .with_delay(Duration::from_secs(10));
        let renderer = ImageRenderer::new()
            .with_candidate(Arc::new(slow), Duration::from_millis(200))
            .with_candidate(Arc::new(FakeImageBackend::failing("broken")), Duration::from_secs(1))
            .with_candidate(
                Arc::new(FakeImageBackend::succeeding("blank", RenderedImage::png(""))),
                Duration::from_secs(1),
            );
        let err = renderer.render("portrait").await.expect_err("all fail");
        let tags: Vec<&str> = err.attempts.iter().map(|a| a.backend.as_str()).collect();
        assert_eq!(tags, ["slow", "broken", "blank"]);
        assert_eq!(err.attempts[0].error, BackendError::Timeout(Duration::from_millis(200)));
        assert_eq!(err.attempts[2].error, BackendError::Empty);
    }

    #[tokio::test]
    async fn no_candidates_is_an_error() {
        let err = ImageRenderer::new().render("x").await.expect_err("empty");
        assert!(err.attempts.is_empty());
        assert!(err.to_string().contains("no image backend"));
    }
}
