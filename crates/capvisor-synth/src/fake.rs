// SPDX-License-Identifier: Apache-2.0

//! Scripted backends for tests and offline runs.

use crate::backend::{BackendError, GenerativeBackend, ImageBackend, RenderedImage, StructuredRequest};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Replays queued replies in order; once a queue is drained every call returns `exhausted`.
#[derive(Debug)]
pub struct FakeBackend {
    structured: Mutex<VecDeque<Result<String, BackendError>>>,
    text: Mutex<VecDeque<Result<String, BackendError>>>,
    exhausted: BackendError,
    delay: Option<Duration>,
    calls: AtomicU64,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            structured: Mutex::new(VecDeque::new()),
            text: Mutex::new(VecDeque::new()),
            exhausted: BackendError::Transport("fake backend has no scripted reply".to_string()),
            delay: None,
            calls: AtomicU64::new(0),
        }
    }
}

impl FakeBackend {
    /// Backend that fails every call, as an unconfigured deployment does.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            exhausted: BackendError::Unconfigured("fake backend".to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_structured(mut self, reply: Result<String, BackendError>) -> Self {
        self.structured
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
        self
    }

    #[must_use]
    pub fn with_text(mut self, reply: Result<String, BackendError>) -> Self {
        self.text
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    async fn next(&self, queue: &Mutex<VecDeque<Result<String, BackendError>>>) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        reply.unwrap_or_else(|| Err(self.exhausted.clone()))
    }
}

#[async_trait]
impl GenerativeBackend for FakeBackend {
    fn backend_tag(&self) -> &str {
        "fake"
    }

    async fn generate_structured(&self, _request: &StructuredRequest) -> Result<String, BackendError> {
        self.next(&self.structured).await
    }

    async fn generate_text(&self, _prompt: &str) -> Result<String, BackendError> {
        self.next(&self.text).await
    }
}

/// Image backend with a fixed outcome; remembers the last spec it was asked to render.
#[derive(Debug)]
pub struct FakeImageBackend {
    tag: String,
    outcome: Result<RenderedImage, BackendError>,
    delay: Option<Duration>,
    calls: AtomicU64,
    last_spec: Mutex<Option<String>>,
}

impl FakeImageBackend {
    #[must_use]
    pub fn succeeding(tag: &str, image: RenderedImage) -> Self {
        Self::with_outcome(tag, Ok(image))
    }

    #[must_use]
    pub fn failing(tag: &str) -> Self {
        Self::with_outcome(
            tag,
            Err(BackendError::Status {
                status: 400,
                body: "image output not supported".to_string(),
            }),
        )
    }

    #[must_use]
    pub fn with_outcome(tag: &str, outcome: Result<RenderedImage, BackendError>) -> Self {
        Self {
            tag: tag.to_string(),
            outcome,
            delay: None,
            calls: AtomicU64::new(0),
            last_spec: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn last_spec(&self) -> Option<String> {
        self.last_spec
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ImageBackend for FakeImageBackend {
    fn backend_tag(&self) -> &str {
        &self.tag
    }

    async fn render(&self, spec: &str) -> Result<RenderedImage, BackendError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        *self.last_spec.lock().unwrap_or_else(PoisonError::into_inner) = Some(spec.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}
