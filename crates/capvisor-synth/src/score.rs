// SPDX-License-Identifier: Apache-2.0

use crate::entropy::RandomSource;
use async_trait::async_trait;
use std::sync::Arc;

pub const SCORE_MIN: f64 = 5.0;
pub const SCORE_MAX: f64 = 10.0;

/// Quality score of a rendered asset against its prompt, in `SCORE_MIN..=SCORE_MAX`.
#[async_trait]
pub trait AssetScorer: Send + Sync + 'static {
    async fn score(&self, image_url: &str, prompt: &str) -> f64;
}

/// Clamps to the score range and rounds to one decimal.
#[must_use]
pub fn round_score(raw: f64) -> f64 {
    if raw.is_nan() {
        return SCORE_MIN;
    }
    (raw.clamp(SCORE_MIN, SCORE_MAX) * 10.0).round() / 10.0
}

/// Placeholder scorer: uniform over the 51 one-decimal values in range.
pub struct RandomScorer {
    random: Arc<dyn RandomSource>,
}

impl RandomScorer {
    #[must_use]
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }
}

#[async_trait]
impl AssetScorer for RandomScorer {
    async fn score(&self, _image_url: &str, _prompt: &str) -> f64 {
        let tenths = self.random.below(51) as f64;
        round_score(SCORE_MIN + tenths / 10.0)
    }
}
