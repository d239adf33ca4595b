#![forbid(unsafe_code)]
//! Content synthesis engine: topic and skeleton generation with template fallbacks, prompt
//! translation, image rendering over ordered candidates, scoring, and knowledge distillation.
//!
//! Upstream model access sits behind [`GenerativeBackend`] and [`ImageBackend`]; everything
//! here runs unchanged against the scripted doubles in [`fake`].

mod backend;
mod distill;
mod entropy;
pub mod fake;
mod render;
mod score;
mod skeleton;
mod skeleton_templates;
mod topics;
mod translate;

pub use backend::{
    strip_code_fence, with_timeout, BackendError, GenerativeBackend, ImageBackend, RenderedImage,
    StructuredRequest,
};
pub use distill::{distill, DistillScheduler, DistilledLink, DISTILL_QUIET_PERIOD};
pub use entropy::{RandomSource, SeededRandom, ThreadRandom};
pub use render::{editorial_spec, ImageRenderer, RenderAttempt, RenderError, EDITORIAL_ASPECT_RATIO};
pub use score::{round_score, AssetScorer, RandomScorer, SCORE_MAX, SCORE_MIN};
pub use skeleton::{
    fallback_skeleton, parse_skeleton, portrait_prompt, skeleton_brief, skeleton_schema,
    SkeletonSynthesizer,
};
pub use skeleton_templates::topic_keyword;
pub use topics::{
    fallback_topics, parse_topics, topic_brief, topic_id, topic_schema, TopicSynthesizer,
    FALLBACK_HEAT_FLOOR, FALLBACK_HEAT_SPAN,
};
pub use translate::{fallback_prompt, translation_brief, PromptTranslator};

pub const CRATE_NAME: &str = "capvisor-synth";

/// Which path produced a synthesized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Model,
    Template,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generated<T> {
    pub value: T,
    pub provenance: Provenance,
}

impl<T> Generated<T> {
    #[must_use]
    pub fn new(value: T, provenance: Provenance) -> Self {
        Self { value, provenance }
    }

    #[must_use]
    pub fn into_value(self) -> T {
        self.value
    }
}
