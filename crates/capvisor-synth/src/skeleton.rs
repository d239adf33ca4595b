// SPDX-License-Identifier: Apache-2.0

use crate::backend::{strip_code_fence, with_timeout, BackendError, GenerativeBackend, StructuredRequest};
use crate::skeleton_templates::{headline_pool, pick, script_pool, visual_logic_pool, TemplateContext};
use crate::{Generated, Provenance};
use capvisor_model::{
    best_match, find_by_l2, AssetCardData, LogicType, TargetingParameters, TopicCard, VisualStatus,
    KNOWLEDGE_BASE,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub struct SkeletonSynthesizer {
    backend: Arc<dyn GenerativeBackend>,
    timeout: Duration,
}

impl SkeletonSynthesizer {
    #[must_use]
    pub fn new(backend: Arc<dyn GenerativeBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Returns exactly `params.volume` skeleton cards.
    #[instrument(skip_all, fields(topic_id = %topic.id, volume = params.volume))]
    pub async fn generate(
        &self,
        topic: &TopicCard,
        params: &TargetingParameters,
    ) -> Generated<Vec<AssetCardData>> {
        let request = StructuredRequest {
            prompt: skeleton_brief(topic, params),
            schema: skeleton_schema(),
        };
        let reply = with_timeout(self.timeout, self.backend.generate_structured(&request)).await;
        match reply.and_then(|text| parse_skeleton(&text, topic, params)) {
            Ok(stream) => {
                info!(pages = stream.len(), backend = self.backend.backend_tag(), "skeleton generated");
                Generated::new(stream, Provenance::Model)
            }
            Err(err) => {
                warn!(error = %err, backend = self.backend.backend_tag(), "skeleton generation failed, using templates");
                Generated::new(fallback_skeleton(topic, params), Provenance::Template)
            }
        }
    }
}

#[must_use]
pub fn skeleton_brief(topic: &TopicCard, params: &TargetingParameters) -> String {
    let logic_types: Vec<String> = LogicType::ALL
        .iter()
        .map(|t| format!("'{}'", t.label()))
        .collect();
    format!(
        "Create a Content Asset Stream (CAS) for the topic: \"{title}\".\n\
         Parameters: Face Shape {face}, Hat {hat}, Pages {volume}.\n\n\
         For each page (total {volume}), generate:\n\
         1. logicType: One of [{logic_types}]\n\
         2. visualLogic: Describe the visual content focus in Chinese.\n\
         3. prompt: Translate visualLogic into a detailed English AI image generation prompt.\n\
         4. headline: A catchy title for that page.\n\
         5. l1Knowledge: A core aesthetic principle.\n\
         6. l2Knowledge: A practical formula.\n\
         7. script: Short-form video/social media caption text for this page.\n\n\
         Output a JSON array.",
        title = topic.title,
        face = params.face_shape,
        hat = params.hat_type,
        volume = params.volume,
        logic_types = logic_types.join(", "),
    )
}

#[must_use]
pub fn skeleton_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "logicType": { "type": "STRING" },
                "visualLogic": { "type": "STRING" },
                "prompt": { "type": "STRING" },
                "headline": { "type": "STRING" },
                "l1Knowledge": { "type": "STRING" },
                "l2Knowledge": { "type": "STRING" },
                "script": { "type": "STRING" }
            }
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawPage {
    logic_type: String,
    visual_logic: String,
    prompt: String,
    headline: String,
    l1_knowledge: String,
    l2_knowledge: String,
    script: String,
}

/// Normalizes a model reply to `params.volume` cards. Blank fields are taken from the
/// template page at the same index so no card reaches the editor half empty.
pub fn parse_skeleton(
    text: &str,
    topic: &TopicCard,
    params: &TargetingParameters,
) -> Result<Vec<AssetCardData>, BackendError> {
    let pages: Vec<RawPage> = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| BackendError::Malformed(format!("page array: {e}")))?;
    if pages.is_empty() {
        return Err(BackendError::Empty);
    }
    let volume = params.volume as usize;
    let cx = TemplateContext::new(&topic.title, params);
    let supplied = pages.len();

    let mut stream: Vec<AssetCardData> = pages
        .into_iter()
        .take(volume)
        .enumerate()
        .map(|(i, page)| normalize_page(page, fallback_card(&cx, params, i)))
        .collect();
    stream.extend((stream.len()..volume).map(|i| fallback_card(&cx, params, i)));
    if supplied != volume {
        debug!(supplied, volume, "page count normalized");
    }
    Ok(stream)
}

fn normalize_page(page: RawPage, template: AssetCardData) -> AssetCardData {
    let logic_type = page
        .logic_type
        .trim()
        .parse::<LogicType>()
        .unwrap_or(template.logic_type);
    let mut card = AssetCardData {
        id: template.id,
        logic_type,
        visual_status: VisualStatus::Skeleton,
        visual_logic: or_template(page.visual_logic, template.visual_logic),
        prompt: or_template(page.prompt, template.prompt),
        image_url: None,
        headline: or_template(page.headline, template.headline),
        l1_knowledge: String::new(),
        l2_knowledge: String::new(),
        script: or_template(page.script, template.script),
        score: None,
    };
    let labels = format!("{} {}", page.l1_knowledge, page.l2_knowledge);
    let knowledge = find_by_l2(page.l2_knowledge.trim())
        .or_else(|| best_match(&labels))
        .or_else(|| best_match(&card.script));
    match knowledge {
        Some(item) => card.link_knowledge(item),
        None => card.clear_knowledge(),
    }
    card
}

fn or_template(value: String, template: String) -> String {
    if value.trim().is_empty() {
        template
    } else {
        value
    }
}

/// Template stream; a pure function of topic title and parameters.
#[must_use]
pub fn fallback_skeleton(topic: &TopicCard, params: &TargetingParameters) -> Vec<AssetCardData> {
    let cx = TemplateContext::new(&topic.title, params);
    (0..params.volume as usize)
        .map(|i| fallback_card(&cx, params, i))
        .collect()
}

fn fallback_card(cx: &TemplateContext<'_>, params: &TargetingParameters, index: usize) -> AssetCardData {
    let logic_type = LogicType::for_page(index);
    let knowledge = &KNOWLEDGE_BASE[index % KNOWLEDGE_BASE.len()];
    let visual_logic = pick(visual_logic_pool(logic_type, cx), index);
    let mut card = AssetCardData {
        id: AssetCardData::card_id(index),
        logic_type,
        visual_status: VisualStatus::Skeleton,
        prompt: portrait_prompt(params, &visual_logic),
        visual_logic,
        image_url: None,
        headline: pick(headline_pool(logic_type, cx), index),
        l1_knowledge: String::new(),
        l2_knowledge: String::new(),
        script: pick(script_pool(logic_type, cx), index),
        score: None,
    };
    card.link_knowledge(knowledge);
    card
}

#[must_use]
pub fn portrait_prompt(params: &TargetingParameters, visual_logic: &str) -> String {
    format!(
        "Fashion portrait, {} face shape, {}, {visual_logic}, professional studio lighting, \
         high-key lighting, soft shadows, elegant composition, 8k resolution, high quality",
        params.face_shape, params.hat_type
    )
}
