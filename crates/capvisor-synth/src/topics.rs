// SPDX-License-Identifier: Apache-2.0

use crate::backend::{strip_code_fence, with_timeout, BackendError, GenerativeBackend, StructuredRequest};
use crate::entropy::RandomSource;
use crate::{Generated, Provenance};
use capvisor_model::{TargetingParameters, TopicCard, DEFAULT_SCENE, TOPIC_BATCH_SIZE};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const FALLBACK_HEAT_FLOOR: u64 = 60;
pub const FALLBACK_HEAT_SPAN: u64 = 40;

pub struct TopicSynthesizer {
    backend: Arc<dyn GenerativeBackend>,
    random: Arc<dyn RandomSource>,
    timeout: Duration,
}

impl TopicSynthesizer {
    #[must_use]
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        random: Arc<dyn RandomSource>,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            random,
            timeout,
        }
    }

    /// Always yields a full batch; any primary failure is absorbed by the template fallback.
    #[instrument(skip_all, fields(face_shape = %params.face_shape, hat_type = %params.hat_type))]
    pub async fn generate(&self, params: &TargetingParameters) -> Generated<Vec<TopicCard>> {
        match self.request_topics(params).await {
            Ok(topics) => {
                info!(count = topics.len(), backend = self.backend.backend_tag(), "topics generated");
                Generated::new(topics, Provenance::Model)
            }
            Err(err) => {
                warn!(error = %err, backend = self.backend.backend_tag(), "topic generation failed, using templates");
                Generated::new(
                    fallback_topics(params, self.random.as_ref()),
                    Provenance::Template,
                )
            }
        }
    }

    async fn request_topics(&self, params: &TargetingParameters) -> Result<Vec<TopicCard>, BackendError> {
        let request = StructuredRequest {
            prompt: topic_brief(params),
            schema: topic_schema(),
        };
        let text = with_timeout(self.timeout, self.backend.generate_structured(&request)).await?;
        parse_topics(&text)
    }
}

#[must_use]
pub fn topic_brief(params: &TargetingParameters) -> String {
    format!(
        "As a fashion content expert, generate {count} content topics for a \"Hat x Face Shape\" brand.\n\
         Target Audience: People with {face} face shape.\n\
         Product Focus: {hat}.\n\
         Context: {scenes}.\n\
         Pain Points: {origins}.\n\
         Depth Level: {depth}/3.\n\n\
         Output a JSON array of objects with fields: id, title, heat (1-100), summary.",
        count = TOPIC_BATCH_SIZE,
        face = params.face_shape,
        hat = params.hat_type,
        scenes = params.scene.join(", "),
        origins = params.origin.join(", "),
        depth = params.depth,
    )
}

#[must_use]
pub fn topic_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "title": { "type": "STRING" },
                "heat": { "type": "NUMBER" },
                "summary": { "type": "STRING" }
            },
            "required": ["id", "title", "heat", "summary"]
        }
    })
}

#[derive(Debug, Deserialize)]
struct RawTopic {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    title: String,
    heat: f64,
    #[serde(default)]
    summary: String,
}

/// Normalizes a model reply into exactly one batch of topics.
pub fn parse_topics(text: &str) -> Result<Vec<TopicCard>, BackendError> {
    let raw: Vec<RawTopic> = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| BackendError::Malformed(format!("topic array: {e}")))?;
    let usable: Vec<RawTopic> = raw
        .into_iter()
        .filter(|t| !t.title.trim().is_empty())
        .take(TOPIC_BATCH_SIZE)
        .collect();
    if usable.is_empty() {
        return Err(BackendError::Empty);
    }
    if usable.len() < TOPIC_BATCH_SIZE {
        return Err(BackendError::Malformed(format!(
            "expected {TOPIC_BATCH_SIZE} topics, got {}",
            usable.len()
        )));
    }

    let ids: Vec<Option<String>> = usable.iter().map(|t| raw_id(t.id.as_ref())).collect();
    let mut seen = HashSet::new();
    let ids_usable = ids
        .iter()
        .all(|id| id.as_ref().is_some_and(|id| seen.insert(id.clone())));

    Ok(usable
        .into_iter()
        .zip(ids)
        .enumerate()
        .map(|(i, (topic, id))| TopicCard {
            id: match id {
                Some(id) if ids_usable => id,
                _ => topic_id(i),
            },
            title: topic.title.trim().to_string(),
            heat: if topic.heat.is_finite() {
                topic.heat.clamp(1.0, 100.0)
            } else {
                1.0
            },
            summary: topic.summary,
        })
        .collect())
}

fn raw_id(value: Option<&Value>) -> Option<String> {
    let id = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

#[must_use]
pub fn topic_id(index: usize) -> String {
    format!("topic-{}", index + 1)
}

/// Eight template topics covering technique, pain point, scene, principle, cut, colour,
/// pitfalls and celebrity angles.
#[must_use]
pub fn fallback_topics(params: &TargetingParameters, random: &dyn RandomSource) -> Vec<TopicCard> {
    let face = params.face_shape.label();
    let hat = params.hat_type.label();
    let origin = params.primary_origin();
    let scene = params.scene_at(0).unwrap_or(DEFAULT_SCENE);
    let scenes = params.scenes_joined("、");

    let templates: [(String, String); TOPIC_BATCH_SIZE] = [
        (
            format!("{face}如何选择{hat}？这3个技巧必须知道"),
            format!("深度解析{face}脸型与{hat}的搭配原理，从视觉重心到色彩心理，全面解析搭配技巧"),
        ),
        (
            format!("{face}{origin}？{hat}帮你秒变V脸"),
            format!("针对{origin}痛点，{hat}如何通过视觉错觉原理实现显脸小的效果"),
        ),
        (
            format!("{scene}场景下，{face}的{hat}穿搭指南"),
            format!("结合{scenes}等实际场景，为{face}提供{hat}的实用穿搭方案"),
        ),
        (
            format!("从美学原理到实战：{face} x {hat}的完整攻略"),
            format!("从黄金比例、视觉重心转移等美学原理出发，深入解析{hat}如何优化{face}的视觉效果"),
        ),
        (
            format!("{hat}的版型选择：{face}必看的5个细节"),
            format!("帽檐宽度、帽冠高度、材质选择等细节如何影响{face}的搭配效果，专业解析版型选择技巧"),
        ),
        (
            format!("色彩心理学：{hat}的颜色如何影响{face}的视觉美感"),
            format!("不同颜色的{hat}如何通过色彩心理学原理提升{face}的肤色和整体美感"),
        ),
        (
            format!("{face}的{hat}搭配误区，你中了几个？"),
            format!("盘点{face}在选择{hat}时常见的搭配误区，帮助避免踩雷，找到最适合的款式"),
        ),
        (
            format!("明星同款分析：{face}女星的{hat}穿搭密码"),
            format!("分析同是{face}脸型的明星如何选择{hat}，学习她们的穿搭技巧和搭配思路"),
        ),
    ];

    templates
        .into_iter()
        .enumerate()
        .map(|(i, (title, summary))| TopicCard {
            id: topic_id(i),
            title,
            heat: (FALLBACK_HEAT_FLOOR + random.below(FALLBACK_HEAT_SPAN)) as f64,
            summary,
        })
        .collect()
}
