// SPDX-License-Identifier: Apache-2.0

use crate::knowledge::{find_by_l2, KnowledgeItem};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const TOPIC_BATCH_SIZE: usize = 8;

labelled_enum! {
    LogicType, "logicType", 5 {
        Intro => ("引入", "intro"),
        PainPointAnalysis => ("痛点分析", "pain-point-analysis"),
        AestheticPrinciple => ("美学原理", "aesthetic-principle"),
        Solution => ("解决方案", "solution"),
        ProductPitch => ("产品种草", "product-pitch"),
    }
}

impl LogicType {
    /// Narrative role of a page when roles cycle in catalog order.
    #[must_use]
    pub const fn for_page(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }
}

labelled_enum! {
    VisualStatus, "visualStatus", 3 {
        Skeleton => ("skeleton", "skeleton"),
        Rendering => ("rendering", "rendering"),
        Done => ("done", "done"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicCard {
    pub id: String,
    pub title: String,
    pub heat: f64,
    pub summary: String,
}

/// One page of a content asset stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetCardData {
    pub id: String,
    pub logic_type: LogicType,
    pub visual_status: VisualStatus,
    pub visual_logic: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub headline: String,
    #[serde(default)]
    pub l1_knowledge: String,
    #[serde(default)]
    pub l2_knowledge: String,
    pub script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CardStateError {
    AlreadyRendering(String),
    NotRendering(String),
}

impl Display for CardStateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRendering(id) => write!(f, "card {id} is already rendering"),
            Self::NotRendering(id) => write!(f, "card {id} has no render in flight"),
        }
    }
}

impl std::error::Error for CardStateError {}

impl AssetCardData {
    #[must_use]
    pub fn card_id(index: usize) -> String {
        format!("card-{index}")
    }

    #[must_use]
    pub fn knowledge(&self) -> Option<&'static KnowledgeItem> {
        find_by_l2(&self.l2_knowledge)
    }

    /// Sets both knowledge labels from one catalog entry.
    pub fn link_knowledge(&mut self, item: &KnowledgeItem) {
        self.l1_knowledge = item.l1.to_string();
        self.l2_knowledge = item.l2.to_string();
    }

    pub fn clear_knowledge(&mut self) {
        self.l1_knowledge.clear();
        self.l2_knowledge.clear();
    }

    /// Enters `rendering`; a card already rendering is rejected.
    pub fn begin_render(&mut self) -> Result<(), CardStateError> {
        match self.visual_status {
            VisualStatus::Rendering => Err(CardStateError::AlreadyRendering(self.id.clone())),
            VisualStatus::Skeleton | VisualStatus::Done => {
                self.visual_status = VisualStatus::Rendering;
                Ok(())
            }
        }
    }

    pub fn complete_render(&mut self, image_url: String, score: f64) -> Result<(), CardStateError> {
        self.ensure_rendering()?;
        self.image_url = Some(image_url);
        self.score = Some(score);
        self.visual_status = VisualStatus::Done;
        Ok(())
    }

    /// Returns a failed render to `skeleton`. A card that never rendered stays without image
    /// or score; an earlier successful artifact is kept.
    pub fn fail_render(&mut self) -> Result<(), CardStateError> {
        self.ensure_rendering()?;
        self.visual_status = VisualStatus::Skeleton;
        Ok(())
    }

    fn ensure_rendering(&self) -> Result<(), CardStateError> {
        match self.visual_status {
            VisualStatus::Rendering => Ok(()),
            VisualStatus::Skeleton | VisualStatus::Done => {
                Err(CardStateError::NotRendering(self.id.clone()))
            }
        }
    }

    pub fn apply(&mut self, patch: &AssetCardPatch) {
        if let Some(headline) = &patch.headline {
            self.headline.clone_from(headline);
        }
        if let Some(visual_logic) = &patch.visual_logic {
            self.visual_logic.clone_from(visual_logic);
        }
        if let Some(prompt) = &patch.prompt {
            self.prompt.clone_from(prompt);
        }
        if let Some(script) = &patch.script {
            self.script.clone_from(script);
        }
        if let Some(item) = patch.knowledge {
            self.link_knowledge(item);
        }
    }
}

/// Partial update of the user-editable fields of a card. Knowledge labels travel as one
/// catalog entry so the pair can never be set independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetCardPatch {
    pub headline: Option<String>,
    pub visual_logic: Option<String>,
    pub prompt: Option<String>,
    pub script: Option<String>,
    pub knowledge: Option<&'static KnowledgeItem>,
}

impl AssetCardPatch {
    #[must_use]
    pub fn headline(value: impl Into<String>) -> Self {
        Self {
            headline: Some(value.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn visual_logic(value: impl Into<String>) -> Self {
        Self {
            visual_logic: Some(value.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn prompt(value: impl Into<String>) -> Self {
        Self {
            prompt: Some(value.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn script(value: impl Into<String>) -> Self {
        Self {
            script: Some(value.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn knowledge(item: &'static KnowledgeItem) -> Self {
        Self {
            knowledge: Some(item),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KNOWLEDGE_BASE;

    fn card() -> AssetCardData {
        AssetCardData {
            id: AssetCardData::card_id(0),
            logic_type: LogicType::Intro,
            visual_status: VisualStatus::Skeleton,
            visual_logic: "模特正面展示渔夫帽".to_string(),
            prompt: "Fashion portrait".to_string(),
            image_url: None,
            headline: "标题".to_string(),
            l1_knowledge: KNOWLEDGE_BASE[0].l1.to_string(),
            l2_knowledge: KNOWLEDGE_BASE[0].l2.to_string(),
            script: "文案".to_string(),
            score: None,
        }
    }

    #[test]
    fn logic_types_cycle_in_fixed_order() {
        assert_eq!(LogicType::for_page(0), LogicType::Intro);
        assert_eq!(LogicType::for_page(4), LogicType::ProductPitch);
        assert_eq!(LogicType::for_page(5), LogicType::Intro);
        assert_eq!(LogicType::for_page(17), LogicType::AestheticPrinciple);
    }

    #[test]
    fn card_wire_shape_matches_client_contract() {
        let json = serde_json::to_value(card()).expect("encode card");
        assert_eq!(json["logicType"], "引入");
        assert_eq!(json["visualStatus"], "skeleton");
        assert!(json.get("imageUrl").is_none());
        assert!(json.get("score").is_none());
    }

    #[test]
    fn render_gate_rejects_reentrant_render() {
        let mut c = card();
        c.begin_render().expect("first render");
        assert_eq!(
            c.begin_render(),
            Err(CardStateError::AlreadyRendering("card-0".to_string()))
        );
        c.complete_render("data:image/png;base64,AA==".to_string(), 7.5)
            .expect("complete");
        assert_eq!(c.visual_status, VisualStatus::Done);
        c.begin_render().expect("re-render a done card");
    }

    #[test]
    fn failed_render_returns_to_skeleton_without_image() {
        let mut c = card();
        c.begin_render().expect("render");
        c.fail_render().expect("fail");
        assert_eq!(c.visual_status, VisualStatus::Skeleton);
        assert!(c.image_url.is_none());
        assert!(c.score.is_none());
        assert_eq!(
            c.fail_render(),
            Err(CardStateError::NotRendering("card-0".to_string()))
        );
    }

    #[test]
    fn failed_rerender_keeps_previous_artifact() {
        let mut c = card();
        c.begin_render().expect("render");
        c.complete_render("data:image/png;base64,AA==".to_string(), 6.4)
            .expect("complete");
        c.begin_render().expect("re-render");
        c.fail_render().expect("fail");
        assert_eq!(c.visual_status, VisualStatus::Skeleton);
        assert_eq!(c.image_url.as_deref(), Some("data:image/png;base64,AA=="));
        assert_eq!(c.score, Some(6.4));
    }

    #[test]
    fn patch_sets_knowledge_pair_together() {
        let mut c = card();
        c.apply(&AssetCardPatch::knowledge(&KNOWLEDGE_BASE[3]));
        assert_eq!(c.l1_knowledge, "色彩心理");
        assert_eq!(c.l2_knowledge, "提亮肤色");
        assert_eq!(c.knowledge().map(|k| k.id), Some("k4"));
    }
}
