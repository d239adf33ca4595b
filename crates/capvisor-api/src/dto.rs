// SPDX-License-Identifier: Apache-2.0

use capvisor_model::{
    AssetCardData, FaceShape, Gender, HatType, KnowledgeItem, LogicType, TargetingParameters,
    TopicCard, KNOWLEDGE_BASE, ORIGINS, SCENES,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// Both fields are optional on the wire so a missing one is reported as a 400, not a decode error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: i64,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicsResponse {
    pub topics: Vec<TopicCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonRequest {
    pub topic: TopicCard,
    pub params: TargetingParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonResponse {
    pub stream: Vec<AssetCardData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    #[serde(default)]
    pub visual_logic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub score: f64,
}

/// One persisted skeleton generation; JSON columns are decoded back into values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationLogEntry {
    pub id: i64,
    pub params: Value,
    pub topic: Value,
    pub stream: Value,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogsResponse {
    pub logs: Vec<GenerationLogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntryDto {
    pub id: String,
    pub l1: String,
    pub l2: String,
    pub formula: String,
}

impl From<&KnowledgeItem> for KnowledgeEntryDto {
    fn from(item: &KnowledgeItem) -> Self {
        Self {
            id: item.id.to_string(),
            l1: item.l1.to_string(),
            l2: item.l2.to_string(),
            formula: item.formula.to_string(),
        }
    }
}

/// Parameter deck and knowledge base as served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    pub face_shapes: Vec<String>,
    pub hat_types: Vec<String>,
    pub genders: Vec<String>,
    pub origins: Vec<String>,
    pub scenes: Vec<String>,
    pub logic_types: Vec<String>,
    pub knowledge_base: Vec<KnowledgeEntryDto>,
}

impl CatalogResponse {
    #[must_use]
    pub fn current() -> Self {
        Self {
            face_shapes: FaceShape::ALL.iter().map(|v| v.label().to_string()).collect(),
            hat_types: HatType::ALL.iter().map(|v| v.label().to_string()).collect(),
            genders: Gender::ALL.iter().map(|v| v.label().to_string()).collect(),
            origins: ORIGINS.iter().map(|v| (*v).to_string()).collect(),
            scenes: SCENES.iter().map(|v| (*v).to_string()).collect(),
            logic_types: LogicType::ALL.iter().map(|v| v.label().to_string()).collect(),
            knowledge_base: KNOWLEDGE_BASE.iter().map(KnowledgeEntryDto::from).collect(),
        }
    }
}
