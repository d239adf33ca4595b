// SPDX-License-Identifier: Apache-2.0

use crate::ParseError;
use serde::{Deserialize, Serialize};

pub const VOLUME_MIN: u32 = 10;
pub const VOLUME_MAX: u32 = 20;
pub const DEPTH_MIN: u8 = 1;
pub const DEPTH_MAX: u8 = 3;

pub const DEFAULT_ORIGIN: &str = "显脸大";
pub const DEFAULT_SCENE: &str = "通勤";

/// Pain-point labels offered by the parameter deck.
pub const ORIGINS: [&str; 5] = ["显脸大", "头型扁塌", "发际线高", "颧骨外扩", "面中凹陷"];
/// Scenario labels offered by the parameter deck.
pub const SCENES: [&str; 6] = ["通勤", "约会", "度假", "骑行", "冬季御寒", "夏季防晒"];

labelled_enum! {
    FaceShape, "faceShape", 6 {
        SquareRound => ("方圆脸", "square-round"),
        Diamond => ("菱形脸", "diamond"),
        Long => ("长脸", "long"),
        Heart => ("心形脸", "heart"),
        Round => ("圆脸", "round"),
        Square => ("方脸", "square"),
    }
}

labelled_enum! {
    HatType, "hatType", 9 {
        Fisherman => ("渔夫帽", "fisherman"),
        Baseball => ("棒球帽", "baseball"),
        Beret => ("贝雷帽", "beret"),
        Newsboy => ("报童帽", "newsboy"),
        Beanie => ("冷帽", "beanie"),
        Aviator => ("飞行帽", "aviator"),
        Balaclava => ("巴拉克拉法帽", "balaclava"),
        Cloche => ("钟形帽", "cloche"),
        Ushanka => ("雷锋帽", "ushanka"),
    }
}

labelled_enum! {
    Gender, "gender", 2 {
        Female => ("女", "female"),
        Male => ("男", "male"),
    }
}

impl Default for FaceShape {
    fn default() -> Self {
        Self::SquareRound
    }
}

impl Default for HatType {
    fn default() -> Self {
        Self::Fisherman
    }
}

impl Default for Gender {
    fn default() -> Self {
        Self::Female
    }
}

/// Targeting brief for one generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetingParameters {
    #[serde(default)]
    pub origin: Vec<String>,
    #[serde(default)]
    pub scene: Vec<String>,
    pub face_shape: FaceShape,
    #[serde(default)]
    pub gender: Gender,
    pub hat_type: HatType,
    pub volume: u32,
    pub depth: u8,
}

impl Default for TargetingParameters {
    fn default() -> Self {
        Self {
            origin: vec![DEFAULT_ORIGIN.to_string()],
            scene: vec![DEFAULT_SCENE.to_string()],
            face_shape: FaceShape::default(),
            gender: Gender::default(),
            hat_type: HatType::default(),
            volume: VOLUME_MIN,
            depth: DEPTH_MIN,
        }
    }
}

impl TargetingParameters {
    pub fn validate(&self) -> Result<(), ParseError> {
        if !(VOLUME_MIN..=VOLUME_MAX).contains(&self.volume) {
            return Err(ParseError::OutOfRange {
                field: "volume",
                min: i64::from(VOLUME_MIN),
                max: i64::from(VOLUME_MAX),
                actual: i64::from(self.volume),
            });
        }
        if !(DEPTH_MIN..=DEPTH_MAX).contains(&self.depth) {
            return Err(ParseError::OutOfRange {
                field: "depth",
                min: i64::from(DEPTH_MIN),
                max: i64::from(DEPTH_MAX),
                actual: i64::from(self.depth),
            });
        }
        Ok(())
    }

    /// First pain point, or the deck default when none is selected.
    #[must_use]
    pub fn primary_origin(&self) -> &str {
        first_non_blank(&self.origin).unwrap_or(DEFAULT_ORIGIN)
    }

    #[must_use]
    pub fn scene_at(&self, index: usize) -> Option<&str> {
        self.scene
            .get(index)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    #[must_use]
    pub fn scenes_joined(&self, separator: &str) -> String {
        self.scene.join(separator)
    }
}

fn first_non_blank(values: &[String]) -> Option<&str> {
    values
        .first()
        .map(String::as_str)
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_sets_have_fixed_cardinality() {
        assert_eq!(FaceShape::ALL.len(), 6);
        assert_eq!(HatType::ALL.len(), 9);
        assert_eq!(Gender::ALL.len(), 2);
    }

    #[test]
    fn parameters_use_labels_on_the_wire() {
        let raw = r#"{"origin":["显脸大"],"scene":["通勤"],"faceShape":"方圆脸","gender":"女","hatType":"渔夫帽","volume":10,"depth":1}"#;
        let params: TargetingParameters = serde_json::from_str(raw).expect("parse params");
        assert_eq!(params.face_shape, FaceShape::SquareRound);
        assert_eq!(params.hat_type, HatType::Fisherman);
        assert_eq!(params.gender, Gender::Female);
        let back = serde_json::to_string(&params).expect("encode params");
        assert!(back.contains("\"faceShape\":\"方圆脸\""));
    }

    #[test]
    fn unknown_label_is_rejected() {
        let raw = r#"{"faceShape":"三角脸","hatType":"渔夫帽","volume":10,"depth":1}"#;
        assert!(serde_json::from_str::<TargetingParameters>(raw).is_err());
        let err = "三角脸".parse::<FaceShape>().expect_err("unknown face shape");
        assert_eq!(
            err,
            ParseError::UnknownLabel("faceShape", "三角脸".to_string())
        );
    }

    #[test]
    fn from_str_accepts_label_and_slug() {
        assert_eq!("渔夫帽".parse::<HatType>(), Ok(HatType::Fisherman));
        assert_eq!("Beret".parse::<HatType>(), Ok(HatType::Beret));
    }

    #[test]
    fn validation_enforces_volume_and_depth_ranges() {
        let mut params = TargetingParameters::default();
        assert!(params.validate().is_ok());
        params.volume = 21;
        assert!(matches!(
            params.validate(),
            Err(ParseError::OutOfRange { field: "volume", .. })
        ));
        params.volume = 20;
        params.depth = 0;
        assert!(matches!(
            params.validate(),
            Err(ParseError::OutOfRange { field: "depth", .. })
        ));
    }

    #[test]
    fn primary_origin_defaults_when_empty_or_blank() {
        let mut params = TargetingParameters {
            origin: Vec::new(),
            ..TargetingParameters::default()
        };
        assert_eq!(params.primary_origin(), DEFAULT_ORIGIN);
        params.origin = vec![" ".to_string()];
        assert_eq!(params.primary_origin(), DEFAULT_ORIGIN);
        params.origin = vec!["发际线高".to_string()];
        assert_eq!(params.primary_origin(), "发际线高");
    }
}
