#![forbid(unsafe_code)]
//! CapVisor model SSOT.
//!
//! Every closed label set is a Rust enum so consumers match exhaustively:
//!
//! ```compile_fail
//! use capvisor_model::LogicType;
//!
//! fn colour(t: LogicType) -> &'static str {
//!     match t {
//!         LogicType::Intro => "blue",
//!         LogicType::PainPointAnalysis => "red",
//!     }
//! }
//! ```

use std::fmt::{Display, Formatter};

/// Closed label set serialized as its display label. `FromStr` also accepts the ascii slug
/// so command-line callers do not need to type the label.
macro_rules! labelled_enum {
    (
        $name:ident, $field:literal, $count:literal {
            $($variant:ident => ($label:literal, $slug:literal)),+ $(,)?
        }
    ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: [Self; $count] = [$(Self::$variant),+];

            #[must_use]
            pub const fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }

            #[must_use]
            pub const fn slug(self) -> &'static str {
                match self {
                    $(Self::$variant => $slug,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::ParseError;

            fn from_str(input: &str) -> Result<Self, Self::Err> {
                let trimmed = input.trim();
                Self::ALL
                    .into_iter()
                    .find(|v| v.label() == trimmed || v.slug().eq_ignore_ascii_case(trimmed))
                    .ok_or_else(|| $crate::ParseError::UnknownLabel($field, trimmed.to_string()))
            }
        }
    };
}

mod asset;
mod knowledge;
mod targeting;

pub use asset::{
    AssetCardData, AssetCardPatch, CardStateError, LogicType, TopicCard, VisualStatus, TOPIC_BATCH_SIZE,
};
pub use knowledge::{best_match, find_by_l2, KnowledgeItem, KNOWLEDGE_BASE};
pub use targeting::{
    FaceShape, Gender, HatType, TargetingParameters, DEFAULT_ORIGIN, DEFAULT_SCENE, DEPTH_MAX,
    DEPTH_MIN, ORIGINS, SCENES, VOLUME_MAX, VOLUME_MIN,
};

pub const CRATE_NAME: &str = "capvisor-model";

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    UnknownLabel(&'static str, String),
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        actual: i64,
    },
    UnknownKnowledge(String),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownLabel(field, value) => write!(f, "unknown {field} label: {value}"),
            Self::OutOfRange {
                field,
                min,
                max,
                actual,
            } => write!(f, "{field} must be within {min}..={max}, got {actual}"),
            Self::UnknownKnowledge(l2) => write!(f, "{l2} is not in the knowledge base"),
        }
    }
}

impl std::error::Error for ParseError {}
