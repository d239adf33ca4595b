#![forbid(unsafe_code)]

pub mod dto;
pub mod error_mapping;
mod errors;
pub mod openapi;
pub mod params;

pub use dto::{
    CatalogResponse, GenerationLogEntry, HealthResponse, ImageRequest, ImageResponse,
    KnowledgeEntryDto, LoginRequest, LoginResponse, LogsResponse, ScoreRequest, ScoreResponse,
    SkeletonRequest, SkeletonResponse, TopicsResponse, TranslateRequest, TranslateResponse,
    UserView,
};
pub use error_mapping::{map_error, ApiErrorMapping};
pub use errors::{ApiError, ApiErrorBody, ApiErrorCode};
pub use openapi::{openapi_v1_spec, ROUTES};
pub use params::{require_text, validate_params};

pub const CRATE_NAME: &str = "capvisor-api";
