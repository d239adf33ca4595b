// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: &str = "1";
pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";
pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_CLIENT_ORIGIN: &str = "http://localhost:5173";
/// Dev front-end origins accepted alongside the configured client origin.
pub const DEV_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://localhost:5173"];
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_IMAGE_MODELS: [&str; 2] = ["gemini-2.0-flash-exp", "gemini-2.0-flash-thinking-exp"];
pub const DEFAULT_CLOUD_LOCATION: &str = "us-central1";

#[derive(Debug, Clone, Serialize)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_backoff_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeminiConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub text_model: String,
    pub image_models: Vec<String>,
    pub cloud_project_id: Option<String>,
    pub cloud_location: String,
    pub retry: RetryPolicy,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_models: DEFAULT_IMAGE_MODELS.iter().map(|m| (*m).to_string()).collect(),
            cloud_project_id: None,
            cloud_location: DEFAULT_CLOUD_LOCATION.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub cors_allowed_origins: Vec<String>,
    pub database_path: PathBuf,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub password_hash_rounds: u32,
    #[serde(skip_serializing)]
    pub users_json: Option<String>,
    pub gemini: GeminiConfig,
    pub upstream_timeout: Duration,
    pub image_timeout: Duration,
    pub max_body_bytes: usize,
    pub log_page_size: usize,
    pub shutdown_drain: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            cors_allowed_origins: allowed_origins(DEFAULT_CLIENT_ORIGIN),
            database_path: PathBuf::from("capvisor.db"),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            password_hash_rounds: 100_000,
            users_json: None,
            gemini: GeminiConfig::default(),
            upstream_timeout: Duration::from_secs(30),
            image_timeout: Duration::from_secs(60),
            max_body_bytes: 2 * 1024 * 1024,
            log_page_size: 20,
            shutdown_drain: Duration::from_secs(5),
        }
    }
}

/// Configured client origin followed by the dev origins, without duplicates.
#[must_use]
pub fn allowed_origins(client_origin: &str) -> Vec<String> {
    let mut origins = Vec::with_capacity(DEV_ORIGINS.len() + 1);
    for origin in std::iter::once(client_origin).chain(DEV_ORIGINS) {
        let origin = origin.trim().trim_end_matches('/');
        if !origin.is_empty() && !origins.iter().any(|o: &String| o == origin) {
            origins.push(origin.to_string());
        }
    }
    origins
}

pub fn validate_startup_config_contract(api: &ApiConfig) -> Result<(), String> {
    if api.max_body_bytes == 0 {
        return Err("max body bytes must be > 0".to_string());
    }
    if api.upstream_timeout.is_zero() || api.image_timeout.is_zero() {
        return Err("upstream timeouts must be > 0".to_string());
    }
    if api.jwt_secret.trim().is_empty() {
        return Err("jwt secret must be non-empty".to_string());
    }
    if api.token_ttl.is_zero() {
        return Err("token ttl must be > 0".to_string());
    }
    if api.password_hash_rounds == 0 {
        return Err("password hash rounds must be > 0".to_string());
    }
    if api.log_page_size == 0 {
        return Err("log page size must be > 0".to_string());
    }
    if api.gemini.retry.max_attempts == 0 {
        return Err("upstream retry attempts must be > 0".to_string());
    }
    reqwest::Url::parse(&api.gemini.base_url)
        .map_err(|e| format!("invalid gemini base url {}: {e}", api.gemini.base_url))?;
    if api
        .gemini
        .cloud_project_id
        .as_deref()
        .is_some_and(|p| p.trim().is_empty())
    {
        return Err("cloud project id must be non-empty when set".to_string());
    }
    Ok(())
}
