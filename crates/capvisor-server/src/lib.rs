#![forbid(unsafe_code)]
//! CapVisor HTTP service: login, the synthesis endpoints, and the shared generation history.

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use capvisor_synth::{
    AssetScorer, GenerativeBackend, ImageBackend, ImageRenderer, PromptTranslator, RandomScorer,
    RandomSource, SkeletonSynthesizer, TopicSynthesizer,
};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

pub mod auth;
mod config;
mod http;
mod middleware;
pub mod store;
pub mod upstream;

pub use auth::{
    hash_password, normalize_email, seed_users_from_json, verify_password,
    verify_password_blocking, AuthError, AuthUser, Claims, TokenIssuer,
};
pub use config::{
    allowed_origins, validate_startup_config_contract, ApiConfig, GeminiConfig, RetryPolicy,
    CONFIG_SCHEMA_VERSION, DEFAULT_CLIENT_ORIGIN, DEFAULT_CLOUD_LOCATION, DEFAULT_GEMINI_BASE_URL,
    DEFAULT_IMAGE_MODELS, DEFAULT_PORT, DEFAULT_TEXT_MODEL, DEV_JWT_SECRET,
};
pub use middleware::RequestId;
pub use store::{SqliteStore, StoreError, UserRecord};

pub const CRATE_NAME: &str = "capvisor-server";

/// Synthesis engine instances shared by the handlers.
pub struct SynthServices {
    pub topics: TopicSynthesizer,
    pub skeleton: SkeletonSynthesizer,
    pub translator: PromptTranslator,
    pub renderer: ImageRenderer,
    pub scorer: Arc<dyn AssetScorer>,
}

impl SynthServices {
    /// Wires every synthesizer to one text backend and the image candidates in order.
    #[must_use]
    pub fn new(
        config: &ApiConfig,
        text: Arc<dyn GenerativeBackend>,
        images: Vec<Arc<dyn ImageBackend>>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        let renderer = images
            .into_iter()
            .fold(ImageRenderer::new(), |renderer, backend| {
                renderer.with_candidate(backend, config.image_timeout)
            });
        Self {
            topics: TopicSynthesizer::new(text.clone(), random.clone(), config.upstream_timeout),
            skeleton: SkeletonSynthesizer::new(text.clone(), config.upstream_timeout),
            translator: PromptTranslator::new(text, config.upstream_timeout),
            renderer,
            scorer: Arc::new(RandomScorer::new(random)),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub store: Arc<SqliteStore>,
    pub tokens: TokenIssuer,
    pub services: Arc<SynthServices>,
    pub request_id_seed: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn new(config: ApiConfig, store: Arc<SqliteStore>, services: SynthServices) -> Self {
        Self {
            tokens: TokenIssuer::new(&config.jwt_secret, config.token_ttl),
            config: Arc::new(config),
            store,
            services: Arc::new(services),
            request_id_seed: Arc::new(AtomicU64::new(1)),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/catalog", get(http::handlers::catalog_handler))
        .route("/api/topics", post(http::handlers::topics_handler))
        .route("/api/skeleton", post(http::handlers::skeleton_handler))
        .route(
            "/api/translate-prompt",
            post(http::handlers::translate_handler),
        )
        .route("/api/image", post(http::handlers::image_handler))
        .route("/api/score", post(http::handlers::score_handler))
        .route("/api/logs", get(http::handlers::logs_handler))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth_middleware,
        ));

    Router::new()
        .route("/healthz", get(http::handlers::healthz_handler))
        .route("/openapi.json", get(http::handlers::openapi_handler))
        .route("/api/auth/login", post(http::handlers::login_handler))
        .merge(protected)
        .fallback(http::handlers::not_found_handler)
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(from_fn_with_state(state.clone(), middleware::cors::cors_middleware))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::request_tracing::request_tracing_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use capvisor_synth::fake::FakeBackend;
    use capvisor_synth::SeededRandom;

    /// State over an in-memory store whose model calls all fail.
    pub(crate) fn fallback_state() -> AppState {
        let config = ApiConfig::default();
        let store = SqliteStore::open_in_memory().expect("in-memory store");
        let services = SynthServices::new(
            &config,
            Arc::new(FakeBackend::failing()),
            Vec::new(),
            Arc::new(SeededRandom::new(7)),
        );
        AppState::new(config, Arc::new(store), services)
    }
}
