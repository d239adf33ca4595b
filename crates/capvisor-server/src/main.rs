#![forbid(unsafe_code)]

use capvisor_server::upstream::backends_from_config;
use capvisor_server::{
    allowed_origins, build_router, seed_users_from_json, validate_startup_config_contract,
    ApiConfig, AppState, GeminiConfig, RetryPolicy, SqliteStore, SynthServices,
    CONFIG_SCHEMA_VERSION, DEFAULT_CLIENT_ORIGIN, DEFAULT_CLOUD_LOCATION, DEFAULT_GEMINI_BASE_URL,
    DEFAULT_IMAGE_MODELS, DEFAULT_PORT, DEFAULT_TEXT_MODEL, DEV_JWT_SECRET,
};
use capvisor_synth::ThreadRandom;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_duration_ms(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_u64(name, default_ms))
}

fn env_nonempty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_list(name: &str, default: &[&str]) -> Vec<String> {
    match env_nonempty(name) {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
        None => default.iter().map(|s| (*s).to_string()).collect(),
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (Ok(mut sigterm), Ok(mut sigint)) = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) else {
            let _ = tokio::signal::ctrl_c().await;
            return;
        };
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("CAPVISOR_LOG_JSON", true) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn config_from_env() -> ApiConfig {
    let defaults = ApiConfig::default();
    let bind_addr = env_nonempty("CAPVISOR_BIND").unwrap_or_else(|| {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        format!("0.0.0.0:{port}")
    });
    let client_origin =
        env_nonempty("CLIENT_ORIGIN").unwrap_or_else(|| DEFAULT_CLIENT_ORIGIN.to_string());
    let gemini = GeminiConfig {
        api_key: env_nonempty("GEMINI_API_KEY").or_else(|| env_nonempty("API_KEY")),
        base_url: env_nonempty("GEMINI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
        text_model: env_nonempty("GEMINI_TEXT_MODEL")
            .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
        image_models: env_list("GEMINI_IMAGE_MODELS", &DEFAULT_IMAGE_MODELS),
        cloud_project_id: env_nonempty("GOOGLE_CLOUD_PROJECT_ID"),
        cloud_location: env_nonempty("GOOGLE_CLOUD_LOCATION")
            .unwrap_or_else(|| DEFAULT_CLOUD_LOCATION.to_string()),
        retry: RetryPolicy {
            max_attempts: env_usize("CAPVISOR_UPSTREAM_MAX_ATTEMPTS", 2),
            base_backoff_ms: env_u64("CAPVISOR_UPSTREAM_BACKOFF_MS", 250),
        },
    };
    ApiConfig {
        bind_addr,
        cors_allowed_origins: allowed_origins(&client_origin),
        database_path: env_nonempty("DATABASE_PATH")
            .map_or(defaults.database_path.clone(), PathBuf::from),
        jwt_secret: env_nonempty("JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string()),
        users_json: env_nonempty("USERS_JSON"),
        gemini,
        upstream_timeout: env_duration_ms("CAPVISOR_UPSTREAM_TIMEOUT_MS", 30_000),
        image_timeout: env_duration_ms("CAPVISOR_IMAGE_TIMEOUT_MS", 60_000),
        max_body_bytes: env_usize("CAPVISOR_MAX_BODY_BYTES", defaults.max_body_bytes),
        shutdown_drain: env_duration_ms("CAPVISOR_SHUTDOWN_DRAIN_MS", 5_000),
        ..defaults
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();

    let config = config_from_env();
    validate_startup_config_contract(&config)?;
    if config.jwt_secret == DEV_JWT_SECRET {
        warn!("JWT_SECRET not set, using the development secret");
    }

    let store = SqliteStore::open(&config.database_path)
        .map_err(|e| format!("open database {}: {e}", config.database_path.display()))?;
    store
        .ensure_tables()
        .await
        .map_err(|e| format!("initialize database: {e}"))?;
    let seeded = seed_users_from_json(
        &store,
        config.users_json.as_deref(),
        config.password_hash_rounds,
    )
    .await
    .map_err(|e| format!("seed users: {e}"))?;

    let backends = backends_from_config(&config);
    if !backends.configured {
        warn!("GEMINI_API_KEY not set, synthesis runs on template fallbacks only");
    }
    let services = SynthServices::new(
        &config,
        backends.text,
        backends.images,
        Arc::new(ThreadRandom),
    );
    info!(
        config_schema_version = CONFIG_SCHEMA_VERSION,
        seeded_users = seeded,
        image_candidates = ?services.renderer.candidate_tags(),
        origins = ?config.cors_allowed_origins,
        "capvisor-server configured"
    );

    let bind_addr = config.bind_addr.clone();
    let drain = config.shutdown_drain;
    let state = AppState::new(config, Arc::new(store), services);
    let app = build_router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| format!("bind {bind_addr}: {e}"))?;
    info!("capvisor-server listening on {bind_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            info!(drain_ms = drain.as_millis() as u64, "shutdown requested, draining");
            tokio::time::sleep(drain).await;
        })
        .await
        .map_err(|e| format!("server failed: {e}"))
}
