// SPDX-License-Identifier: Apache-2.0

use crate::auth::{normalize_email, verify_password_blocking, AuthUser};
use crate::http::extract::ApiJson;
use crate::middleware::RequestId;
use crate::AppState;
use axum::extract::State;
use axum::http::Uri;
use axum::response::Response;
use axum::{Extension, Json};
use capvisor_api::{
    openapi_v1_spec, require_text, validate_params, ApiError, CatalogResponse, HealthResponse,
    ImageRequest, ImageResponse, LoginRequest, LoginResponse, LogsResponse, ScoreRequest,
    ScoreResponse, SkeletonRequest, SkeletonResponse, TopicsResponse, TranslateRequest,
    TranslateResponse, UserView,
};
use capvisor_model::TargetingParameters;
use serde_json::{json, Value};
use tracing::{error, info, warn};

type HandlerResult<T> = Result<Json<T>, Response>;

pub(crate) async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

pub(crate) async fn openapi_handler() -> Json<Value> {
    Json(openapi_v1_spec())
}

pub(crate) async fn login_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> HandlerResult<LoginResponse> {
    let email = normalize_email(req.email.as_deref().unwrap_or_default());
    require_text("email", &email).map_err(|e| request_id.reject(e))?;
    let password = req.password.as_deref().unwrap_or_default();
    if password.is_empty() {
        return Err(request_id.reject(ApiError::missing_field("password")));
    }

    let user = state.store.find_user_by_email(&email).await.map_err(|e| {
        error!(error = %e, "user lookup failed");
        request_id.reject(ApiError::internal("user lookup failed"))
    })?;
    let Some(user) = user else {
        info!(email = %email, "login rejected: unknown user");
        return Err(request_id.reject(ApiError::unauthorized()));
    };
    let verdict = verify_password_blocking(password.to_string(), user.password_hash.clone())
        .await
        .map_err(|e| {
            error!(error = %e, "password check task failed");
            request_id.reject(ApiError::internal("password check failed"))
        })?;
    match verdict {
        Ok(true) => {}
        Ok(false) => {
            info!(user_id = user.id, "login rejected: bad password");
            return Err(request_id.reject(ApiError::unauthorized()));
        }
        Err(err) => {
            warn!(user_id = user.id, error = %err, "stored credential unusable");
            return Err(request_id.reject(ApiError::unauthorized()));
        }
    }

    let token = state.tokens.issue(user.id, &user.email).map_err(|e| {
        error!(error = %e, "token issue failed");
        request_id.reject(ApiError::internal("token issue failed"))
    })?;
    info!(user_id = user.id, "login succeeded");
    Ok(Json(LoginResponse {
        token,
        user: UserView {
            id: user.id,
            email: user.email,
        },
    }))
}

pub(crate) async fn catalog_handler() -> Json<CatalogResponse> {
    Json(CatalogResponse::current())
}

pub(crate) async fn topics_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    ApiJson(params): ApiJson<TargetingParameters>,
) -> HandlerResult<TopicsResponse> {
    validate_params(&params).map_err(|e| request_id.reject(e))?;
    let generated = state.services.topics.generate(&params).await;
    info!(
        user_id = claims.sub,
        provenance = ?generated.provenance,
        count = generated.value.len(),
        "topics generated"
    );
    Ok(Json(TopicsResponse {
        topics: generated.into_value(),
    }))
}

pub(crate) async fn skeleton_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    ApiJson(req): ApiJson<SkeletonRequest>,
) -> HandlerResult<SkeletonResponse> {
    validate_params(&req.params).map_err(|e| request_id.reject(e))?;
    let generated = state.services.skeleton.generate(&req.topic, &req.params).await;
    info!(
        user_id = claims.sub,
        volume = req.params.volume,
        provenance = ?generated.provenance,
        "skeleton generated"
    );
    let stream = generated.into_value();
    state
        .store
        .append_generation_log(claims.sub, &req.params, &req.topic, &stream)
        .await
        .map_err(|e| {
            error!(user_id = claims.sub, error = %e, "generation log append failed");
            request_id.reject(ApiError::internal("generation log append failed"))
        })?;
    Ok(Json(SkeletonResponse { stream }))
}

pub(crate) async fn translate_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<TranslateRequest>,
) -> Json<TranslateResponse> {
    let generated = state.services.translator.translate(&req.visual_logic).await;
    info!(provenance = ?generated.provenance, "prompt translated");
    Json(TranslateResponse {
        prompt: generated.into_value(),
    })
}

pub(crate) async fn image_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiJson(req): ApiJson<ImageRequest>,
) -> HandlerResult<ImageResponse> {
    require_text("prompt", &req.prompt).map_err(|e| request_id.reject(e))?;
    match state.services.renderer.render(&req.prompt).await {
        Ok(image_url) => Ok(Json(ImageResponse { image_url })),
        Err(err) => {
            error!(error = %err, "image generation failed");
            let attempts: Vec<Value> = err
                .attempts
                .iter()
                .map(|a| json!({"backend": a.backend, "error": a.error.to_string()}))
                .collect();
            Err(request_id.reject(ApiError::render_failed(Value::Array(attempts))))
        }
    }
}

pub(crate) async fn score_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ScoreRequest>,
) -> Json<ScoreResponse> {
    let score = state.services.scorer.score(&req.image_url, &req.prompt).await;
    Json(ScoreResponse { score })
}

pub(crate) async fn logs_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> HandlerResult<LogsResponse> {
    let logs = state
        .store
        .recent_logs(state.config.log_page_size)
        .await
        .map_err(|e| {
            error!(error = %e, "generation log read failed");
            request_id.reject(ApiError::internal("generation log read failed"))
        })?;
    Ok(Json(LogsResponse { logs }))
}

pub(crate) async fn not_found_handler(
    Extension(request_id): Extension<RequestId>,
    uri: Uri,
) -> Response {
    request_id.reject(ApiError::not_found(uri.path()))
}
