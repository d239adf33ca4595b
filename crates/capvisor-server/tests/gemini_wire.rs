use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use capvisor_server::upstream::{GeminiBackend, GeminiClient, GeminiImageBackend, ImagenBackend};
use capvisor_server::{GeminiConfig, RetryPolicy};
use capvisor_synth::{BackendError, GenerativeBackend, ImageBackend, StructuredRequest};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Upstream {
    calls: Arc<AtomicU64>,
    fail_first: bool,
    seen: Arc<std::sync::Mutex<Vec<Value>>>,
}

async fn generate_content(
    State(upstream): State<Upstream>,
    Path(target): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let n = upstream.calls.fetch_add(1, Ordering::SeqCst);
    upstream.seen.lock().expect("seen").push(body.clone());
    if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some("test-key") {
        return (StatusCode::FORBIDDEN, Json(json!({"error": "bad key"})));
    }
    if upstream.fail_first && n == 0 {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "busy"})));
    }
    if target.contains("image") {
        return (
            StatusCode::OK,
            Json(json!({"candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "image/png", "data": "iVBOR"}}
            ]}}]})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"candidates": [{"content": {"parts": [{"text": "[]"}]}}]})),
    )
}

async fn predict(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    upstream.calls.fetch_add(1, Ordering::SeqCst);
    upstream.seen.lock().expect("seen").push(body);
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer test-key") {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "no bearer"})));
    }
    (
        StatusCode::OK,
        Json(json!({"predictions": [{"bytesBase64Encoded": "iVBOR", "mimeType": "image/png"}]})),
    )
}

async fn spawn_upstream(upstream: Upstream) -> String {
    let app = Router::new()
        .route("/v1beta/models/:target", post(generate_content))
        .route("/imagen/predict", post(predict))
        .with_state(upstream);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn config(base_url: String, api_key: &str) -> GeminiConfig {
    GeminiConfig {
        api_key: Some(api_key.to_string()),
        base_url,
        retry: RetryPolicy {
            max_attempts: 2,
            base_backoff_ms: 1,
        },
        ..GeminiConfig::default()
    }
}

#[tokio::test]
async fn structured_call_sends_schema_and_retries_unavailable() {
    let upstream = Upstream {
        fail_first: true,
        ..Upstream::default()
    };
    let base = spawn_upstream(upstream.clone()).await;
    let backend = GeminiBackend::new(GeminiClient::new(&config(base, "test-key")), "text-model");
    let reply = backend
        .generate_structured(&StructuredRequest {
            prompt: "brief".to_string(),
            schema: json!({"type": "ARRAY"}),
        })
        .await
        .expect("reply");
    assert_eq!(reply, "[]");
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
    let seen = upstream.seen.lock().expect("seen");
    assert_eq!(seen[1]["generationConfig"]["responseMimeType"], "application/json");
    assert_eq!(seen[1]["generationConfig"]["responseSchema"]["type"], "ARRAY");
    assert_eq!(seen[1]["contents"][0]["parts"][0]["text"], "brief");
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let upstream = Upstream::default();
    let base = spawn_upstream(upstream.clone()).await;
    let backend = GeminiBackend::new(GeminiClient::new(&config(base, "wrong-key")), "text-model");
    let err = backend.generate_text("hi").await.expect_err("forbidden");
    assert!(matches!(err, BackendError::Status { status: 403, .. }));
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn image_call_requests_portrait_aspect_and_decodes_inline_data() {
    let upstream = Upstream::default();
    let base = spawn_upstream(upstream.clone()).await;
    let backend =
        GeminiImageBackend::new(GeminiClient::new(&config(base, "test-key")), "image-model");
    let image = backend.render("portrait").await.expect("image");
    assert_eq!(image.data_uri(), "data:image/png;base64,iVBOR");
    let seen = upstream.seen.lock().expect("seen");
    assert_eq!(seen[0]["generationConfig"]["imageConfig"]["aspectRatio"], "3:4");
}

#[tokio::test]
async fn imagen_predict_sends_bearer_and_single_portrait_sample() {
    let upstream = Upstream::default();
    let base = spawn_upstream(upstream.clone()).await;
    let retry = RetryPolicy {
        max_attempts: 1,
        base_backoff_ms: 1,
    };
    let backend = ImagenBackend::new("proj-1", "us-central1", Some("test-key".to_string()), retry.clone())
        .with_endpoint(format!("{base}/imagen/predict"));
    let image = backend.render("portrait").await.expect("image");
    assert_eq!(image.data_uri(), "data:image/png;base64,iVBOR");
    {
        let seen = upstream.seen.lock().expect("seen");
        assert_eq!(seen[0]["instances"][0]["prompt"], "portrait");
        assert_eq!(seen[0]["parameters"]["sampleCount"], 1);
        assert_eq!(seen[0]["parameters"]["aspectRatio"], "3:4");
    }

    let keyless = ImagenBackend::new("proj-1", "us-central1", None, retry)
        .with_endpoint(format!("{base}/imagen/predict"));
    let err = keyless.render("portrait").await.expect_err("no bearer");
    assert!(matches!(err, BackendError::Unconfigured(_)));
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
}
