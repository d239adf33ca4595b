use std::net::SocketAddr;
use std::sync::Arc;

use capvisor_server::{build_router, hash_password, ApiConfig, AppState, SqliteStore, SynthServices};
use capvisor_synth::fake::{FakeBackend, FakeImageBackend};
use capvisor_synth::{ImageBackend, RenderedImage, SeededRandom};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;

const EMAIL: &str = "editor@capvisor.test";
const PASSWORD: &str = "hat-trick";

struct TestServer {
    addr: SocketAddr,
    http: reqwest::Client,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn login(&self) -> String {
        let resp = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&json!({"email": EMAIL, "password": PASSWORD}))
            .send()
            .await
            .expect("login request");
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.expect("login json");
        body["token"].as_str().expect("token").to_string()
    }

    async fn post_authed(&self, token: &str, path: &str, body: &Value) -> reqwest::Response {
        self.http
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("post")
    }
}

async fn spawn_server(config: ApiConfig, images: Vec<Arc<dyn ImageBackend>>) -> TestServer {
    let store = SqliteStore::open_in_memory().expect("store");
    store.ensure_tables().await.expect("tables");
    let hash = hash_password(PASSWORD, 1).expect("hash");
    assert!(store.insert_user(EMAIL, &hash).await.expect("insert user"));

    let services = SynthServices::new(
        &config,
        Arc::new(FakeBackend::failing()),
        images,
        Arc::new(SeededRandom::new(42)),
    );
    let app = build_router(AppState::new(config, Arc::new(store), services));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    TestServer {
        addr,
        http: reqwest::Client::new(),
    }
}

fn params() -> Value {
    json!({
        "faceShape": "方圆脸",
        "hatType": "渔夫帽",
        "volume": 10,
        "origin": ["显脸大"],
        "scene": ["通勤"],
        "depth": 1
    })
}

#[tokio::test]
async fn fallback_flow_serves_topics_and_skeleton_when_model_fails() {
    let server = spawn_server(ApiConfig::default(), Vec::new()).await;
    let token = server.login().await;

    let resp = server.post_authed(&token, "/api/topics", &params()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("topics json");
    let topics = body["topics"].as_array().expect("topics array");
    assert_eq!(topics.len(), 8);
    for topic in topics {
        let title = topic["title"].as_str().expect("title");
        assert!(title.contains("方圆脸"), "{title}");
        assert!(title.contains("渔夫帽"), "{title}");
    }

    let resp = server
        .post_authed(
            &token,
            "/api/skeleton",
            &json!({"topic": topics[0], "params": params()}),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("skeleton json");
    let stream = body["stream"].as_array().expect("stream array");
    assert_eq!(stream.len(), 10);
    assert_eq!(stream[0]["logicType"], "引入");
    assert_eq!(stream[0]["visualStatus"], "skeleton");
    let prompt = stream[0]["prompt"].as_str().expect("prompt");
    assert!(prompt.contains("方圆脸") && prompt.contains("渔夫帽"));

    let resp = server
        .http
        .get(server.url("/api/logs"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("logs");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("logs json");
    let logs = body["logs"].as_array().expect("logs array");
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["topic"]["title"], topics[0]["title"]);
    assert_eq!(logs[0]["stream"].as_array().map(Vec::len), Some(10));
}

#[tokio::test]
async fn protected_routes_reject_missing_and_forged_tokens() {
    let server = spawn_server(ApiConfig::default(), Vec::new()).await;
    let resp = server
        .http
        .post(server.url("/api/topics"))
        .json(&params())
        .send()
        .await
        .expect("topics");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.expect("error json");
    assert_eq!(body["error"]["code"], "Unauthorized");
    assert!(body["error"]["request_id"].as_str().is_some_and(|r| r.starts_with("req-")));

    let token = server.login().await;
    let forged = format!("{}x", token);
    let resp = server.post_authed(&forged, "/api/topics", &params()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_distinguishes_missing_fields_from_bad_credentials() {
    let server = spawn_server(ApiConfig::default(), Vec::new()).await;
    let resp = server
        .http
        .post(server.url("/api/auth/login"))
        .json(&json!({"email": EMAIL}))
        .send()
        .await
        .expect("login");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    for (email, password) in [(EMAIL, "wrong"), ("nobody@capvisor.test", PASSWORD)] {
        let resp = server
            .http
            .post(server.url("/api/auth/login"))
            .json(&json!({"email": email, "password": password}))
            .send()
            .await
            .expect("login");
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = resp.json().await.expect("error json");
        assert_eq!(body["error"]["message"], "invalid credentials");
    }
}

#[tokio::test]
async fn login_email_ignores_case_and_surrounding_space() {
    let server = spawn_server(ApiConfig::default(), Vec::new()).await;
    let resp = server
        .http
        .post(server.url("/api/auth/login"))
        .json(&json!({"email": "  Editor@CapVisor.TEST ", "password": PASSWORD}))
        .send()
        .await
        .expect("login");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("login json");
    assert_eq!(body["user"]["email"], EMAIL);
}

#[tokio::test]
async fn out_of_range_volume_is_rejected() {
    let server = spawn_server(ApiConfig::default(), Vec::new()).await;
    let token = server.login().await;
    let mut bad = params();
    bad["volume"] = json!(25);
    let resp = server.post_authed(&token, "/api/topics", &bad).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("error json");
    assert_eq!(body["error"]["code"], "InvalidRequest");
    assert_eq!(body["error"]["details"]["field_errors"][0]["field"], "volume");
}

#[tokio::test]
async fn image_reports_every_failed_candidate() {
    let images: Vec<Arc<dyn ImageBackend>> = vec![
        Arc::new(FakeImageBackend::failing("image-a")),
        Arc::new(FakeImageBackend::failing("image-b")),
    ];
    let server = spawn_server(ApiConfig::default(), images).await;
    let token = server.login().await;
    let resp = server
        .post_authed(&token, "/api/image", &json!({"prompt": "Fashion portrait"}))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = resp.json().await.expect("error json");
    assert_eq!(body["error"]["code"], "RenderFailed");
    let attempts = body["error"]["details"]["attempts"].as_array().expect("attempts");
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[1]["backend"], "image-b");

    let resp = server
        .post_authed(&token, "/api/image", &json!({"prompt": "  "}))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn image_falls_through_to_a_working_candidate_and_scores() {
    let images: Vec<Arc<dyn ImageBackend>> = vec![
        Arc::new(FakeImageBackend::failing("image-a")),
        Arc::new(FakeImageBackend::succeeding("image-b", RenderedImage::png("iVBOR"))),
    ];
    let server = spawn_server(ApiConfig::default(), images).await;
    let token = server.login().await;
    let resp = server
        .post_authed(&token, "/api/image", &json!({"prompt": "Fashion portrait"}))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("image json");
    let url = body["imageUrl"].as_str().expect("imageUrl");
    assert_eq!(url, "data:image/png;base64,iVBOR");

    let resp = server
        .post_authed(&token, "/api/score", &json!({"imageUrl": url, "prompt": "p"}))
        .await;
    let body: Value = resp.json().await.expect("score json");
    let score = body["score"].as_f64().expect("score");
    assert!((5.0..=10.0).contains(&score));
}

#[tokio::test]
async fn translate_falls_back_when_model_fails() {
    let server = spawn_server(ApiConfig::default(), Vec::new()).await;
    let token = server.login().await;
    let resp = server
        .post_authed(&token, "/api/translate-prompt", &json!({"visualLogic": "侧脸45度角"}))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("translate json");
    assert!(body["prompt"].as_str().is_some_and(|p| !p.is_empty()));
}

#[tokio::test]
async fn cors_preflight_and_body_limit() {
    let config = ApiConfig {
        max_body_bytes: 1024,
        ..ApiConfig::default()
    };
    let server = spawn_server(config, Vec::new()).await;
    let resp = server
        .http
        .request(reqwest::Method::OPTIONS, server.url("/api/topics"))
        .header("origin", "http://localhost:5173")
        .send()
        .await
        .expect("preflight");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:5173")
    );

    let resp = server
        .http
        .get(server.url("/healthz"))
        .header("origin", "https://evil.example")
        .header("x-request-id", "req-trace-1")
        .send()
        .await
        .expect("healthz");
    assert!(resp.headers().get("access-control-allow-origin").is_none());
    assert_eq!(
        resp.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("req-trace-1")
    );

    let token = server.login().await;
    let big = json!({"visualLogic": "帽".repeat(2048)});
    let resp = server.post_authed(&token, "/api/translate-prompt", &big).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = resp.json().await.expect("error json");
    assert_eq!(body["error"]["code"], "PayloadTooLarge");
}

#[tokio::test]
async fn unknown_route_uses_error_envelope_and_catalog_is_served() {
    let server = spawn_server(ApiConfig::default(), Vec::new()).await;
    let resp = server
        .http
        .get(server.url("/api/nope"))
        .send()
        .await
        .expect("unknown");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.expect("error json");
    assert_eq!(body["error"]["details"]["path"], "/api/nope");

    let token = server.login().await;
    let resp = server
        .http
        .get(server.url("/api/catalog"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("catalog");
    let body: Value = resp.json().await.expect("catalog json");
    assert_eq!(body["faceShapes"].as_array().map(Vec::len), Some(6));
    assert_eq!(body["hatTypes"].as_array().map(Vec::len), Some(9));
    assert_eq!(body["knowledgeBase"].as_array().map(Vec::len), Some(5));
}
