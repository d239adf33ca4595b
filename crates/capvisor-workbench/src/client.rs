// SPDX-License-Identifier: Apache-2.0

use crate::session::Session;
use capvisor_api::{
    ApiError, ApiErrorBody, CatalogResponse, HealthResponse, ImageRequest, ImageResponse,
    LoginRequest, LoginResponse, LogsResponse, ScoreRequest, ScoreResponse, SkeletonRequest,
    SkeletonResponse, TopicsResponse, TranslateRequest, TranslateResponse,
};
use capvisor_model::{AssetCardData, TargetingParameters, TopicCard};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8787";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug)]
#[non_exhaustive]
pub enum ClientError {
    Transport(String),
    Status { status: u16, body: String },
    Decode(String),
    Storage(String),
    NotAuthenticated,
}

impl ClientError {
    /// Service error envelope carried by a non-2xx reply, when the body is one.
    #[must_use]
    pub fn api_error(&self) -> Option<ApiError> {
        match self {
            Self::Status { body, .. } => serde_json::from_str::<ApiErrorBody>(body)
                .ok()
                .map(|b| b.error),
            _ => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "request failed: {msg}"),
            Self::Status { status, body } => match self.api_error() {
                Some(err) => write!(f, "server returned {status}: {err}"),
                None => write!(f, "server returned {status}: {body}"),
            },
            Self::Decode(msg) => write!(f, "unexpected response body: {msg}"),
            Self::Storage(msg) => write!(f, "token storage: {msg}"),
            Self::NotAuthenticated => f.write_str("not logged in; run `capvisor login` first"),
        }
    }
}

impl std::error::Error for ClientError {}

/// Typed client for the CapVisor service; protected calls carry the session's bearer token.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Session) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn bearer(&self) -> Result<&str, ClientError> {
        self.session.token().ok_or(ClientError::NotAuthenticated)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let resp = request
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "request rejected");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn get_authed<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let token = self.bearer()?;
        self.send(self.http.get(self.url(path)).bearer_auth(token))
            .await
    }

    async fn post_authed<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let token = self.bearer()?;
        self.send(self.http.post(self.url(path)).bearer_auth(token).json(body))
            .await
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.send(self.http.get(self.url("/healthz"))).await
    }

    /// Signs in and stores the token in the session.
    #[instrument(skip(self, password))]
    pub async fn login(&mut self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let resp: LoginResponse = self
            .send(
                self.http
                    .post(self.url("/api/auth/login"))
                    .json(&LoginRequest::new(email, password)),
            )
            .await?;
        self.session.sign_in(resp.token.clone(), resp.user.clone())?;
        Ok(resp)
    }

    pub fn logout(&mut self) -> Result<(), ClientError> {
        self.session.sign_out()
    }

    pub async fn catalog(&self) -> Result<CatalogResponse, ClientError> {
        self.get_authed("/api/catalog").await
    }

    pub async fn topics(&self, params: &TargetingParameters) -> Result<Vec<TopicCard>, ClientError> {
        let resp: TopicsResponse = self.post_authed("/api/topics", params).await?;
        Ok(resp.topics)
    }

    pub async fn skeleton(
        &self,
        topic: &TopicCard,
        params: &TargetingParameters,
    ) -> Result<Vec<AssetCardData>, ClientError> {
        let body = SkeletonRequest {
            topic: topic.clone(),
            params: params.clone(),
        };
        let resp: SkeletonResponse = self.post_authed("/api/skeleton", &body).await?;
        Ok(resp.stream)
    }

    pub async fn translate(&self, visual_logic: &str) -> Result<String, ClientError> {
        let body = TranslateRequest {
            visual_logic: visual_logic.to_string(),
        };
        let resp: TranslateResponse = self.post_authed("/api/translate-prompt", &body).await?;
        Ok(resp.prompt)
    }

    pub async fn image(&self, prompt: &str) -> Result<String, ClientError> {
        let body = ImageRequest {
            prompt: prompt.to_string(),
        };
        let resp: ImageResponse = self.post_authed("/api/image", &body).await?;
        Ok(resp.image_url)
    }

    pub async fn score(&self, image_url: &str, prompt: &str) -> Result<f64, ClientError> {
        let body = ScoreRequest {
            image_url: image_url.to_string(),
            prompt: prompt.to_string(),
        };
        let resp: ScoreResponse = self.post_authed("/api/score", &body).await?;
        Ok(resp.score)
    }

    pub async fn logs(&self) -> Result<LogsResponse, ClientError> {
        self.get_authed("/api/logs").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryTokenStore;

    #[tokio::test]
    async fn protected_calls_without_token_fail_before_sending() {
        let session = Session::init_from_storage(Box::new(MemoryTokenStore::default())).expect("session");
        let client = ApiClient::new("http://127.0.0.1:9", session).expect("client");
        let err = client.catalog().await.expect_err("no token");
        assert!(matches!(err, ClientError::NotAuthenticated));
    }

    #[test]
    fn status_error_exposes_service_envelope() {
        let err = ClientError::Status {
            status: 401,
            body: r#"{"error":{"code":"Unauthorized","message":"invalid credentials","details":{},"request_id":"req-1"}}"#.to_string(),
        };
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.api_error().map(|e| e.message), Some("invalid credentials".to_string()));
        assert!(err.to_string().contains("invalid credentials"));

        let plain = ClientError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert!(plain.api_error().is_none());
        assert!(plain.to_string().contains("bad gateway"));
    }
}
