// SPDX-License-Identifier: Apache-2.0

use crate::store::{SqliteStore, StoreError};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::{spawn_blocking, JoinError};
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

const HASH_SCHEME: &str = "pbkdf2-sha256";
const SALT_BYTES: usize = 16;
const TOKEN_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthError {
    MalformedToken(String),
    BadSignature,
    Expired,
    MalformedHash,
    Crypto(String),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedToken(msg) => write!(f, "malformed token: {msg}"),
            Self::BadSignature => f.write_str("token signature mismatch"),
            Self::Expired => f.write_str("token expired"),
            Self::MalformedHash => f.write_str("stored password hash is malformed"),
            Self::Crypto(msg) => write!(f, "crypto failure: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

fn keyed_mac(key: &[u8]) -> Result<HmacSha256, AuthError> {
    HmacSha256::new_from_slice(key).map_err(|e| AuthError::Crypto(e.to_string()))
}

/// PBKDF2-HMAC-SHA256 with a single 32-byte output block.
fn pbkdf2_sha256(password: &[u8], salt: &[u8], rounds: u32) -> Result<[u8; 32], AuthError> {
    let prf = keyed_mac(password)?;
    let mut mac = prf.clone();
    mac.update(salt);
    mac.update(&1u32.to_be_bytes());
    let mut block = [0u8; 32];
    block.copy_from_slice(&mac.finalize().into_bytes());
    let mut out = block;
    for _ in 1..rounds {
        let mut mac = prf.clone();
        mac.update(&block);
        block.copy_from_slice(&mac.finalize().into_bytes());
        for (o, b) in out.iter_mut().zip(block) {
            *o ^= b;
        }
    }
    Ok(out)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Encodes as `pbkdf2-sha256$<rounds>$<salt hex>$<digest hex>`.
pub fn hash_password(password: &str, rounds: u32) -> Result<String, AuthError> {
    let mut salt = [0u8; SALT_BYTES];
    rand::rng().fill(&mut salt);
    let digest = pbkdf2_sha256(password.as_bytes(), &salt, rounds)?;
    Ok(format!(
        "{HASH_SCHEME}${rounds}${}${}",
        hex::encode(salt),
        hex::encode(digest)
    ))
}

pub fn verify_password(password: &str, encoded: &str) -> Result<bool, AuthError> {
    let mut parts = encoded.split('$');
    let (Some(HASH_SCHEME), Some(rounds), Some(salt), Some(digest), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(AuthError::MalformedHash);
    };
    let rounds: u32 = rounds.parse().map_err(|_| AuthError::MalformedHash)?;
    let salt = hex::decode(salt).map_err(|_| AuthError::MalformedHash)?;
    let expected = hex::decode(digest).map_err(|_| AuthError::MalformedHash)?;
    if rounds == 0 {
        return Err(AuthError::MalformedHash);
    }
    let actual = pbkdf2_sha256(password.as_bytes(), &salt, rounds)?;
    Ok(constant_time_eq(&actual, &expected))
}

/// Runs the password check on the blocking pool; the key stretch is CPU-bound.
pub async fn verify_password_blocking(
    password: String,
    encoded: String,
) -> Result<Result<bool, AuthError>, JoinError> {
    spawn_blocking(move || verify_password(&password, &encoded)).await
}

/// Canonical form used for both stored and submitted emails.
#[must_use]
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub iat: u64,
    pub exp: u64,
}

/// Authenticated caller, attached to requests that pass the bearer check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub Claims);

#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Issues and checks HS256 compact tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Arc<[u8]>,
    ttl: Duration,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            secret: Arc::from(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user_id: i64, email: &str) -> Result<String, AuthError> {
        self.issue_at(user_id, email, unix_now())
    }

    pub fn issue_at(&self, user_id: i64, email: &str, now: u64) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs()),
        };
        let payload = serde_json::to_vec(&claims).map_err(|e| AuthError::Crypto(e.to_string()))?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(TOKEN_HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let mut mac = keyed_mac(&self.secret)?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{signing_input}.{signature}"))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, unix_now())
    }

    pub fn verify_at(&self, token: &str, now: u64) -> Result<Claims, AuthError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::MalformedToken("expected three segments".to_string()));
        };
        let header_json: serde_json::Value = decode_segment(header)?;
        if header_json.get("alg").and_then(|v| v.as_str()) != Some("HS256") {
            return Err(AuthError::MalformedToken("unsupported alg".to_string()));
        }
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| AuthError::MalformedToken(format!("signature: {e}")))?;
        let mut mac = keyed_mac(&self.secret)?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::BadSignature)?;
        let claims: Claims = decode_segment(payload)?;
        if claims.exp <= now {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::MalformedToken(format!("base64: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::MalformedToken(format!("json: {e}")))
}

#[derive(Debug, Deserialize)]
struct SeedUser {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// Seeds users from a `[{email, password}]` document. Unparseable input is logged and
/// skipped; only store failures are returned.
pub async fn seed_users_from_json(
    store: &SqliteStore,
    raw: Option<&str>,
    rounds: u32,
) -> Result<usize, StoreError> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Ok(0);
    };
    let users: Vec<SeedUser> = match serde_json::from_str(raw) {
        Ok(users) => users,
        Err(err) => {
            warn!(error = %err, "USERS_JSON parse failed, skip seeding");
            return Ok(0);
        }
    };
    let mut seeded = 0;
    for user in users {
        let (Some(email), Some(password)) = (user.email, user.password) else {
            continue;
        };
        let email = normalize_email(&email);
        if email.is_empty() || password.is_empty() {
            continue;
        }
        if store.find_user_by_email(&email).await?.is_some() {
            continue;
        }
        let hash = spawn_blocking(move || hash_password(&password, rounds))
            .await
            .map_err(|e| StoreError(format!("hash task: {e}")))?
            .map_err(|e| StoreError(e.to_string()))?;
        if store.insert_user(&email, &hash).await? {
            info!(email = %email, "seeded user");
            seeded += 1;
        }
    }
    Ok(seeded)
}
