//! # Google Service Account Tokens
//!
//! Implements the OAuth 2.0 JWT bearer flow for service accounts: a signed
//! RS256 assertion is exchanged at the token URI for a short-lived access
//! token, which is cached until shortly before it expires.

use crate::{
    constants::{GOOGLE_TOKEN_URL, GOOGLE_VISION_SCOPE, JWT_BEARER_GRANT_TYPE},
    errors::SkillError,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tokio::sync::Mutex;
use tracing::{debug, error};

const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

/// The parts of a service account key file needed to mint tokens.
#[derive(Clone)]
pub struct ServiceAccountCredentials {
    pub project_id: String,
    pub client_email: String,
    /// PEM-encoded PKCS#8 private key.
    pub private_key: String,
}

impl fmt::Debug for ServiceAccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountCredentials")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceAccountClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Mints and caches access tokens for one service account.
///
/// Clones share the same cache.
#[derive(Clone)]
pub struct ServiceAccountTokenSource {
    client: ReqwestClient,
    token_url: String,
    client_email: String,
    signing_key: EncodingKey,
    cached: Arc<Mutex<Option<CachedToken>>>,
}

impl fmt::Debug for ServiceAccountTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountTokenSource")
            .field("token_url", &self.token_url)
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountTokenSource {
    pub fn new(
        client: ReqwestClient,
        credentials: &ServiceAccountCredentials,
    ) -> Result<Self, SkillError> {
        let signing_key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())
            .map_err(|e| SkillError::Key(format!("service account key: {e}")))?;
        Ok(Self {
            client,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            client_email: credentials.client_email.clone(),
            signing_key,
            cached: Arc::new(Mutex::new(None)),
        })
    }

    /// Overrides the token endpoint, which is also the assertion audience.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Builds the signed RS256 assertion for the Vision scope.
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String, SkillError> {
        let claims = ServiceAccountClaims {
            iss: self.client_email.clone(),
            scope: GOOGLE_VISION_SCOPE.to_string(),
            aud: self.token_url.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        Ok(encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.signing_key,
        )?)
    }

    /// Returns a valid access token, fetching a new one when the cached
    /// token is missing or about to expire.
    pub async fn access_token(&self) -> Result<String, SkillError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now {
                return Ok(token.access_token.clone());
            }
        }

        debug!(client_email = %self.client_email, "Fetching Google access token");
        let assertion = self.assertion(now)?;
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT_TYPE),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SkillError::Auth(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, "Google token exchange rejected: {body}");
            return Err(SkillError::Auth(format!(
                "token exchange returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SkillError::Auth(format!("invalid token response: {e}")))?;

        let fresh = CachedToken {
            access_token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        };
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }
}
