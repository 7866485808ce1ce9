//! # Box JWT Application Auth
//!
//! Exchanges a signed JWT assertion for an access token scoped to a single
//! Box user. The RSA key is decoded once when the authenticator is built,
//! so a bad key or passphrase fails at startup rather than per request.

use crate::{
    constants::{BOX_TOKEN_URL, JWT_BEARER_GRANT_TYPE},
    errors::SkillError,
};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use pkcs8::DecodePrivateKey;
use reqwest::Client as ReqwestClient;
use rsa::{pkcs1::EncodeRsaPrivateKey, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error};
use uuid::Uuid;

/// Box rejects assertions that expire more than 60 seconds out.
const ASSERTION_LIFETIME_SECS: i64 = 45;

/// Credentials of a Box application using server authentication (JWT).
#[derive(Clone)]
pub struct BoxAppAuth {
    pub client_id: String,
    pub client_secret: String,
    pub key_id: String,
    /// PEM-encoded RSA private key, encrypted PKCS#8 or plain.
    pub private_key: String,
    /// Unlocks an encrypted key. Empty for unencrypted keys.
    pub passphrase: String,
}

impl fmt::Debug for BoxAppAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxAppAuth")
            .field("client_id", &self.client_id)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BoxAssertionClaims {
    pub iss: String,
    pub sub: String,
    pub box_sub_type: String,
    pub aud: String,
    pub jti: String,
    pub exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Decodes an RSA private key into a signing key.
///
/// Encrypted PKCS#8 keys are unlocked with `passphrase`; any other PEM is
/// handed to `jsonwebtoken` as-is.
pub fn decode_signing_key(pem: &str, passphrase: &str) -> Result<EncodingKey, SkillError> {
    if pem.contains("BEGIN ENCRYPTED PRIVATE KEY") {
        let key = RsaPrivateKey::from_pkcs8_encrypted_pem(pem, passphrase.as_bytes())
            .map_err(|e| SkillError::Key(format!("failed to decrypt private key: {e}")))?;
        let der = key
            .to_pkcs1_der()
            .map_err(|e| SkillError::Key(e.to_string()))?;
        Ok(EncodingKey::from_rsa_der(der.as_bytes()))
    } else {
        EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| SkillError::Key(e.to_string()))
    }
}

/// Signs assertions and exchanges them for user-scoped access tokens.
#[derive(Clone)]
pub struct BoxAuthenticator {
    client: ReqwestClient,
    token_url: String,
    client_id: String,
    client_secret: String,
    key_id: String,
    signing_key: EncodingKey,
}

impl fmt::Debug for BoxAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxAuthenticator")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl BoxAuthenticator {
    pub fn new(client: ReqwestClient, auth: BoxAppAuth) -> Result<Self, SkillError> {
        let signing_key = decode_signing_key(&auth.private_key, &auth.passphrase)?;
        Ok(Self {
            client,
            token_url: BOX_TOKEN_URL.to_string(),
            client_id: auth.client_id,
            client_secret: auth.client_secret,
            key_id: auth.key_id,
            signing_key,
        })
    }

    /// Overrides the token endpoint, which is also the assertion audience.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Builds the signed RS512 assertion for `user_id`.
    pub fn assertion_for_user(&self, user_id: &str) -> Result<String, SkillError> {
        let claims = BoxAssertionClaims {
            iss: self.client_id.clone(),
            sub: user_id.to_string(),
            box_sub_type: "user".to_string(),
            aud: self.token_url.clone(),
            jti: Uuid::new_v4().to_string(),
            exp: Utc::now().timestamp() + ASSERTION_LIFETIME_SECS,
        };
        let header = Header {
            kid: Some(self.key_id.clone()),
            ..Header::new(Algorithm::RS512)
        };
        Ok(encode(&header, &claims, &self.signing_key)?)
    }

    /// Obtains an access token acting as `user_id`.
    pub async fn user_access_token(&self, user_id: &str) -> Result<String, SkillError> {
        let assertion = self.assertion_for_user(user_id)?;
        debug!(user_id, "Requesting Box user access token");

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT_TYPE),
                ("assertion", assertion.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SkillError::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {description}", err.error),
                    None => err.error,
                },
                Err(_) => body,
            };
            error!(%status, user_id, "Box token exchange rejected: {reason}");
            return Err(SkillError::Auth(format!(
                "token exchange returned {status}: {reason}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SkillError::Auth(format!("invalid token response: {e}")))?;
        Ok(token.access_token)
    }
}
