use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GoogleConfig;

/// Identity asserted by a verified Google ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GoogleAuthError {
    #[error("google token rejected: {0}")]
    Rejected(String),
    #[error("google tokeninfo request failed")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait GoogleTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, GoogleAuthError>;
}

/// Subset of Google's tokeninfo response.
#[derive(Debug, Deserialize)]
pub struct TokenInfo {
    pub aud: String,
    pub email: Option<String>,
    /// Google sends `"true"`/`"false"` strings; accept booleans too.
    pub email_verified: Option<serde_json::Value>,
    pub name: Option<String>,
}

impl TokenInfo {
    pub fn into_identity(self, client_id: &str) -> Result<GoogleIdentity, GoogleAuthError> {
        if self.aud != client_id {
            return Err(GoogleAuthError::Rejected("audience mismatch".into()));
        }
        let verified = match &self.email_verified {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s == "true",
            _ => false,
        };
        if !verified {
            return Err(GoogleAuthError::Rejected("email not verified".into()));
        }
        let email = self
            .email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| GoogleAuthError::Rejected("missing email".into()))?;
        Ok(GoogleIdentity {
            email,
            name: self.name,
        })
    }
}

/// Verifies ID tokens against Google's tokeninfo endpoint.
pub struct TokenInfoVerifier {
    http: reqwest::Client,
    client_id: String,
    tokeninfo_url: String,
}

impl TokenInfoVerifier {
    pub fn new(cfg: &GoogleConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            client_id: cfg.client_id.clone(),
            tokeninfo_url: cfg.tokeninfo_url.clone(),
        })
    }
}

#[async_trait]
impl GoogleTokenVerifier for TokenInfoVerifier {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, GoogleAuthError> {
        let res = self
            .http
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await?;

        if res.status().is_client_error() {
            warn!(status = %res.status(), "google rejected id token");
            return Err(GoogleAuthError::Rejected("invalid id token".into()));
        }
        let info: TokenInfo = res.error_for_status()?.json().await?;
        debug!(aud = %info.aud, "google tokeninfo received");
        info.into_identity(&self.client_id)
    }
}
