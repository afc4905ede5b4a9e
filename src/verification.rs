//! Bot verification against Cloudflare Turnstile `siteverify`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::policy::FailPolicy;

pub const DEFAULT_VERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("verification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("verification service returned {0}")]
    Status(u16),
}

#[async_trait]
pub trait BotVerifier: Send + Sync {
    /// Decide whether the caller is human.
    async fn verify_human(&self, token: Option<&str>, remote_ip: Option<&str>) -> bool;
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

#[derive(Clone)]
pub struct TurnstileVerifier {
    http: reqwest::Client,
    secret: Option<String>,
    verify_url: String,
    require_token: bool,
    on_error: FailPolicy,
}

impl TurnstileVerifier {
    pub fn new(secret: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            secret: secret.filter(|s| !s.trim().is_empty()),
            verify_url: DEFAULT_VERIFY_URL.to_string(),
            require_token: false,
            on_error: FailPolicy::Closed,
        }
    }

    pub fn with_verify_url(mut self, url: impl Into<String>) -> Self {
        self.verify_url = url.into();
        self
    }

    /// Treat a missing token as a failed check instead of skipping it.
    pub fn with_require_token(mut self, require_token: bool) -> Self {
        self.require_token = require_token;
        self
    }

    pub fn with_error_policy(mut self, on_error: FailPolicy) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    async fn siteverify(
        &self,
        secret: &str,
        token: &str,
        remote_ip: Option<&str>,
    ) -> Result<bool, VerifyError> {
        let mut form = vec![("secret", secret), ("response", token)];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response = self.http.post(&self.verify_url).form(&form).send().await?;
        if !response.status().is_success() {
            return Err(VerifyError::Status(response.status().as_u16()));
        }

        let body: SiteVerifyResponse = response.json().await?;
        if !body.success {
            tracing::debug!(error_codes = ?body.error_codes, "turnstile rejected token");
        }
        Ok(body.success)
    }
}

#[async_trait]
impl BotVerifier for TurnstileVerifier {
    async fn verify_human(&self, token: Option<&str>, remote_ip: Option<&str>) -> bool {
        let Some(secret) = self.secret.as_deref() else {
            return true;
        };
        let Some(token) = token else {
            return !self.require_token;
        };

        match self.siteverify(secret, token, remote_ip).await {
            Ok(success) => success,
            Err(e) => {
                tracing::warn!(error = %e, "bot verification unavailable");
                self.on_error.admits()
            }
        }
    }
}
