use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::generation::ProviderError;

/// Error token attached to responses for the request log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(pub &'static str);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("request body exceeds the configured limit")]
    PayloadTooLarge,

    #[error("bot verification failed")]
    BotVerificationFailed,

    #[error("global monthly cap reached")]
    GlobalCapReached,

    #[error("daily limit reached")]
    LimitReached,

    #[error("rate limited")]
    RateLimited,

    /// The model provider is throttling us; the caller's quota was returned.
    #[error("upstream busy: {0}")]
    UpstreamBusy(#[source] ProviderError),

    /// A metered generation failed; the caller's quota was returned.
    #[error("upstream failed: {0}")]
    UpstreamFailed(#[source] ProviderError),

    /// An unmetered generation failed, or the provider is not configured.
    #[error("generation failed: {0}")]
    Generation(#[source] ProviderError),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    pub message: &'static str,
}

impl ApiError {
    /// Classify a failed call on a metered path.
    pub fn metered(err: ProviderError) -> Self {
        match err {
            ProviderError::MissingCredentials => ApiError::Generation(err),
            err if err.is_rate_limited() => ApiError::UpstreamBusy(err),
            err => ApiError::UpstreamFailed(err),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownEndpoint(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::BotVerificationFailed => StatusCode::UNAUTHORIZED,
            ApiError::GlobalCapReached => StatusCode::FORBIDDEN,
            ApiError::LimitReached | ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::UpstreamBusy(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::UpstreamFailed(_) => StatusCode::BAD_GATEWAY,
            ApiError::Generation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::UnknownEndpoint(_) => "UNKNOWN_ENDPOINT",
            ApiError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ApiError::BotVerificationFailed => "BOT_VERIFICATION_FAILED",
            ApiError::GlobalCapReached => "GLOBAL_CAP_REACHED",
            ApiError::LimitReached => "LIMIT_REACHED",
            ApiError::RateLimited => "RATE_LIMITED",
            ApiError::UpstreamBusy(_) => "UPSTREAM_BUSY",
            ApiError::UpstreamFailed(_) => "UPSTREAM_FAILED",
            ApiError::Generation(_) => "GENERATION_FAILED",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => {
                "Some of the details you sent look off. Please check and try again."
            }
            ApiError::UnknownEndpoint(_) => "Not found.",
            ApiError::PayloadTooLarge => "That photo is too large. Please pick a smaller one.",
            ApiError::BotVerificationFailed => {
                "We couldn't verify you're human. Please refresh and try again."
            }
            ApiError::GlobalCapReached => {
                "We've hit this month's limit for photo magic. Please come back next month!"
            }
            ApiError::LimitReached => "You've used today's free photo edit. Come back tomorrow!",
            ApiError::RateLimited => "Whoa, slow down! Please wait a few seconds and try again.",
            ApiError::UpstreamBusy(_) => {
                "Our AI is very busy right now. Please try again in a moment."
            }
            ApiError::UpstreamFailed(_) => {
                "Something went wrong creating your image. \
                 You haven't been charged, so feel free to retry."
            }
            ApiError::Generation(_) => "Something went wrong. Please try again.",
        }
    }

    /// Rejections by a gate or validation, as opposed to failures.
    pub fn is_rejection(&self) -> bool {
        self.status().is_client_error()
    }

    /// Only the gate taxonomy carries an error token in the body.
    fn exposes_code(&self) -> bool {
        matches!(
            self,
            ApiError::BotVerificationFailed
                | ApiError::GlobalCapReached
                | ApiError::LimitReached
                | ApiError::RateLimited
        )
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::InvalidRequest(rejection.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.is_rejection() {
            tracing::debug!(code = self.code(), "request rejected: {}", self);
        } else {
            tracing::warn!(code = self.code(), "request failed: {}", self);
        }

        let body = ErrorResponse {
            error: self.exposes_code().then(|| self.code()),
            message: self.user_message(),
        };
        let mut response = (self.status(), Json(body)).into_response();
        response.extensions_mut().insert(ErrorCode(self.code()));
        response
    }
}
