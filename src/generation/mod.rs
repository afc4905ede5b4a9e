//! Generation proxy: one call to the hosted model per request.

pub mod gemini;
pub mod normalize;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

pub use gemini::GeminiClient;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("generative model credentials are not configured")]
    MissingCredentials,

    #[error("request to model failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model provider is rate limiting: {0}")]
    RateLimited(String),

    #[error("model provider returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    #[error("model response contained no image")]
    NoImage,

    #[error("prompt blocked by model: {0}")]
    Blocked(String),
}

impl ProviderError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }
}

/// Which model a request runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    /// Base64 payload, without a `data:` prefix.
    pub data: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputMode {
    Text,
    /// JSON constrained to the given response schema.
    Json(Value),
    Image,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub tier: ModelTier,
    pub system_instruction: Option<String>,
    pub prompt: String,
    pub image: Option<InlineImage>,
    pub output: OutputMode,
    pub search_grounding: bool,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            tier: ModelTier::Text,
            system_instruction: None,
            prompt: prompt.into(),
            image: None,
            output: OutputMode::Text,
            search_grounding: false,
        }
    }

    pub fn json(prompt: impl Into<String>, schema: Value) -> Self {
        Self {
            output: OutputMode::Json(schema),
            ..Self::text(prompt)
        }
    }

    pub fn image_edit(prompt: impl Into<String>, image: InlineImage) -> Self {
        Self {
            tier: ModelTier::Image,
            image: Some(image),
            output: OutputMode::Image,
            ..Self::text(prompt)
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_search_grounding(mut self) -> Self {
        self.search_grounding = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    InlineData { mime_type: String, data: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroundingChunk {
    Web { uri: String, title: String },
    /// Retrieved-context and other non-web chunks.
    Other,
}

/// Citation surfaced to callers of search-grounded endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub uri: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationResponse {
    pub parts: Vec<Part>,
    pub grounding: Vec<GroundingChunk>,
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, ProviderError>;
}
