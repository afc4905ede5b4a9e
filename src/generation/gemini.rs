use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::{
    GenerationRequest, GenerationResponse, Generator, GroundingChunk, ModelTier, OutputMode, Part,
    ProviderError,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Client for the Gemini `generateContent` API.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    text_model: String,
    image_model: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_models(
        mut self,
        text_model: impl Into<String>,
        image_model: impl Into<String>,
    ) -> Self {
        self.text_model = text_model.into();
        self.image_model = image_model.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn generate_url(&self, tier: ModelTier) -> String {
        let model = match tier {
            ModelTier::Text => self.text_model.trim(),
            ModelTier::Image => self.image_model.trim(),
        };
        let base = self.base_url.trim_end_matches('/');
        if model.starts_with("models/") {
            format!("{base}/{model}:generateContent")
        } else {
            format!("{base}/models/{model}:generateContent")
        }
    }

    /// Request body in the `generateContent` wire format.
    pub fn request_body(request: &GenerationRequest) -> Value {
        let mut parts = Vec::new();
        if let Some(image) = &request.image {
            parts.push(json!({
                "inlineData": { "mimeType": image.mime_type, "data": image.data }
            }));
        }
        parts.push(json!({ "text": request.prompt }));

        let mut body = Map::new();
        body.insert(
            "contents".to_string(),
            json!([{ "role": "user", "parts": parts }]),
        );

        if let Some(instruction) = &request.system_instruction {
            body.insert(
                "systemInstruction".to_string(),
                json!({ "parts": [{ "text": instruction }] }),
            );
        }

        if request.search_grounding {
            body.insert("tools".to_string(), json!([{ "googleSearch": {} }]));
        }

        match &request.output {
            OutputMode::Text => {}
            OutputMode::Json(schema) => {
                body.insert(
                    "generationConfig".to_string(),
                    json!({
                        "responseMimeType": "application/json",
                        "responseSchema": schema,
                    }),
                );
            }
            OutputMode::Image => {
                body.insert(
                    "generationConfig".to_string(),
                    json!({ "responseModalities": ["TEXT", "IMAGE"] }),
                );
            }
        }

        Value::Object(body)
    }

    fn parse_response(wire: WireResponse) -> Result<GenerationResponse, ProviderError> {
        let Some(candidate) = wire.candidates.into_iter().next() else {
            if let Some(reason) = wire.prompt_feedback.and_then(|f| f.block_reason) {
                return Err(ProviderError::Blocked(reason));
            }
            return Err(ProviderError::InvalidResponse("no candidates".to_string()));
        };

        let parts = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| match (part.text, part.inline_data) {
                (_, Some(inline)) => Some(Part::InlineData {
                    mime_type: inline.mime_type,
                    data: inline.data,
                }),
                (Some(text), None) => Some(Part::Text(text)),
                (None, None) => None,
            })
            .collect();

        let grounding = candidate
            .grounding_metadata
            .map(|meta| meta.grounding_chunks)
            .unwrap_or_default()
            .into_iter()
            .map(|chunk| match chunk.web {
                Some(web) => GroundingChunk::Web {
                    uri: web.uri.unwrap_or_default(),
                    title: web.title.unwrap_or_default(),
                },
                None => GroundingChunk::Other,
            })
            .collect();

        Ok(GenerationResponse { parts, grounding })
    }
}

fn classify_failure(status: u16, body: &str) -> ProviderError {
    let detail = serde_json::from_str::<WireErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error);
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| body.chars().take(200).collect());
    let exhausted = detail
        .as_ref()
        .and_then(|d| d.status.as_deref())
        .is_some_and(|s| s == "RESOURCE_EXHAUSTED");

    if status == 429 || exhausted {
        ProviderError::RateLimited(message)
    } else {
        ProviderError::Status { status, message }
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredentials)?;

        let url = self.generate_url(request.tier);
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&Self::request_body(&request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &body));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Self::parse_response(wire)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    prompt_feedback: Option<WirePromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<WireContent>,
    grounding_metadata: Option<WireGroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    text: Option<String>,
    inline_data: Option<WireInlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireGroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<WireGroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct WireGroundingChunk {
    web: Option<WireWebChunk>,
}

#[derive(Debug, Deserialize)]
struct WireWebChunk {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireErrorEnvelope {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: Option<String>,
    status: Option<String>,
}
