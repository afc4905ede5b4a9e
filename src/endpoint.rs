//! Per-endpoint gates, request building and response rendering.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::error::ApiError;
use crate::generation::normalize::{first_inline_image, parse_json, response_text, web_sources};
use crate::generation::{GenerationRequest, GenerationResponse, InlineImage, ProviderError};
use crate::payloads::*;
use crate::prompts;

/// Quota resource name for image generation.
pub const IMAGE_RESOURCE: &str = "image";

/// Gates applied before the generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gates {
    Open,
    /// Short per-device window.
    RateLimited,
    /// Bot check, monthly cap and daily lock, with compensation on failure.
    Metered { resource: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    GenerateNames,
    GenerateBio,
    GenerateImage,
    AnalyzePersonality,
    ExpertConsultant,
    NameMeaning,
    NameOfTheDay,
    PetHoroscope,
    QuickFireNames,
    SearchGrounding,
    TranslateName,
}

impl Endpoint {
    pub const ALL: [Endpoint; 11] = [
        Endpoint::GenerateNames,
        Endpoint::GenerateBio,
        Endpoint::GenerateImage,
        Endpoint::AnalyzePersonality,
        Endpoint::ExpertConsultant,
        Endpoint::NameMeaning,
        Endpoint::NameOfTheDay,
        Endpoint::PetHoroscope,
        Endpoint::QuickFireNames,
        Endpoint::SearchGrounding,
        Endpoint::TranslateName,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Endpoint::GenerateNames => "generate-names",
            Endpoint::GenerateBio => "generate-bio",
            Endpoint::GenerateImage => "generate-image",
            Endpoint::AnalyzePersonality => "analyze-personality",
            Endpoint::ExpertConsultant => "expert-consultant",
            Endpoint::NameMeaning => "name-meaning",
            Endpoint::NameOfTheDay => "name-of-the-day",
            Endpoint::PetHoroscope => "pet-horoscope",
            Endpoint::QuickFireNames => "quick-fire-names",
            Endpoint::SearchGrounding => "search-grounding",
            Endpoint::TranslateName => "translate-name",
        }
    }

    pub fn gates(self) -> Gates {
        match self {
            Endpoint::GenerateNames | Endpoint::GenerateBio => Gates::RateLimited,
            Endpoint::GenerateImage => Gates::Metered {
                resource: IMAGE_RESOURCE,
            },
            _ => Gates::Open,
        }
    }

    /// Validate the body and build the model call.
    pub fn prepare(self, body: &[u8]) -> Result<GenerationRequest, ApiError> {
        let request = match self {
            Endpoint::GenerateNames => {
                let req: GenerateNamesRequest = parse_body(body)?;
                GenerationRequest::json(prompts::names(&req), prompts::names_schema())
            }
            Endpoint::GenerateBio => {
                let req: GenerateBioRequest = parse_body(body)?;
                GenerationRequest::json(prompts::bio(&req), prompts::bio_schema())
            }
            Endpoint::GenerateImage => {
                let req: GenerateImageRequest = parse_body(body)?;
                let image = inline_image(&req)?;
                GenerationRequest::image_edit(prompts::image_edit(&req), image)
            }
            Endpoint::AnalyzePersonality => {
                let req: AnalyzePersonalityRequest = parse_body(body)?;
                GenerationRequest::json(prompts::personality(&req), prompts::personality_schema())
            }
            Endpoint::ExpertConsultant => {
                let req: ExpertConsultantRequest = parse_body(body)?;
                GenerationRequest::text(req.message.clone())
                    .with_system_instruction(prompts::consultant_instruction(
                        &req.system_instruction,
                        req.language.as_deref(),
                    ))
                    .with_search_grounding()
            }
            Endpoint::NameMeaning => {
                let req: NameMeaningRequest = parse_body(body)?;
                GenerationRequest::json(prompts::name_meaning(&req), prompts::name_meaning_schema())
            }
            Endpoint::NameOfTheDay => {
                let req: NameOfTheDayRequest = parse_body(body)?;
                GenerationRequest::json(
                    prompts::name_of_the_day(&req, Utc::now().date_naive()),
                    prompts::name_of_the_day_schema(),
                )
            }
            Endpoint::PetHoroscope => {
                let req: PetHoroscopeRequest = parse_body(body)?;
                GenerationRequest::json(prompts::horoscope(&req), prompts::horoscope_schema())
            }
            Endpoint::QuickFireNames => {
                let req: QuickFireNamesRequest = parse_body(body)?;
                GenerationRequest::json(prompts::quick_fire(&req), prompts::quick_fire_schema())
            }
            Endpoint::SearchGrounding => {
                let req: SearchGroundingRequest = parse_body(body)?;
                GenerationRequest::text(prompts::search(&req)).with_search_grounding()
            }
            Endpoint::TranslateName => {
                let req: TranslateNameRequest = parse_body(body)?;
                GenerationRequest::json(prompts::translate(&req), prompts::translate_schema())
            }
        };
        Ok(request)
    }

    /// Turn the model output into this endpoint's success body.
    pub fn render(self, response: &GenerationResponse) -> Result<Value, ProviderError> {
        match self {
            Endpoint::GenerateNames => {
                let mut out: NamesOutput = parse_json(response)?;
                for (i, suggestion) in out.names.iter_mut().enumerate() {
                    if suggestion.id.trim().is_empty() {
                        suggestion.id = (i + 1).to_string();
                    }
                }
                to_body(&out)
            }
            Endpoint::GenerateBio => to_body(&parse_json::<BiosOutput>(response)?),
            Endpoint::GenerateImage => {
                let image_url = first_inline_image(response).ok_or(ProviderError::NoImage)?;
                to_body(&ImageOutput { image_url })
            }
            Endpoint::AnalyzePersonality => to_body(&parse_json::<PersonalityOutput>(response)?),
            Endpoint::ExpertConsultant => to_body(&ConsultantOutput {
                text: response_text(response).trim().to_string(),
                sources: web_sources(response),
            }),
            Endpoint::NameMeaning => to_body(&parse_json::<MeaningOutput>(response)?),
            Endpoint::NameOfTheDay => to_body(&parse_json::<NameOfTheDayOutput>(response)?),
            Endpoint::PetHoroscope => to_body(&parse_json::<HoroscopeOutput>(response)?),
            Endpoint::QuickFireNames => to_body(&parse_json::<QuickFireOutput>(response)?),
            Endpoint::SearchGrounding => to_body(&parse_json::<SearchOutput>(response)?),
            Endpoint::TranslateName => to_body(&parse_json::<TranslationOutput>(response)?),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Endpoint {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::ALL
            .into_iter()
            .find(|endpoint| endpoint.name() == s)
            .ok_or_else(|| ApiError::UnknownEndpoint(s.to_string()))
    }
}

fn parse_body<T: DeserializeOwned + Validate>(body: &[u8]) -> Result<T, ApiError> {
    let value: T =
        serde_json::from_slice(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
    value
        .validate()
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
    Ok(value)
}

fn to_body<T: Serialize>(out: &T) -> Result<Value, ProviderError> {
    serde_json::to_value(out).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// Accept raw base64 or a full data URL from the client.
fn inline_image(req: &GenerateImageRequest) -> Result<InlineImage, ApiError> {
    if !req.mime_type.starts_with("image/") {
        return Err(ApiError::InvalidRequest(format!(
            "unsupported mime type '{}'",
            req.mime_type
        )));
    }
    let data = match req.base64_image.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => req.base64_image.as_str(),
    };
    if data.trim().is_empty() {
        return Err(ApiError::InvalidRequest("image data is empty".to_string()));
    }
    Ok(InlineImage {
        mime_type: req.mime_type.clone(),
        data: data.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{GroundingChunk, ModelTier, OutputMode, Part};
    use serde_json::json;

    fn text(text: &str) -> GenerationResponse {
        GenerationResponse {
            parts: vec![Part::Text(text.to_string())],
            grounding: Vec::new(),
        }
    }

    #[test]
    fn test_names_round_trip_through_path() {
        for endpoint in Endpoint::ALL {
            assert_eq!(endpoint.name().parse::<Endpoint>().unwrap(), endpoint);
        }
        assert!(matches!(
            "generate-cats".parse::<Endpoint>(),
            Err(ApiError::UnknownEndpoint(_))
        ));
    }

    #[test]
    fn test_gate_assignment() {
        assert_eq!(Endpoint::GenerateNames.gates(), Gates::RateLimited);
        assert_eq!(Endpoint::GenerateBio.gates(), Gates::RateLimited);
        assert_eq!(
            Endpoint::GenerateImage.gates(),
            Gates::Metered { resource: "image" }
        );
        assert_eq!(Endpoint::TranslateName.gates(), Gates::Open);
        assert_eq!(Endpoint::SearchGrounding.gates(), Gates::Open);
    }

    #[test]
    fn test_prepare_rejects_bad_bodies() {
        assert!(matches!(
            Endpoint::NameMeaning.prepare(b"not json"),
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(matches!(
            Endpoint::NameMeaning.prepare(br#"{"name":""}"#),
            Err(ApiError::InvalidRequest(_))
        ));
        let body = json!({ "base64Image": "AAAA", "mimeType": "text/plain" }).to_string();
        assert!(matches!(
            Endpoint::GenerateImage.prepare(body.as_bytes()),
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_prepare_image_strips_data_url() {
        let body = json!({
            "base64Image": "data:image/jpeg;base64,QUJD",
            "mimeType": "image/jpeg",
            "prompt": "add a crown",
            "style": "watercolor"
        })
        .to_string();
        let request = Endpoint::GenerateImage.prepare(body.as_bytes()).unwrap();
        assert_eq!(request.tier, ModelTier::Image);
        assert_eq!(request.output, OutputMode::Image);
        assert_eq!(request.image.unwrap().data, "QUJD");
        assert!(request.prompt.contains("add a crown"));
    }

    #[test]
    fn test_prepare_consultant_uses_search() {
        let body = json!({
            "message": "Can dogs eat grapes?",
            "systemInstruction": "",
            "language": "de"
        });
        let request = Endpoint::ExpertConsultant
            .prepare(body.to_string().as_bytes())
            .unwrap();
        assert!(request.search_grounding);
        assert_eq!(request.prompt, "Can dogs eat grapes?");
        assert!(request.system_instruction.unwrap().contains("\"de\""));
    }

    #[test]
    fn test_render_names_fills_missing_ids() {
        let names = json!({ "names": [
            { "name": "Mochi", "meaning": "rice cake" },
            { "id": "x", "name": "Bo", "meaning": "" }
        ]});
        let response = text(&format!("```json\n{names}\n```"));
        let body = Endpoint::GenerateNames.render(&response).unwrap();
        assert_eq!(body["names"][0]["id"], "1");
        assert_eq!(body["names"][1]["id"], "x");
    }

    #[test]
    fn test_render_image_requires_image_part() {
        let err = Endpoint::GenerateImage.render(&text("sorry")).unwrap_err();
        assert!(matches!(err, ProviderError::NoImage));

        let response = GenerationResponse {
            parts: vec![Part::InlineData {
                mime_type: "image/png".into(),
                data: "iVBO".into(),
            }],
            grounding: Vec::new(),
        };
        let body = Endpoint::GenerateImage.render(&response).unwrap();
        assert_eq!(body, json!({ "imageUrl": "data:image/png;base64,iVBO" }));
    }

    #[test]
    fn test_render_consultant_with_sources() {
        let response = GenerationResponse {
            parts: vec![Part::Text(" No, grapes are toxic. ".into())],
            grounding: vec![
                GroundingChunk::Web {
                    uri: "https://vet.example".into(),
                    title: "Vet".into(),
                },
                GroundingChunk::Other,
            ],
        };
        let body = Endpoint::ExpertConsultant.render(&response).unwrap();
        assert_eq!(body["text"], "No, grapes are toxic.");
        assert_eq!(body["sources"], json!([{ "uri": "https://vet.example", "title": "Vet" }]));
    }

    #[test]
    fn test_render_rejects_malformed_json() {
        let err = Endpoint::PetHoroscope.render(&text("{\"prediction\":")).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn test_render_search_results() {
        let results = json!({ "results": [
            { "name": "Happy Tails", "website": "https://ht.example" }
        ]});
        let response = text(&format!("```json\n{results}\n```"));
        let body = Endpoint::SearchGrounding.render(&response).unwrap();
        assert_eq!(body["results"][0]["name"], "Happy Tails");
        assert_eq!(body["results"][0]["phone"], "");
    }
}
