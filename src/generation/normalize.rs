use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

use super::{GenerationResponse, GroundingChunk, Part, ProviderError, Source};

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    // A language tag only counts when a newline follows it.
    Regex::new(r"(?s)^```(?:[A-Za-z0-9_-]*[ \t]*\r?\n)?(.*?)\s*```$")
        .expect("valid fence pattern")
});

/// Remove a Markdown code fence wrapping the whole string, if any.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    match CODE_FENCE.captures(trimmed) {
        Some(caps) => caps
            .get(1)
            .map_or("", |inner| inner.as_str())
            .trim()
            .to_string(),
        None => trimmed.to_string(),
    }
}

/// All text parts, in order.
pub fn response_text(response: &GenerationResponse) -> String {
    response
        .parts
        .iter()
        .filter_map(|part| match part {
            Part::Text(text) => Some(text.as_str()),
            Part::InlineData { .. } => None,
        })
        .collect()
}

/// Parse the model's JSON output after stripping fences.
pub fn parse_json<T: DeserializeOwned>(response: &GenerationResponse) -> Result<T, ProviderError> {
    let text = strip_code_fences(&response_text(response));
    serde_json::from_str(&text).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// First inline image as a data URL.
pub fn first_inline_image(response: &GenerationResponse) -> Option<String> {
    response.parts.iter().find_map(|part| match part {
        Part::InlineData { mime_type, data } => Some(format!("data:{};base64,{}", mime_type, data)),
        Part::Text(_) => None,
    })
}

pub fn web_sources(response: &GenerationResponse) -> Vec<Source> {
    response
        .grounding
        .iter()
        .filter_map(|chunk| match chunk {
            GroundingChunk::Web { uri, title } => Some(Source {
                uri: uri.clone(),
                title: title.clone(),
            }),
            GroundingChunk::Other => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn text_response(text: &str) -> GenerationResponse {
        GenerationResponse {
            parts: vec![Part::Text(text.to_string())],
            grounding: Vec::new(),
        }
    }

    #[test]
    fn test_strip_unfenced_is_trim() {
        assert_eq!(strip_code_fences("  {\"a\":1}\n"), "{\"a\":1}");
        assert_eq!(strip_code_fences("plain"), "plain");
        assert_eq!(strip_code_fences(&strip_code_fences(" x ")), "x");
    }

    #[test]
    fn test_strip_json_fence() {
        let fenced = "```json\n{\n  \"names\": []\n}\n```";
        assert_eq!(strip_code_fences(fenced), "{\n  \"names\": []\n}");
        assert_eq!(strip_code_fences("\n```\n[1, 2]\n```  "), "[1, 2]");
        assert_eq!(strip_code_fences("```{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_single_line_fence_keeps_bare_word() {
        assert_eq!(strip_code_fences("```hello```"), "hello");
        assert_eq!(strip_code_fences("```json```"), "json");
        assert_eq!(strip_code_fences("```text\r\nhello\r\n```"), "hello");
    }

    #[test]
    fn test_inner_backticks_survive() {
        assert_eq!(strip_code_fences("use ```json``` fences"), "use ```json``` fences");
    }

    #[test]
    fn test_parse_json_through_fence() {
        #[derive(Debug, Deserialize)]
        struct Out {
            meaning: String,
        }
        let out: Out = parse_json(&text_response("```json\n{\"meaning\":\"brave\"}\n```")).unwrap();
        assert_eq!(out.meaning, "brave");

        let err = parse_json::<Out>(&text_response("not json")).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn test_first_inline_image() {
        let response = GenerationResponse {
            parts: vec![
                Part::Text("here you go".into()),
                Part::InlineData {
                    mime_type: "image/png".into(),
                    data: "AAAA".into(),
                },
                Part::InlineData {
                    mime_type: "image/jpeg".into(),
                    data: "BBBB".into(),
                },
            ],
            grounding: Vec::new(),
        };
        assert_eq!(
            first_inline_image(&response).as_deref(),
            Some("data:image/png;base64,AAAA")
        );
        assert_eq!(first_inline_image(&text_response("no image")), None);
    }

    #[test]
    fn test_web_sources_only() {
        let response = GenerationResponse {
            parts: Vec::new(),
            grounding: vec![
                GroundingChunk::Other,
                GroundingChunk::Web {
                    uri: "https://example.org".into(),
                    title: "Example".into(),
                },
            ],
        };
        assert_eq!(
            web_sources(&response),
            vec![Source {
                uri: "https://example.org".into(),
                title: "Example".into()
            }]
        );
        assert!(web_sources(&GenerationResponse::default()).is_empty());
    }
}
