//! Prompt templates and `generateContent` response schemas.

use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::payloads::{
    AnalyzePersonalityRequest, GenerateBioRequest, GenerateImageRequest, GenerateNamesRequest,
    NameMeaningRequest, NameOfTheDayRequest, PetHoroscopeRequest, QuickFireNamesRequest,
    SearchGroundingRequest, TranslateNameRequest,
};

fn string() -> Value {
    json!({ "type": "STRING" })
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({ "type": "OBJECT", "properties": properties, "required": required })
}

fn array_of(items: Value) -> Value {
    json!({ "type": "ARRAY", "items": items })
}

fn or_any(value: &str) -> &str {
    if value.trim().is_empty() {
        "any"
    } else {
        value
    }
}

pub fn names(request: &GenerateNamesRequest) -> String {
    let pet = &request.pet_info;
    format!(
        "Suggest 6 creative names for a {gender} {pet_type}. \
         Personality: {personality}. Preferred naming style: {style}. \
         For each name give a short, warm explanation of its meaning or why it fits. \
         Write the meanings in the language with code \"{language}\".",
        gender = or_any(&pet.gender),
        pet_type = pet.pet_type,
        personality = or_any(&pet.personality),
        style = or_any(&pet.style),
        language = request.language,
    )
}

pub fn names_schema() -> Value {
    object(
        json!({
            "names": array_of(object(
                json!({ "id": string(), "name": string(), "meaning": string() }),
                &["id", "name", "meaning"],
            ))
        }),
        &["names"],
    )
}

pub fn bio(request: &GenerateBioRequest) -> String {
    format!(
        "Write 3 short, playful social media bios for a {pet_type} named {name}. \
         Personality: {personality}. Each bio is at most two sentences and may use one emoji. \
         Write in the language with code \"{language}\".",
        pet_type = request.pet_type,
        name = request.name,
        personality = or_any(&request.personality),
        language = request.language,
    )
}

pub fn bio_schema() -> Value {
    object(json!({ "bios": array_of(string()) }), &["bios"])
}

pub fn image_edit(request: &GenerateImageRequest) -> String {
    let instruction = if request.prompt.trim().is_empty() {
        "Make the pet look adorable"
    } else {
        request.prompt.trim()
    };
    let style = if request.style.trim().is_empty() {
        "natural"
    } else {
        request.style.trim()
    };
    format!(
        "Edit this photo of a pet. Instruction: {instruction}. Art style: {style}. \
         Keep the pet clearly recognisable and return the edited image."
    )
}

pub fn personality(request: &AnalyzePersonalityRequest) -> String {
    let answers = request
        .quiz_answers
        .iter()
        .enumerate()
        .map(|(i, answer)| format!("{}. {}", i + 1, answer))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "A pet owner answered a personality quiz about their pet:\n{answers}\n\n\
         Give the pet a fun personality type title, a two-sentence description, \
         one keyword describing its personality and one keyword describing \
         a naming style that suits it. \
         Write in the language with code \"{language}\".",
        language = request.language,
    )
}

pub fn personality_schema() -> Value {
    object(
        json!({
            "title": string(),
            "description": string(),
            "keywords": object(
                json!({ "personality": string(), "style": string() }),
                &["personality", "style"],
            ),
        }),
        &["title", "description", "keywords"],
    )
}

pub fn consultant_instruction(system_instruction: &str, language: Option<&str>) -> String {
    let base = if system_instruction.trim().is_empty() {
        "You are a friendly, knowledgeable pet care expert. Give practical, safe advice \
         and recommend a veterinarian for anything medical."
    } else {
        system_instruction.trim()
    };
    match language {
        Some(language) => format!("{base}\nAnswer in the language with code \"{language}\"."),
        None => base.to_string(),
    }
}

pub fn name_meaning(request: &NameMeaningRequest) -> String {
    format!(
        "Explain the meaning and origin of the pet name \"{name}\" in two or three sentences. \
         Write in the language with code \"{language}\".",
        name = request.name,
        language = request.language,
    )
}

pub fn name_meaning_schema() -> Value {
    object(json!({ "meaning": string() }), &["meaning"])
}

pub fn name_of_the_day(request: &NameOfTheDayRequest, today: NaiveDate) -> String {
    format!(
        "Today is {today}. Pick one charming, uncommon pet name as the name of the day \
         and explain its meaning in one sentence. \
         Write the meaning in the language with code \"{language}\".",
        today = today.format("%Y-%m-%d"),
        language = request.language,
    )
}

pub fn name_of_the_day_schema() -> Value {
    object(json!({ "name": string(), "meaning": string() }), &["name", "meaning"])
}

pub fn horoscope(request: &PetHoroscopeRequest) -> String {
    format!(
        "Write today's light-hearted horoscope for {name}, a {pet_type} born under {sign}. \
         Give a two-sentence prediction and one lucky item. \
         Write in the language with code \"{language}\".",
        name = request.name,
        pet_type = request.pet_type,
        sign = request.sign,
        language = request.language,
    )
}

pub fn horoscope_schema() -> Value {
    object(
        json!({ "prediction": string(), "luckyItem": string() }),
        &["prediction", "luckyItem"],
    )
}

pub fn quick_fire(request: &QuickFireNamesRequest) -> String {
    format!(
        "List 10 short names for a {gender} {pet_type} in a {style} style. \
         Names only, suited to speakers of the language with code \"{language}\".",
        gender = or_any(&request.pet_gender),
        pet_type = request.pet_type,
        style = or_any(&request.style),
        language = request.language,
    )
}

pub fn quick_fire_schema() -> Value {
    object(json!({ "names": array_of(string()) }), &["names"])
}

/// Search-grounded calls cannot use a response schema, so the shape is
/// spelled out in the prompt.
pub fn search(request: &SearchGroundingRequest) -> String {
    format!(
        "Use Google Search to find up to 5 real animal shelters, rescues or pet services \
         for: {query}. Respond with JSON only, shaped as \
         {{\"results\":[{{\"name\":\"\",\"mission\":\"\",\"address\":\"\",\
         \"phone\":\"\",\"website\":\"\"}}]}}. \
         Use empty strings for unknown fields. \
         Write the mission in the language with code \"{language}\".",
        query = request.query,
        language = request.language,
    )
}

pub fn translate(request: &TranslateNameRequest) -> String {
    format!(
        "Translate or transliterate the pet name \"{name}\" \
         into the language with code \"{target}\" \
         and give a pronunciation guide written in Latin letters.",
        name = request.name,
        target = request.target_language,
    )
}

pub fn translate_schema() -> Value {
    object(
        json!({ "translation": string(), "pronunciation": string() }),
        &["translation", "pronunciation"],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::PetInfo;

    #[test]
    fn test_names_prompt_interpolates_fields() {
        let request = GenerateNamesRequest {
            pet_info: PetInfo {
                pet_type: "dog".into(),
                gender: "".into(),
                personality: "energetic".into(),
                style: "food".into(),
            },
            language: "ja".into(),
        };
        let prompt = names(&request);
        assert!(prompt.contains("any dog"));
        assert!(prompt.contains("energetic"));
        assert!(prompt.contains("\"ja\""));
    }

    #[test]
    fn test_schema_shape() {
        let schema = names_schema();
        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(schema["properties"]["names"]["type"], "ARRAY");
        assert_eq!(schema["properties"]["names"]["items"]["required"][1], "name");
    }

    #[test]
    fn test_consultant_instruction() {
        assert!(consultant_instruction("", None).starts_with("You are a friendly"));
        let custom = consultant_instruction("Be brief.", Some("fr"));
        assert!(custom.starts_with("Be brief."));
        assert!(custom.ends_with("\"fr\"."));
    }

    #[test]
    fn test_image_edit_defaults() {
        let request = GenerateImageRequest {
            base64_image: "AA".into(),
            mime_type: "image/png".into(),
            prompt: " ".into(),
            style: "".into(),
        };
        let prompt = image_edit(&request);
        assert!(prompt.contains("Make the pet look adorable"));
        assert!(prompt.contains("Art style: natural"));
    }
}
