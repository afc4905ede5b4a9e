use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::generation::Source;

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PetInfo {
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 50))]
    pub pet_type: String,
    #[validate(length(max = 30))]
    #[serde(default)]
    pub gender: String,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub personality: String,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub style: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateNamesRequest {
    #[validate(nested)]
    pub pet_info: PetInfo,
    #[validate(length(min = 2, max = 40))]
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBioRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub pet_type: String,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub personality: String,
    #[validate(length(min = 2, max = 40))]
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageRequest {
    /// Base64 image, with or without a `data:` prefix.
    #[validate(length(min = 1))]
    pub base64_image: String,
    #[validate(length(min = 7, max = 50))]
    pub mime_type: String,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub prompt: String,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub style: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzePersonalityRequest {
    #[validate(length(min = 1, max = 20))]
    pub quiz_answers: Vec<String>,
    #[validate(length(min = 2, max = 40))]
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExpertConsultantRequest {
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    #[validate(length(max = 4000))]
    #[serde(default)]
    pub system_instruction: String,
    #[validate(length(min = 2, max = 40))]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NameMeaningRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(length(min = 2, max = 40))]
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NameOfTheDayRequest {
    #[validate(length(min = 2, max = 40))]
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PetHoroscopeRequest {
    #[validate(length(min = 1, max = 30))]
    pub sign: String,
    #[validate(length(min = 1, max = 50))]
    pub pet_type: String,
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(length(min = 2, max = 40))]
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuickFireNamesRequest {
    #[validate(length(max = 100))]
    #[serde(default)]
    pub style: String,
    #[validate(length(min = 1, max = 50))]
    pub pet_type: String,
    #[validate(length(max = 30))]
    #[serde(default)]
    pub pet_gender: String,
    #[validate(length(min = 2, max = 40))]
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SearchGroundingRequest {
    #[validate(length(min = 1, max = 300))]
    pub query: String,
    #[validate(length(min = 2, max = 40))]
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TranslateNameRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(length(min = 2, max = 40))]
    pub target_language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameSuggestion {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub meaning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamesOutput {
    pub names: Vec<NameSuggestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiosOutput {
    pub bios: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOutput {
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityKeywords {
    pub personality: String,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityOutput {
    pub title: String,
    pub description: String,
    pub keywords: PersonalityKeywords,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsultantOutput {
    pub text: String,
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeaningOutput {
    pub meaning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameOfTheDayOutput {
    pub name: String,
    pub meaning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoroscopeOutput {
    pub prediction: String,
    pub lucky_item: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickFireOutput {
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceResult {
    pub name: String,
    #[serde(default)]
    pub mission: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub website: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutput {
    pub results: Vec<PlaceResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationOutput {
    pub translation: String,
    #[serde(default)]
    pub pronunciation: String,
}
