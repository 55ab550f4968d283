use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Category id that means "every category" in listings. Never a valid suggestion.
pub const ALL_CATEGORY_ID: &str = "all";

/// Largest accepted inspiration image, decoded.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Ar,
    Ku,
}

impl Locale {
    pub const ALL: [Locale; 3] = [Locale::En, Locale::Ar, Locale::Ku];

    pub fn code(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Ar => "ar",
            Locale::Ku => "ku",
        }
    }
}

/// Text translated into every supported locale. All three keys are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub en: String,
    pub ar: String,
    pub ku: String,
}

impl LocalizedText {
    pub fn new(en: impl Into<String>, ar: impl Into<String>, ku: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            ar: ar.into(),
            ku: ku.into(),
        }
    }

    pub fn get(&self, locale: Locale) -> &str {
        match locale {
            Locale::En => &self.en,
            Locale::Ar => &self.ar,
            Locale::Ku => &self.ku,
        }
    }
}

/// Display name of a catalog entry as sent by callers. Only English is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogName {
    pub en: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ku: Option<String>,
}

impl CatalogName {
    pub fn get(&self, locale: Locale) -> &str {
        let translated = match locale {
            Locale::En => None,
            Locale::Ar => self.ar.as_deref(),
            Locale::Ku => self.ku.as_deref(),
        };
        translated.unwrap_or(&self.en)
    }
}

impl From<&LocalizedText> for CatalogName {
    fn from(text: &LocalizedText) -> Self {
        Self {
            en: text.en.clone(),
            ar: Some(text.ar.clone()),
            ku: Some(text.ku.clone()),
        }
    }
}

/// A city or category option offered to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: CatalogName,
}

impl From<&City> for CatalogEntry {
    fn from(city: &City) -> Self {
        Self {
            id: city.id.clone(),
            name: CatalogName::from(&city.name),
        }
    }
}

impl From<&Category> for CatalogEntry {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id.clone(),
            name: CatalogName::from(&category.name),
        }
    }
}

/// Inline image carried as a `data:<mime>;base64,<data>` URL on the wire.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageAttachment {
    pub mime_type: String,
    pub data: String,
}

fn data_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)^data:(?P<mime>[\w.+-]+/[\w.+-]+);base64,(?P<data>.+)$")
            .expect("data URL pattern is valid")
    })
}

impl ImageAttachment {
    pub fn from_data_url(url: &str) -> Result<Self, String> {
        let captures = data_url_pattern()
            .captures(url.trim())
            .ok_or_else(|| "Invalid image format. Expected a base64 data URL.".to_string())?;

        let mime_type = captures["mime"].to_ascii_lowercase();
        if !mime_type.starts_with("image/") {
            return Err("Please upload a valid image file (PNG, JPG, etc.).".to_string());
        }

        let data = captures["data"].trim().to_string();
        let decoded = STANDARD
            .decode(data.as_bytes())
            .map_err(|_| "Image data is not valid base64.".to_string())?;
        if decoded.len() > MAX_IMAGE_BYTES {
            return Err(format!(
                "File size cannot exceed {}MB.",
                MAX_IMAGE_BYTES / (1024 * 1024)
            ));
        }

        Ok(Self { mime_type, data })
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

impl TryFrom<String> for ImageAttachment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_data_url(&value)
    }
}

impl From<ImageAttachment> for String {
    fn from(image: ImageAttachment) -> Self {
        image.to_data_url()
    }
}

impl fmt::Debug for ImageAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAttachment")
            .field("mime_type", &self.mime_type)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// Body of a generation call as accepted by the proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    pub cities: Vec<CatalogEntry>,
    pub categories: Vec<CatalogEntry>,
    #[serde(rename = "imageBase64", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageAttachment>,
}

impl GenerationRequest {
    /// Categories the model may pick from.
    pub fn selectable_categories(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.categories
            .iter()
            .filter(|category| category.id != ALL_CATEGORY_ID)
    }
}

/// Structured output the text model must produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSuggestion {
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub suggested_city_id: String,
    pub suggested_category_id: String,
    pub image_prompt: String,
}

/// Final payload returned to the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub suggested_city_id: String,
    pub suggested_category_id: String,
    pub generated_image_base64: String,
}

/// What the event form receives when the user applies a suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutofillData {
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub category_id: String,
    pub city_id: String,
    pub image_base64: String,
}

impl From<GenerationResult> for AutofillData {
    fn from(result: GenerationResult) -> Self {
        Self {
            title: result.title,
            description: result.description,
            category_id: result.suggested_category_id,
            city_id: result.suggested_city_id,
            image_base64: result.generated_image_base64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// ---- catalog and event records ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub id: String,
    pub name: LocalizedText,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: LocalizedText,
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub avatar_url: String,
    pub phone: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
    pub is_verified: bool,
}

impl User {
    /// Copy safe to hand out: no password.
    pub fn public(&self) -> User {
        User {
            password: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub user: User,
    pub rating: u8,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub organizer_id: String,
    pub organizer_name: String,
    pub category_id: String,
    pub city_id: String,
    pub date: DateTime<Utc>,
    pub venue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    pub organizer_phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp_number: Option<String>,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_info: Option<String>,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_top: bool,
}

/// Event fields supplied by an organizer; the store fills id, organizer and reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub category_id: String,
    pub city_id: String,
    pub date: DateTime<Utc>,
    pub venue: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    pub organizer_phone: String,
    #[serde(default)]
    pub whatsapp_number: Option<String>,
    pub image_url: String,
    #[serde(default)]
    pub ticket_info: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_top: bool,
}

// ---- Gemini wire format ----

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    pub generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    /// Any other part kind (function calls, thoughts, ...), kept opaque.
    Other(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiInlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    pub response_mime_type: String,
    pub response_schema: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiCandidate {
    pub content: GeminiContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagenRequest {
    pub instances: Vec<ImagenInstance>,
    pub parameters: ImagenParameters,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImagenInstance {
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagenParameters {
    pub sample_count: u8,
    pub aspect_ratio: String,
    pub output_options: ImagenOutputOptions,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagenOutputOptions {
    pub mime_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImagenResponse {
    #[serde(default)]
    pub predictions: Vec<ImagenPrediction>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagenPrediction {
    #[serde(default)]
    pub bytes_base64_encoded: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub rai_filtered_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localized_text_requires_every_locale() {
        let partial = serde_json::json!({ "en": "Concert", "ar": "حفلة" });
        assert!(serde_json::from_value::<LocalizedText>(partial).is_err());

        let full = serde_json::json!({ "en": "Concert", "ar": "حفلة", "ku": "کۆنسێرت" });
        let text: LocalizedText = serde_json::from_value(full).unwrap();
        assert_eq!(text.get(Locale::Ku), "کۆنسێرت");
    }

    #[test]
    fn data_url_is_split_into_mime_and_payload() {
        let image = ImageAttachment::from_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "aGVsbG8=");
        assert_eq!(image.to_data_url(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn data_url_rejects_non_images_and_bad_payloads() {
        assert!(ImageAttachment::from_data_url("aGVsbG8=").is_err());
        assert!(ImageAttachment::from_data_url("data:text/plain;base64,aGVsbG8=").is_err());
        assert!(ImageAttachment::from_data_url("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn generation_request_uses_wire_field_names() {
        let body = serde_json::json!({
            "prompt": "A rooftop jazz night in Erbil",
            "cities": [{ "id": "erbil", "name": { "en": "Erbil" } }],
            "categories": [{ "id": "music", "name": { "en": "Music" } }],
            "imageBase64": "data:image/jpeg;base64,aGVsbG8="
        });
        let request: GenerationRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.image.as_ref().unwrap().mime_type, "image/jpeg");

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["imageBase64"], "data:image/jpeg;base64,aGVsbG8=");
        assert!(value["cities"][0]["name"].get("ar").is_none());
    }

    #[test]
    fn user_password_is_never_serialized() {
        let user = User {
            id: "user-1".into(),
            name: "Dara".into(),
            avatar_url: String::new(),
            phone: String::new(),
            email: "dara@example.com".into(),
            password: Some("secret".into()),
            is_verified: true,
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password").is_none());
        assert!(user.public().password.is_none());
    }
}
