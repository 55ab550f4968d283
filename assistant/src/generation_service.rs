use crate::error::ProxyError;
use crate::gemini_service::{ModelClient, StructuredCall};
use crate::models::*;
use crate::rate_limiter::RateLimiter;
use serde_json::{json, Value};
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

/// Shortest accepted idea, in user-perceived characters after trimming.
pub const MIN_PROMPT_CHARS: usize = 10;

/// The trusted side of the assistant: validates input, gates callers and
/// runs the text-then-image generation as one unit of work.
pub struct GenerationProxy {
    rate_limiter: RateLimiter,
    model: Option<Arc<dyn ModelClient>>,
}

impl GenerationProxy {
    /// `model` is `None` when no credential is configured; requests then
    /// fail with a configuration error instead of reaching a model.
    pub fn new(rate_limiter: RateLimiter, model: Option<Arc<dyn ModelClient>>) -> Self {
        Self { rate_limiter, model }
    }

    pub fn is_configured(&self) -> bool {
        self.model.is_some()
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Runs one proxy invocation for `caller` over a raw JSON body.
    pub async fn handle(&self, caller: &str, body: &[u8]) -> Result<GenerationResult, ProxyError> {
        let payload: Value = serde_json::from_slice(body).map_err(|e| {
            log::warn!("Rejected non-JSON body from {caller}: {e}");
            ProxyError::MalformedJson
        })?;
        let request = validate_request(&payload)?;

        let decision = self.rate_limiter.check(caller).await.map_err(|e| {
            log::error!("[API_ERROR] rate limiter unavailable: {e:#}");
            ProxyError::Upstream {
                stage: "rate_limit",
                detail: e.to_string(),
            }
        })?;
        if !decision.allowed {
            return Err(ProxyError::RateLimited(decision));
        }

        let model = self.model.as_ref().ok_or_else(|| {
            log::error!("CRITICAL: Gemini API key is not configured in server environment variables.");
            ProxyError::NotConfigured
        })?;

        generate(model.as_ref(), &request).await
    }
}

/// Text generation, then image generation from the derived prompt. A failure
/// at either step fails the whole call.
pub async fn generate(
    model: &dyn ModelClient,
    request: &GenerationRequest,
) -> Result<GenerationResult, ProxyError> {
    let raw = model
        .generate_structured(build_structured_call(request))
        .await
        .map_err(|e| upstream("text_generation", e))?;

    let suggestion = parse_suggestion(&raw, request)?;

    let images = model
        .generate_images(&suggestion.image_prompt)
        .await
        .map_err(|e| upstream("image_generation", e))?;

    if images.len() > 1 {
        log::warn!("Image model returned {} images, keeping the first", images.len());
    }
    let image = images.into_iter().next().ok_or_else(|| {
        upstream(
            "image_generation",
            anyhow::anyhow!("AI failed to generate an image after generating text."),
        )
    })?;

    log::info!(
        "Generated suggestion: city={} category={}",
        suggestion.suggested_city_id,
        suggestion.suggested_category_id
    );

    Ok(GenerationResult {
        title: suggestion.title,
        description: suggestion.description,
        suggested_city_id: suggestion.suggested_city_id,
        suggested_category_id: suggestion.suggested_category_id,
        generated_image_base64: image.bytes_base64,
    })
}

fn upstream(stage: &'static str, error: anyhow::Error) -> ProxyError {
    log::error!("[API_ERROR] /api/generate-event ({stage}): {error:#}");
    ProxyError::Upstream {
        stage,
        detail: error.to_string(),
    }
}

fn schema_violation(detail: String) -> ProxyError {
    log::error!("[API_ERROR] /api/generate-event (model output): {detail}");
    ProxyError::SchemaViolation { detail }
}

/// Checks a decoded body field by field, naming the first offending field.
pub fn validate_request(payload: &Value) -> Result<GenerationRequest, ProxyError> {
    let fields = payload
        .as_object()
        .ok_or_else(|| ProxyError::Validation("request body must be a JSON object.".into()))?;

    let prompt = match fields.get("prompt") {
        None | Some(Value::Null) => {
            return Err(ProxyError::Validation("\"prompt\" is required.".into()))
        }
        Some(Value::String(prompt)) => prompt.trim(),
        Some(_) => return Err(ProxyError::Validation("\"prompt\" must be a string.".into())),
    };
    if prompt.graphemes(true).count() < MIN_PROMPT_CHARS {
        return Err(ProxyError::Validation(format!(
            "\"prompt\" must be a non-empty string of at least {MIN_PROMPT_CHARS} characters."
        )));
    }

    let cities = catalog_field(fields, "cities")?;
    let categories = catalog_field(fields, "categories")?;

    let image = match fields.get("imageBase64") {
        None | Some(Value::Null) => None,
        Some(Value::String(url)) if url.is_empty() => None,
        Some(Value::String(url)) => Some(
            ImageAttachment::from_data_url(url)
                .map_err(|reason| ProxyError::Validation(format!("\"imageBase64\": {reason}")))?,
        ),
        Some(_) => {
            return Err(ProxyError::Validation(
                "\"imageBase64\" must be a data URL string.".into(),
            ))
        }
    };

    let request = GenerationRequest {
        prompt: prompt.to_string(),
        cities,
        categories,
        image,
    };
    if request.selectable_categories().next().is_none() {
        return Err(ProxyError::Validation(format!(
            "\"categories\" must include at least one category other than \"{ALL_CATEGORY_ID}\"."
        )));
    }
    Ok(request)
}

fn catalog_field(
    fields: &serde_json::Map<String, Value>,
    name: &str,
) -> Result<Vec<CatalogEntry>, ProxyError> {
    let entries = match fields.get(name) {
        None | Some(Value::Null) => {
            return Err(ProxyError::Validation(format!("\"{name}\" is required.")))
        }
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(ProxyError::Validation(format!("\"{name}\" must be an array."))),
    };
    if entries.is_empty() {
        return Err(ProxyError::Validation(format!(
            "\"{name}\" must contain at least one entry."
        )));
    }

    entries
        .iter()
        .map(|entry| {
            serde_json::from_value::<CatalogEntry>(entry.clone())
                .ok()
                .filter(|entry| !entry.id.trim().is_empty())
                .ok_or_else(|| {
                    ProxyError::Validation(format!(
                        "every entry in \"{name}\" needs an \"id\" and a \"name.en\"."
                    ))
                })
        })
        .collect()
}

fn options_list<'a>(entries: impl Iterator<Item = &'a CatalogEntry>) -> String {
    entries
        .map(|entry| format!("id: \"{}\", name: \"{}\"", entry.id, entry.name.en))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn build_system_instruction(request: &GenerationRequest) -> String {
    let city_options = options_list(request.cities.iter());
    let category_options = options_list(request.selectable_categories());
    let image_step = if request.image.is_some() {
        "\n5. Analyze the Provided Image: An image has been uploaded by the user for inspiration. Analyze its contents, style, and mood. Your suggestions for the title, description, and image prompt should be heavily influenced by this image."
    } else {
        ""
    };

    format!(
        r#"You are an expert event planner assistant. Your task is to take a user's event idea and generate structured, creative, and appealing event details. The output must be in JSON format.

1. Analyze the User's Prompt: Understand the core concept, location hints, and event type.
2. Generate Titles & Descriptions: Create a catchy title and an engaging description. Provide translations for English (en), Arabic (ar), and Kurdish (ku).
3. Suggest City & Category: Based on the prompt, choose the most appropriate city and category. You MUST return one of the provided IDs.
    - Available Cities: {city_options}
    - Available Categories: {category_options}
4. Create an Image Prompt: Generate a descriptive, visually rich prompt for an AI image generator that captures the event's theme.{image_step}

Your final output must strictly follow the JSON schema provided."#
    )
}

fn localized_schema(subject: &str) -> Value {
    let mut properties = serde_json::Map::new();
    for (locale, language) in [(Locale::En, "English"), (Locale::Ar, "Arabic"), (Locale::Ku, "Kurdish")] {
        properties.insert(
            locale.code().to_string(),
            json!({ "type": "STRING", "description": format!("The event {subject} in {language}.") }),
        );
    }
    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": ["en", "ar", "ku"],
    })
}

pub fn response_schema(request: &GenerationRequest) -> Value {
    let city_ids: Vec<&str> = request.cities.iter().map(|c| c.id.as_str()).collect();
    let category_ids: Vec<&str> = request.selectable_categories().map(|c| c.id.as_str()).collect();

    json!({
        "type": "OBJECT",
        "properties": {
            "title": localized_schema("title"),
            "description": localized_schema("description"),
            "suggestedCityId": { "type": "STRING", "format": "enum", "enum": city_ids },
            "suggestedCategoryId": { "type": "STRING", "format": "enum", "enum": category_ids },
            "imagePrompt": {
                "type": "STRING",
                "description": "A creative prompt for an AI image generator, inspired by the user's text and image."
            }
        },
        "required": ["title", "description", "suggestedCityId", "suggestedCategoryId", "imagePrompt"],
        "propertyOrdering": ["title", "description", "suggestedCityId", "suggestedCategoryId", "imagePrompt"]
    })
}

/// Image part first when present, so the model reads it before the idea.
pub fn build_structured_call(request: &GenerationRequest) -> StructuredCall {
    let mut parts = Vec::with_capacity(2);
    if let Some(image) = &request.image {
        parts.push(GeminiPart::InlineData {
            inline_data: GeminiInlineData {
                mime_type: image.mime_type.clone(),
                data: image.data.clone(),
            },
        });
    }
    parts.push(GeminiPart::Text {
        text: format!("Here is my event idea: \"{}\"", request.prompt),
    });

    StructuredCall {
        system_instruction: build_system_instruction(request),
        parts,
        response_schema: response_schema(request),
    }
}

/// Strict parse of the model's JSON plus the id-membership checks the schema
/// alone cannot guarantee.
pub fn parse_suggestion(raw: &str, request: &GenerationRequest) -> Result<ModelSuggestion, ProxyError> {
    let suggestion: ModelSuggestion = serde_json::from_str(raw.trim())
        .map_err(|e| schema_violation(format!("model output is not valid suggestion JSON: {e}")))?;

    if !request.cities.iter().any(|c| c.id == suggestion.suggested_city_id) {
        return Err(schema_violation(format!(
            "suggestedCityId {:?} is not one of the offered cities",
            suggestion.suggested_city_id
        )));
    }
    if !request
        .selectable_categories()
        .any(|c| c.id == suggestion.suggested_category_id)
    {
        return Err(schema_violation(format!(
            "suggestedCategoryId {:?} is not one of the offered categories",
            suggestion.suggested_category_id
        )));
    }
    if suggestion.image_prompt.trim().is_empty() {
        return Err(schema_violation("imagePrompt is empty".to_string()));
    }

    Ok(suggestion)
}
