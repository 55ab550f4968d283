use crate::config::GeminiConfig;
use crate::models::*;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// One structured-generation call: instruction, ordered content parts and
/// the JSON schema the answer must follow.
#[derive(Debug, Clone)]
pub struct StructuredCall {
    pub system_instruction: String,
    pub parts: Vec<GeminiPart>,
    pub response_schema: serde_json::Value,
}

/// An image returned by the image model, base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub mime_type: String,
    pub bytes_base64: String,
}

/// The two generative calls the proxy depends on.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Returns the raw JSON text produced under `call.response_schema`.
    async fn generate_structured(&self, call: StructuredCall) -> Result<String>;

    async fn generate_images(&self, prompt: &str) -> Result<Vec<GeneratedImage>>;
}

pub struct GeminiService {
    client: Client,
    api_key: String,
    base_url: String,
    text_model: String,
    image_model: String,
}

impl GeminiService {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY environment variable not set"))?;

        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
        })
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, model: &str, method: &str, body: &B) -> Result<R> {
        let url = format!("{}/models/{}:{}", self.base_url, model, method);

        let response = self.client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            // reqwest errors embed the URL, which carries the key.
            .map_err(|e| anyhow::anyhow!("Gemini request failed: {}", e.without_url()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Gemini API error ({}): {}", status, error_text));
        }

        response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Gemini returned an unreadable body: {}", e.without_url()))
    }
}

/// Text parts of the first candidate, joined. Other part kinds are skipped.
fn candidate_text(response: &GeminiResponse) -> Result<String> {
    response
        .candidates
        .first()
        .map(|c| {
            c.content
                .parts
                .iter()
                .filter_map(|p| match p {
                    GeminiPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect()
        })
        .ok_or_else(|| anyhow::anyhow!("Gemini returned no candidates"))
}

#[async_trait]
impl ModelClient for GeminiService {
    async fn generate_structured(&self, call: StructuredCall) -> Result<String> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: call.parts,
            }],
            system_instruction: Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text {
                    text: call.system_instruction,
                }],
            }),
            generation_config: Some(GeminiGenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: call.response_schema,
            }),
        };

        log::info!("Requesting structured suggestion from {}", self.text_model);
        let gemini_response: GeminiResponse = self
            .post(&self.text_model, "generateContent", &request)
            .await?;

        candidate_text(&gemini_response)
    }

    async fn generate_images(&self, prompt: &str) -> Result<Vec<GeneratedImage>> {
        let request = ImagenRequest {
            instances: vec![ImagenInstance {
                prompt: prompt.to_string(),
            }],
            parameters: ImagenParameters {
                sample_count: 1,
                aspect_ratio: "16:9".to_string(),
                output_options: ImagenOutputOptions {
                    mime_type: "image/png".to_string(),
                },
            },
        };

        log::info!("Generating image with model: {}", self.image_model);
        let imagen_response: ImagenResponse = self.post(&self.image_model, "predict", &request).await?;

        let images = imagen_response
            .predictions
            .into_iter()
            .filter_map(|prediction| {
                if let Some(reason) = &prediction.rai_filtered_reason {
                    log::warn!("Image prediction filtered: {}", reason);
                }
                prediction.bytes_base64_encoded.map(|bytes| GeneratedImage {
                    mime_type: prediction.mime_type.unwrap_or_else(|| "image/png".to_string()),
                    bytes_base64: bytes,
                })
            })
            .collect();

        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_requires_api_key() {
        assert!(GeminiService::new(&GeminiConfig::new()).is_err());
        assert!(GeminiService::new(&GeminiConfig::new().with_api_key("key")).is_ok());
    }

    #[test]
    fn inline_image_part_serializes_in_camel_case() {
        let part = GeminiPart::InlineData {
            inline_data: GeminiInlineData {
                mime_type: "image/png".into(),
                data: "aGVsbG8=".into(),
            },
        };
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["inlineData"]["mimeType"], "image/png");
    }

    #[test]
    fn unknown_response_parts_do_not_break_parsing() {
        let body = serde_json::json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "thought": true, "thoughtSignature": "abc" },
                        { "text": "{\"title\":" },
                        { "functionCall": { "name": "noop", "args": {} } },
                        { "text": "1}" }
                    ]
                }
            }]
        });
        let response: GeminiResponse = serde_json::from_value(body).unwrap();
        assert!(matches!(response.candidates[0].content.parts[0], GeminiPart::Other(_)));
        assert_eq!(candidate_text(&response).unwrap(), "{\"title\":1}");
    }

    #[test]
    fn empty_candidate_list_is_an_error() {
        let response: GeminiResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(candidate_text(&response).is_err());
    }

    #[test]
    fn filtered_predictions_carry_no_bytes() {
        let body = serde_json::json!({
            "predictions": [
                { "raiFilteredReason": "blocked" },
                { "bytesBase64Encoded": "iVBORw0=", "mimeType": "image/png" }
            ]
        });
        let response: ImagenResponse = serde_json::from_value(body).unwrap();
        let kept: Vec<_> = response
            .predictions
            .iter()
            .filter_map(|p| p.bytes_base64_encoded.as_deref())
            .collect();
        assert_eq!(kept, vec!["iVBORw0="]);
    }
}
