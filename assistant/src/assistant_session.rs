use crate::models::*;
use crate::proxy_client::SuggestionSource;
use base64::{engine::general_purpose::STANDARD, Engine as _};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Preview(GenerationResult),
    Failed(String),
}

/// Suggestion shown to the user, with ids resolved to display names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionPreview {
    pub title: String,
    pub description: String,
    pub city_name: String,
    pub category_name: String,
    pub image_data_url: String,
}

/// One run of the AI assistant dialog: collect an idea, fetch a suggestion,
/// hand it to the event form.
#[derive(Debug, Clone)]
pub struct AssistantSession {
    prompt: String,
    image: Option<ImageAttachment>,
    cities: Vec<CatalogEntry>,
    categories: Vec<CatalogEntry>,
    state: SessionState,
}

impl AssistantSession {
    pub fn new(cities: Vec<CatalogEntry>, categories: Vec<CatalogEntry>) -> Self {
        Self {
            prompt: String::new(),
            image: None,
            cities,
            categories,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == SessionState::Loading
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn image(&self) -> Option<&ImageAttachment> {
        self.image.as_ref()
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    /// Validates and stores an inspiration image. On failure the previous image is dropped.
    /// Refused while a request is in flight.
    pub fn attach_image(&mut self, mime_type: &str, bytes: &[u8]) -> Result<(), String> {
        if self.is_loading() {
            return Err("A suggestion request is already in progress.".to_string());
        }
        self.image = None;
        if !mime_type.starts_with("image/") {
            return Err(self.fail("Please upload a valid image file (PNG, JPG, etc.)."));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(self.fail(&format!(
                "File size cannot exceed {}MB.",
                MAX_IMAGE_BYTES / (1024 * 1024)
            )));
        }

        self.image = Some(ImageAttachment {
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(bytes),
        });
        if matches!(self.state, SessionState::Failed(_)) {
            self.state = SessionState::Idle;
        }
        Ok(())
    }

    pub fn remove_image(&mut self) {
        if !self.is_loading() {
            self.image = None;
        }
    }

    fn fail(&mut self, message: &str) -> String {
        self.state = SessionState::Failed(message.to_string());
        message.to_string()
    }

    /// Moves to `Loading` and returns the request to send.
    pub fn begin(&mut self) -> Result<GenerationRequest, String> {
        if self.is_loading() {
            return Err("A suggestion request is already in progress.".to_string());
        }
        if self.prompt.trim().is_empty() {
            return Err(self.fail("Please describe your event idea."));
        }

        self.state = SessionState::Loading;
        Ok(GenerationRequest {
            prompt: self.prompt.clone(),
            cities: self.cities.clone(),
            categories: self.categories.clone(),
            image: self.image.clone(),
        })
    }

    /// Records the outcome of the request started by [`begin`](Self::begin).
    pub fn finish<E: ToString>(&mut self, outcome: Result<GenerationResult, E>) {
        self.state = match outcome {
            Ok(result) => SessionState::Preview(result),
            Err(error) => {
                let message = error.to_string();
                log::warn!("AI assistant request failed: {}", message);
                SessionState::Failed(message)
            }
        };
    }

    pub async fn submit(&mut self, source: &dyn SuggestionSource) -> &SessionState {
        match self.begin() {
            Ok(request) => {
                let outcome = source.suggest(&request).await;
                self.finish(outcome);
            }
            Err(message) => log::debug!("AI assistant submit refused: {}", message),
        }
        &self.state
    }

    pub fn preview(&self, locale: Locale) -> Option<SuggestionPreview> {
        let SessionState::Preview(result) = &self.state else {
            return None;
        };
        let name_of = |entries: &[CatalogEntry], id: &str| {
            entries
                .iter()
                .find(|entry| entry.id == id)
                .map(|entry| entry.name.get(locale).to_string())
                .unwrap_or_else(|| id.to_string())
        };

        Some(SuggestionPreview {
            title: result.title.get(locale).to_string(),
            description: result.description.get(locale).to_string(),
            city_name: name_of(&self.cities, &result.suggested_city_id),
            category_name: name_of(&self.categories, &result.suggested_category_id),
            image_data_url: format!("data:image/png;base64,{}", result.generated_image_base64),
        })
    }

    /// Hands the previewed suggestion over and resets the session.
    pub fn apply(&mut self) -> Option<AutofillData> {
        let SessionState::Preview(result) = &self.state else {
            return None;
        };
        let data = AutofillData::from(result.clone());
        self.reset();
        Some(data)
    }

    /// Returns false while a request is in flight.
    pub fn close(&mut self) -> bool {
        if self.is_loading() {
            return false;
        }
        self.reset();
        true
    }

    fn reset(&mut self) {
        self.prompt.clear();
        self.image = None;
        self.state = SessionState::Idle;
    }
}
