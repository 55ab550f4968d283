use crate::models::*;
use chrono::{DateTime, Utc};

/// Editable draft of an event. Nothing is stored until [`to_new_event`](Self::to_new_event)
/// succeeds and the caller hands the result to the data store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventForm {
    pub title: Option<LocalizedText>,
    pub description: Option<LocalizedText>,
    pub category_id: String,
    pub city_id: String,
    pub date: Option<DateTime<Utc>>,
    pub venue: String,
    pub coordinates: Option<Coordinates>,
    pub organizer_phone: String,
    pub whatsapp_number: String,
    pub image_url: String,
    pub ticket_info: String,
}

impl EventForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-fills an existing event for editing.
    pub fn from_event(event: &Event) -> Self {
        Self {
            title: Some(event.title.clone()),
            description: Some(event.description.clone()),
            category_id: event.category_id.clone(),
            city_id: event.city_id.clone(),
            date: Some(event.date),
            venue: event.venue.clone(),
            coordinates: event.coordinates,
            organizer_phone: event.organizer_phone.clone(),
            whatsapp_number: event.whatsapp_number.clone().unwrap_or_default(),
            image_url: event.image_url.clone(),
            ticket_info: event.ticket_info.clone().unwrap_or_default(),
        }
    }

    /// Overwrites the fields an assistant suggestion covers. Date, venue and
    /// contact details are left as the user typed them.
    pub fn apply_autofill(&mut self, data: AutofillData) {
        self.title = Some(data.title);
        self.description = Some(data.description);
        self.category_id = data.category_id;
        self.city_id = data.city_id;
        self.image_url = format!("data:image/png;base64,{}", data.image_base64);
    }

    pub fn title(&self) -> Option<&LocalizedText> {
        self.title.as_ref()
    }

    pub fn description(&self) -> Option<&LocalizedText> {
        self.description.as_ref()
    }

    pub fn category_id(&self) -> &str {
        &self.category_id
    }

    pub fn city_id(&self) -> &str {
        &self.city_id
    }

    /// Raw base64 of an inline PNG image, if the image came from the assistant.
    pub fn image_base64(&self) -> Option<&str> {
        self.image_url.strip_prefix("data:image/png;base64,")
    }

    pub fn to_new_event(&self) -> Result<NewEvent, String> {
        let missing = |field: &str| format!("{field} is required.");

        let title = self
            .title
            .clone()
            .filter(|t| !t.en.trim().is_empty())
            .ok_or_else(|| missing("Title"))?;
        let description = self
            .description
            .clone()
            .filter(|d| !d.en.trim().is_empty())
            .ok_or_else(|| missing("Description"))?;
        if self.category_id.is_empty() || self.category_id == ALL_CATEGORY_ID {
            return Err(missing("Category"));
        }
        if self.city_id.is_empty() {
            return Err(missing("City"));
        }
        let date = self.date.ok_or_else(|| missing("Date"))?;
        if self.venue.trim().is_empty() {
            return Err(missing("Venue"));
        }
        if self.organizer_phone.trim().is_empty() {
            return Err(missing("Organizer phone"));
        }
        if self.image_url.trim().is_empty() {
            return Err(missing("Image"));
        }

        let optional = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };

        Ok(NewEvent {
            title,
            description,
            category_id: self.category_id.clone(),
            city_id: self.city_id.clone(),
            date,
            venue: self.venue.trim().to_string(),
            coordinates: self.coordinates,
            organizer_phone: self.organizer_phone.trim().to_string(),
            whatsapp_number: optional(&self.whatsapp_number),
            image_url: self.image_url.clone(),
            ticket_info: optional(&self.ticket_info),
            is_featured: false,
            is_top: false,
        })
    }
}
