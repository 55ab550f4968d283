use crate::error::StoreError;
use crate::models::*;
use crate::seed_data;
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Result of a login attempt with correct credentials.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    LoggedIn(User),
    /// Credentials matched but the email was never confirmed.
    Unverified { email: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub password: String,
}

/// In-memory event and user tables. Built once at startup and shared by handle.
pub struct DataStore {
    cities: Vec<City>,
    categories: Vec<Category>,
    events: RwLock<Vec<Event>>,
    users: RwLock<Vec<User>>,
}

impl DataStore {
    pub fn new(cities: Vec<City>, categories: Vec<Category>, events: Vec<Event>, users: Vec<User>) -> Self {
        Self {
            cities,
            categories,
            events: RwLock::new(events),
            users: RwLock::new(users),
        }
    }

    pub fn seeded() -> Self {
        Self::new(
            seed_data::cities(),
            seed_data::categories(),
            seed_data::events(),
            seed_data::users(),
        )
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Cities and categories in the shape the assistant sends to the proxy.
    pub fn catalog(&self) -> (Vec<CatalogEntry>, Vec<CatalogEntry>) {
        (
            self.cities.iter().map(CatalogEntry::from).collect(),
            self.categories.iter().map(CatalogEntry::from).collect(),
        )
    }

    /// All events, newest date first.
    pub async fn events(&self) -> Vec<Event> {
        let mut events = self.events.read().await.clone();
        events.sort_by(|a, b| b.date.cmp(&a.date));
        events
    }

    pub async fn event(&self, id: &str) -> Result<Event, StoreError> {
        self.events
            .read()
            .await
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or(StoreError::NotFound("Event"))
    }

    pub async fn user_by_id(&self, id: &str) -> Option<User> {
        self.users
            .read()
            .await
            .iter()
            .find(|u| u.id == id)
            .map(User::public)
    }

    fn check_references(&self, event: &NewEvent) -> Result<(), StoreError> {
        if event.title.en.trim().is_empty() {
            return Err(StoreError::Invalid("Event title is required.".into()));
        }
        if !self.cities.iter().any(|c| c.id == event.city_id) {
            return Err(StoreError::Invalid(format!("Unknown city {:?}", event.city_id)));
        }
        if event.category_id == ALL_CATEGORY_ID
            || !self.categories.iter().any(|c| c.id == event.category_id)
        {
            return Err(StoreError::Invalid(format!(
                "Unknown category {:?}",
                event.category_id
            )));
        }
        Ok(())
    }

    pub async fn add_event(&self, event: NewEvent, organizer_id: &str) -> Result<Event, StoreError> {
        self.check_references(&event)?;
        let organizer = self
            .user_by_id(organizer_id)
            .await
            .ok_or(StoreError::NotFound("Organizer"))?;

        let created = Event {
            id: format!("event-{}", Uuid::new_v4()),
            title: event.title,
            description: event.description,
            organizer_id: organizer.id,
            organizer_name: organizer.name,
            category_id: event.category_id,
            city_id: event.city_id,
            date: event.date,
            venue: event.venue,
            coordinates: event.coordinates,
            organizer_phone: event.organizer_phone,
            whatsapp_number: event.whatsapp_number,
            image_url: event.image_url,
            ticket_info: event.ticket_info,
            reviews: Vec::new(),
            is_featured: event.is_featured,
            is_top: event.is_top,
        };

        self.events.write().await.insert(0, created.clone());
        log::info!("event_created event_id={} city={}", created.id, created.city_id);
        Ok(created)
    }

    /// Replaces the editable fields; id, organizer and reviews are kept.
    pub async fn update_event(&self, id: &str, event: NewEvent) -> Result<Event, StoreError> {
        self.check_references(&event)?;
        let mut events = self.events.write().await;
        let existing = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::NotFound("Event"))?;

        existing.title = event.title;
        existing.description = event.description;
        existing.category_id = event.category_id;
        existing.city_id = event.city_id;
        existing.date = event.date;
        existing.venue = event.venue;
        existing.coordinates = event.coordinates;
        existing.organizer_phone = event.organizer_phone;
        existing.whatsapp_number = event.whatsapp_number;
        existing.image_url = event.image_url;
        existing.ticket_info = event.ticket_info;
        existing.is_featured = event.is_featured;
        existing.is_top = event.is_top;

        log::info!("event_updated event_id={}", id);
        Ok(existing.clone())
    }

    pub async fn add_review(
        &self,
        event_id: &str,
        rating: u8,
        comment: &str,
        user_id: &str,
    ) -> Result<Event, StoreError> {
        if !(1..=5).contains(&rating) {
            return Err(StoreError::Invalid("Rating must be between 1 and 5.".into()));
        }
        let user = self
            .user_by_id(user_id)
            .await
            .ok_or(StoreError::NotFound("User"))?;

        let mut events = self.events.write().await;
        let event = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or(StoreError::NotFound("Event"))?;

        event.reviews.insert(
            0,
            Review {
                id: format!("review-{}", Uuid::new_v4()),
                user,
                rating,
                comment: comment.trim().to_string(),
                timestamp: Utc::now(),
            },
        );
        log::info!("review_added event_id={} rating={}", event_id, rating);
        Ok(event.clone())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, StoreError> {
        let users = self.users.read().await;
        let user = users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email) && u.password.as_deref() == Some(password))
            .ok_or(StoreError::InvalidCredentials)?;

        if !user.is_verified {
            return Ok(LoginOutcome::Unverified {
                email: user.email.clone(),
            });
        }
        log::info!("login_success user_id={}", user.id);
        Ok(LoginOutcome::LoggedIn(user.public()))
    }

    /// New accounts start unverified.
    pub async fn signup(&self, new_user: NewUser) -> Result<User, StoreError> {
        let email = new_user.email.trim().to_string();
        if email.is_empty() || !email.contains('@') {
            return Err(StoreError::Invalid("A valid email is required.".into()));
        }

        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&email)) {
            return Err(StoreError::DuplicateEmail);
        }

        let user = User {
            id: format!("user-{}", Uuid::new_v4()),
            name: new_user.name,
            avatar_url: format!("https://i.pravatar.cc/150?u={email}"),
            phone: new_user.phone,
            email,
            password: Some(new_user.password),
            is_verified: false,
        };
        users.push(user.clone());
        log::info!("signup_success user_id={}", user.id);
        Ok(user.public())
    }

    pub async fn verify_user(&self, email: &str) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .ok_or(StoreError::NotFound("User"))?;

        user.is_verified = true;
        log::info!("user_verified user_id={}", user.id);
        Ok(user.public())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_event(city: &str, category: &str) -> NewEvent {
        NewEvent {
            title: LocalizedText::new("Book Fair", "معرض الكتاب", "پێشانگای کتێب"),
            description: LocalizedText::new("Books.", "كتب.", "کتێب."),
            category_id: category.into(),
            city_id: city.into(),
            date: Utc::now() + Duration::days(365),
            venue: "Sami Abdulrahman Park".into(),
            coordinates: None,
            organizer_phone: "+964 750 000 0000".into(),
            whatsapp_number: None,
            image_url: "https://example.com/fair.png".into(),
            ticket_info: None,
            is_featured: false,
            is_top: false,
        }
    }

    #[tokio::test]
    async fn events_are_listed_newest_first() {
        let store = DataStore::seeded();
        let events = store.events().await;
        assert!(events.windows(2).all(|pair| pair[0].date >= pair[1].date));
    }

    #[tokio::test]
    async fn added_event_takes_organizer_name() {
        let store = DataStore::seeded();
        let created = store.add_event(new_event("erbil", "arts"), "user-2").await.unwrap();
        assert_eq!(created.organizer_name, "Shilan Omar");
        assert!(created.reviews.is_empty());
        assert_eq!(store.events().await[0].id, created.id);
    }

    #[tokio::test]
    async fn add_event_rejects_unknown_references() {
        let store = DataStore::seeded();
        assert!(matches!(
            store.add_event(new_event("paris", "arts"), "user-1").await,
            Err(StoreError::Invalid(_))
        ));
        assert!(matches!(
            store.add_event(new_event("erbil", ALL_CATEGORY_ID), "user-1").await,
            Err(StoreError::Invalid(_))
        ));
        assert_eq!(
            store.add_event(new_event("erbil", "arts"), "user-404").await.unwrap_err(),
            StoreError::NotFound("Organizer")
        );
    }

    #[tokio::test]
    async fn update_keeps_identity_and_reviews() {
        let store = DataStore::seeded();
        let updated = store.update_event("event-1", new_event("duhok", "arts")).await.unwrap();
        assert_eq!(updated.id, "event-1");
        assert_eq!(updated.organizer_id, "user-1");
        assert_eq!(updated.city_id, "duhok");
        assert_eq!(updated.reviews.len(), 1);

        assert_eq!(
            store.update_event("missing", new_event("duhok", "arts")).await.unwrap_err(),
            StoreError::NotFound("Event")
        );
    }

    #[tokio::test]
    async fn reviews_are_prepended_and_bounded() {
        let store = DataStore::seeded();
        let event = store.add_review("event-1", 4, " Great ", "user-1").await.unwrap();
        assert_eq!(event.reviews.len(), 2);
        assert_eq!(event.reviews[0].comment, "Great");
        assert!(event.reviews[0].user.password.is_none());

        assert!(store.add_review("event-1", 0, "bad", "user-1").await.is_err());
        assert!(store.add_review("event-1", 6, "bad", "user-1").await.is_err());
    }

    #[tokio::test]
    async fn login_distinguishes_unverified_accounts() {
        let store = DataStore::seeded();
        assert!(matches!(
            store.login("dara@example.com", "password123").await,
            Ok(LoginOutcome::LoggedIn(user)) if user.password.is_none()
        ));
        assert!(matches!(
            store.login("karwan@example.com", "password123").await,
            Ok(LoginOutcome::Unverified { .. })
        ));
        assert_eq!(
            store.login("dara@example.com", "wrong").await.unwrap_err(),
            StoreError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn signup_then_verify_enables_login() {
        let store = DataStore::seeded();
        let new_user = NewUser {
            name: "Rezan".into(),
            phone: "+964 750 111 2222".into(),
            email: "rezan@example.com".into(),
            password: "hunter22".into(),
        };
        let user = store.signup(new_user.clone()).await.unwrap();
        assert!(!user.is_verified);
        assert_eq!(store.signup(new_user).await.unwrap_err(), StoreError::DuplicateEmail);

        store.verify_user("rezan@example.com").await.unwrap();
        assert!(matches!(
            store.login("rezan@example.com", "hunter22").await,
            Ok(LoginOutcome::LoggedIn(_))
        ));
    }
}
