pub mod assistant_session;
pub mod config;
pub mod data_store;
pub mod error;
pub mod event_form;
pub mod gemini_service;
pub mod generation_service;
pub mod models;
pub mod orchestrator;
pub mod proxy_client;
pub mod rate_limiter;
pub mod seed_data;
pub mod upstash_store;

pub use models::*;
pub use assistant_session::{AssistantSession, SessionState, SuggestionPreview};
pub use config::{Config, GeminiConfig, RateLimitBackend, RateLimitConfig};
pub use data_store::{DataStore, LoginOutcome, NewUser};
pub use error::{AssistError, AttemptError, ProxyError, StoreError};
pub use event_form::EventForm;
pub use gemini_service::{GeminiService, ModelClient};
pub use generation_service::GenerationProxy;
pub use orchestrator::{run_with_retry, RetryPolicy};
pub use proxy_client::{ProxyClient, SuggestionSource};
pub use rate_limiter::{InMemoryStore, RateLimitDecision, RateLimitStore, RateLimiter};
pub use upstash_store::UpstashStore;
