use anyhow::Result;
use dashmap::DashMap;
use event_assistant::{
    Config, DataStore, GeminiService, GenerationProxy, InMemoryStore, ModelClient, RateLimitBackend,
    RateLimitStore, RateLimiter, UpstashStore,
};
use std::sync::Arc;

/// Everything the handlers share. Built once in `main`.
pub struct AppState {
    pub proxy: GenerationProxy,
    pub store: DataStore,
    /// Session token to user id.
    pub sessions: DashMap<String, String>,
    pub trust_proxy_headers: bool,
}

impl AppState {
    pub fn new(proxy: GenerationProxy, store: DataStore) -> Self {
        Self {
            proxy,
            store,
            sessions: DashMap::new(),
            trust_proxy_headers: false,
        }
    }

    pub fn with_trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let backend: Arc<dyn RateLimitStore> = match &config.rate_limit_backend {
            RateLimitBackend::Memory => Arc::new(InMemoryStore::new()),
            RateLimitBackend::Upstash { url, token } => {
                log::info!("Using Upstash rate-limit store at {}", url);
                Arc::new(UpstashStore::new(url.clone(), token.clone()))
            }
        };
        let rate_limiter = RateLimiter::new(backend, config.rate_limit.clone());

        let model: Option<Arc<dyn ModelClient>> = match config.gemini.api_key {
            Some(_) => Some(Arc::new(GeminiService::new(&config.gemini)?)),
            None => {
                log::warn!("GEMINI_API_KEY is not set; /api/generate-event will answer 503");
                None
            }
        };

        if config.trust_proxy_headers {
            log::info!("Rate limiting on x-forwarded-for / x-real-ip");
        }
        Ok(Self::new(GenerationProxy::new(rate_limiter, model), DataStore::seeded())
            .with_trust_proxy_headers(config.trust_proxy_headers))
    }
}
