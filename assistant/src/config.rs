use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-4.0-generate-001";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitBackend {
    Memory,
    Upstash { url: String, token: String },
}

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .finish()
    }
}

impl GeminiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let api_key = env::var("GEMINI_API_KEY")
            .or_else(|_| env::var("API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());

        Self {
            api_key,
            base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.into()),
            text_model: env::var("GEMINI_TEXT_MODEL").unwrap_or_else(|_| DEFAULT_TEXT_MODEL.into()),
            image_model: env::var("GEMINI_IMAGE_MODEL")
                .unwrap_or_else(|_| DEFAULT_IMAGE_MODEL.into()),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub gemini: GeminiConfig,
    pub rate_limit: RateLimitConfig,
    pub rate_limit_backend: RateLimitBackend,
    /// Key callers on `x-forwarded-for` / `x-real-ip` instead of the socket
    /// peer. Only safe behind a proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            gemini: GeminiConfig::default(),
            rate_limit: RateLimitConfig::default(),
            rate_limit_backend: RateLimitBackend::Memory,
            trust_proxy_headers: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            max_requests: load_or("RATE_LIMIT_MAX_REQUESTS", defaults.max_requests),
            window: Duration::from_secs(load_or("RATE_LIMIT_WINDOW_SECS", defaults.window.as_secs())),
        };

        Self {
            port: load_or("PORT", 3000),
            gemini: GeminiConfig::from_env(),
            rate_limit,
            rate_limit_backend: backend_from_env(),
            trust_proxy_headers: load_or("TRUST_PROXY_HEADERS", false),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_gemini(mut self, gemini: GeminiConfig) -> Self {
        self.gemini = gemini;
        self
    }

    pub fn with_rate_limit(mut self, max_requests: u32, window: Duration) -> Self {
        self.rate_limit = RateLimitConfig { max_requests, window };
        self
    }

    pub fn with_trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    pub fn with_upstash(mut self, url: impl Into<String>, token: impl Into<String>) -> Self {
        self.rate_limit_backend = RateLimitBackend::Upstash {
            url: url.into(),
            token: token.into(),
        };
        self
    }
}

fn load_or<T: FromStr + Display>(key: &str, default: T) -> T
where
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            log::warn!("Invalid {key} value {raw:?}: {e}, using default {default}");
            default
        }),
        Err(_) => default,
    }
}

fn backend_from_env() -> RateLimitBackend {
    let requested = env::var("RATE_LIMIT_BACKEND").unwrap_or_else(|_| "memory".into());
    if !requested.eq_ignore_ascii_case("upstash") {
        return RateLimitBackend::Memory;
    }

    let url = env::var("UPSTASH_REDIS_REST_URL").or_else(|_| env::var("KV_REST_API_URL"));
    let token = env::var("UPSTASH_REDIS_REST_TOKEN").or_else(|_| env::var("KV_REST_API_TOKEN"));
    match (url, token) {
        (Ok(url), Ok(token)) => RateLimitBackend::Upstash { url, token },
        _ => {
            log::warn!("RATE_LIMIT_BACKEND=upstash but REST URL/token missing, using in-memory store");
            RateLimitBackend::Memory
        }
    }
}
