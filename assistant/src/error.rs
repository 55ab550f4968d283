use thiserror::Error;

use crate::rate_limiter::RateLimitDecision;

/// Failures of a proxy invocation. `Display` is what the caller sees; the
/// `detail` fields are for server logs only.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Method {0} Not Allowed")]
    MethodNotAllowed(String),

    #[error("Invalid JSON in request body.")]
    MalformedJson,

    #[error("Validation Error: {0}")]
    Validation(String),

    #[error("Too many requests. Please try again after a short break.")]
    RateLimited(RateLimitDecision),

    #[error("Server configuration error. The AI service is currently unavailable.")]
    NotConfigured,

    #[error("Failed to get AI suggestions.")]
    SchemaViolation { detail: String },

    #[error("Failed to get AI suggestions.")]
    Upstream { stage: &'static str, detail: String },
}

impl ProxyError {
    pub fn status_code(&self) -> u16 {
        match self {
            ProxyError::MethodNotAllowed(_) => 405,
            ProxyError::MalformedJson | ProxyError::Validation(_) => 400,
            ProxyError::RateLimited(_) => 429,
            ProxyError::NotConfigured => 503,
            ProxyError::SchemaViolation { .. } | ProxyError::Upstream { .. } => 500,
        }
    }

    /// Short caller-safe diagnostic, never the upstream text.
    pub fn details(&self) -> Option<String> {
        match self {
            ProxyError::SchemaViolation { .. } => Some("invalid_model_output".to_string()),
            ProxyError::Upstream { stage, .. } => Some(format!("{stage}_failed")),
            _ => None,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

/// Failure of a single attempt as observed by the client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),
}

impl AttemptError {
    /// Server-side and transport failures are worth another try; 4xx are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            AttemptError::Status { status, .. } => *status >= 500,
            AttemptError::Network(_) => true,
        }
    }
}

/// Terminal outcome of an orchestrated call, rendered verbatim by the assistant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssistError {
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("The request to the AI assistant took too long. Please try again.")]
    TimedOut,

    #[error("Failed to get AI suggestions after multiple attempts. Please check your connection and try again.")]
    Exhausted { attempts: u32, last_error: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("An account with this email already exists.")]
    DuplicateEmail,

    #[error("{0}")]
    Invalid(String),
}
