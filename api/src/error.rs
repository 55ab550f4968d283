use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use event_assistant::{ErrorResponse, ProxyError, RateLimitDecision, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Please verify your email before signing in.")]
    Unverified { email: String },

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Proxy(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            ApiError::Store(StoreError::DuplicateEmail) => StatusCode::CONFLICT,
            ApiError::Store(StoreError::Invalid(_)) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Unverified { .. } => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            ApiError::Proxy(e) => e.details(),
            ApiError::Unverified { email } => Some(email.clone()),
            _ => None,
        }
    }
}

fn header_value(value: impl ToString) -> Option<HeaderValue> {
    HeaderValue::from_str(&value.to_string()).ok()
}

/// HTTP-date, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn http_date(decision: &RateLimitDecision) -> String {
    decision
        .reset_at()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

fn rate_limit_headers(decision: &RateLimitDecision) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let now_ms = Utc::now().timestamp_millis();
    let entries = [
        ("x-ratelimit-limit", header_value(decision.limit)),
        ("x-ratelimit-remaining", header_value(decision.remaining)),
        ("x-ratelimit-reset", header_value(http_date(decision))),
        ("retry-after", header_value(decision.retry_after_secs(now_ms))),
    ];
    for (name, value) in entries {
        if let Some(value) = value {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
    headers
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("[API_ERROR] {} {:?}", status.as_u16(), self);
        } else {
            log::warn!("Client-side API Error: {} {}", status.as_u16(), self);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            details: self.details(),
        });

        let mut headers = HeaderMap::new();
        match &self {
            ApiError::Proxy(ProxyError::RateLimited(decision)) => headers = rate_limit_headers(decision),
            ApiError::Proxy(ProxyError::MethodNotAllowed(_)) => {
                headers.insert(header::ALLOW, HeaderValue::from_static("POST"));
            }
            _ => {}
        }

        (status, headers, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_client_statuses() {
        assert_eq!(ApiError::from(StoreError::NotFound("Event")).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(StoreError::InvalidCredentials).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(StoreError::DuplicateEmail).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(StoreError::Invalid("bad".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn reset_header_is_an_http_date() {
        let decision = RateLimitDecision {
            allowed: false,
            limit: 5,
            remaining: 0,
            reset_at_ms: 784_111_777_000,
        };
        assert_eq!(http_date(&decision), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn rate_limited_response_carries_quota_headers() {
        let decision = RateLimitDecision {
            allowed: false,
            limit: 5,
            remaining: 0,
            reset_at_ms: Utc::now().timestamp_millis() + 12_000,
        };
        let response = ApiError::from(ProxyError::RateLimited(decision)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["x-ratelimit-limit"], "5");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        assert!(response.headers().contains_key("x-ratelimit-reset"));
        let retry_after: u64 = response.headers()["retry-after"].to_str().unwrap().parse().unwrap();
        assert!((11..=12).contains(&retry_after));
    }
}
