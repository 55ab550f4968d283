use crate::error::{AssistError, AttemptError};
use crate::models::{ErrorResponse, GenerationRequest, GenerationResult};
use crate::orchestrator::{run_with_retry, RetryPolicy};
use async_trait::async_trait;
use reqwest::Client;

/// Anything that can turn an idea into a suggestion for the assistant.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    async fn suggest(&self, request: &GenerationRequest) -> Result<GenerationResult, AssistError>;
}

/// Caller side of the generation endpoint.
#[derive(Clone)]
pub struct ProxyClient {
    client: Client,
    endpoint: String,
    policy: RetryPolicy,
}

impl ProxyClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// A single POST, without retries.
    pub async fn attempt(&self, request: &GenerationRequest) -> Result<GenerationResult, AttemptError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| AttemptError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<GenerationResult>()
                .await
                .map_err(|e| AttemptError::Network(format!("Unreadable response body: {e}")));
        }

        let body = response.json::<ErrorResponse>().await.ok();
        let message = body.map(|b| b.error).unwrap_or_else(|| {
            if status.is_client_error() {
                format!("A client-side error occurred ({}).", status.as_u16())
            } else {
                format!("A server error occurred ({}).", status.as_u16())
            }
        });

        if status.is_client_error() {
            log::error!("Client-side API Error: {} {}", status.as_u16(), message);
        }
        Err(AttemptError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// Retries per the configured policy.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, AssistError> {
        run_with_retry(&self.policy, move |attempt| {
            log::debug!("Requesting AI suggestions from {} (attempt {})", self.endpoint, attempt);
            self.attempt(request)
        })
        .await
    }
}

#[async_trait]
impl SuggestionSource for ProxyClient {
    async fn suggest(&self, request: &GenerationRequest) -> Result<GenerationResult, AssistError> {
        self.generate(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CatalogEntry, CatalogName};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers every connection with the same canned response and counts them.
    async fn canned_server(status_line: &'static str, body: String) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { break };
                counter.fetch_add(1, Ordering::SeqCst);
                let body = body.clone();
                tokio::spawn(async move {
                    read_request(&mut socket).await;
                    let response = format!(
                        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{address}/api/generate-event"), hits)
    }

    /// Accepts and reads requests but never answers.
    async fn silent_server() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { break };
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    read_request(&mut socket).await;
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    drop(socket);
                });
            }
        });

        (format!("http://{address}/api/generate-event"), hits)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let Ok(read) = socket.read(&mut chunk).await else { return };
            if read == 0 {
                return;
            }
            buffer.extend_from_slice(&chunk[..read]);
            let text = String::from_utf8_lossy(&buffer);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buffer.len() >= header_end + 4 + content_length {
                    return;
                }
            }
        }
    }

    fn request() -> GenerationRequest {
        let entry = |id: &str, en: &str| CatalogEntry {
            id: id.to_string(),
            name: CatalogName { en: en.to_string(), ar: None, ku: None },
        };
        GenerationRequest {
            prompt: "A rooftop jazz night in Erbil".into(),
            cities: vec![entry("erbil", "Erbil")],
            categories: vec![entry("music", "Music")],
            image: None,
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            attempt_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn server_errors_exhaust_the_retry_budget() {
        let (endpoint, hits) = canned_server(
            "500 Internal Server Error",
            r#"{"error":"Failed to get AI suggestions.","details":"text_generation_failed"}"#.into(),
        )
        .await;
        let client = ProxyClient::new(endpoint).with_policy(fast_policy());

        let err = client.generate(&request()).await.unwrap_err();
        assert!(matches!(err, AssistError::Exhausted { attempts: 3, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limit_message_is_surfaced_after_one_attempt() {
        let (endpoint, hits) = canned_server(
            "429 Too Many Requests",
            r#"{"error":"Too many requests. Please try again after a short break."}"#.into(),
        )
        .await;
        let client = ProxyClient::new(endpoint).with_policy(fast_policy());

        let err = client.generate(&request()).await.unwrap_err();
        assert_eq!(err.to_string(), "Too many requests. Please try again after a short break.");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unparseable_error_body_gets_a_generic_message() {
        let (endpoint, _) = canned_server("400 Bad Request", "oops".into()).await;
        let client = ProxyClient::new(endpoint).with_policy(fast_policy());

        let err = client.attempt(&request()).await.unwrap_err();
        assert_eq!(
            err,
            AttemptError::Status {
                status: 400,
                message: "A client-side error occurred (400).".into(),
            }
        );
    }

    #[tokio::test]
    async fn hung_server_times_out_after_one_connection() {
        let (endpoint, hits) = silent_server().await;
        let policy = RetryPolicy {
            attempt_timeout: Duration::from_millis(300),
            ..fast_policy()
        };
        let client = ProxyClient::new(endpoint).with_policy(policy);

        let err = client.generate(&request()).await.unwrap_err();
        assert_eq!(err, AssistError::TimedOut);
        // Give a stray retry time to show up.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_body_is_parsed() {
        let body = serde_json::json!({
            "title": { "en": "Jazz", "ar": "جاز", "ku": "جاز" },
            "description": { "en": "Live", "ar": "حي", "ku": "زیندوو" },
            "suggestedCityId": "erbil",
            "suggestedCategoryId": "music",
            "generatedImageBase64": "aW1hZ2U="
        })
        .to_string();
        let (endpoint, hits) = canned_server("200 OK", body).await;
        let client = ProxyClient::new(endpoint).with_policy(fast_policy());

        let result = client.suggest(&request()).await.unwrap();
        assert_eq!(result.suggested_city_id, "erbil");
        assert_eq!(result.generated_image_base64, "aW1hZ2U=");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
