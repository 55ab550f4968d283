use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::RateLimitConfig;
use crate::rate_limiter::{RateLimitDecision, RateLimitStore};

const KEY_PREFIX: &str = "ratelimit";

/// Sliding log over a sorted set. Runs as one script so the check, the
/// insert and the expiry happen atomically on the Redis side.
const SLIDING_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local used = redis.call('ZCARD', key)
local allowed = 0
if used < limit then
  redis.call('ZADD', key, now, ARGV[4])
  used = used + 1
  allowed = 1
end
redis.call('PEXPIRE', key, window)
local reset = now + window
local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
if oldest[2] then
  reset = tonumber(oldest[2]) + window
end
return {allowed, used, reset}
"#;

#[derive(Debug, Deserialize)]
struct UpstashReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Rate-limit store backed by an Upstash (or Vercel KV) Redis REST endpoint.
pub struct UpstashStore {
    client: Client,
    base_url: String,
    token: String,
}

impl UpstashStore {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn key_for(address: &str) -> String {
        format!("{KEY_PREFIX}:{address}")
    }

    async fn command(&self, command: Value) -> Result<Value> {
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.token)
            .json(&command)
            .send()
            .await
            .map_err(|e| anyhow!("Upstash request failed: {}", e.without_url()))?;

        let status = response.status();
        let reply: UpstashReply = response
            .json()
            .await
            .map_err(|e| anyhow!("Upstash returned an unreadable body ({status}): {e}"))?;

        if let Some(error) = reply.error {
            return Err(anyhow!("Upstash error ({status}): {error}"));
        }
        reply
            .result
            .ok_or_else(|| anyhow!("Upstash reply had no result ({status})"))
    }
}

fn parse_script_reply(result: &Value, limit: u32) -> Result<RateLimitDecision> {
    let fields = result
        .as_array()
        .filter(|fields| fields.len() == 3)
        .ok_or_else(|| anyhow!("Unexpected rate-limit script reply: {result}"))?;

    let number = |index: usize| {
        fields[index]
            .as_i64()
            .or_else(|| fields[index].as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| anyhow!("Non-numeric field {index} in rate-limit reply: {result}"))
    };

    let allowed = number(0)? == 1;
    let used = number(1)?.max(0) as u32;
    let reset_at_ms = number(2)?;

    Ok(RateLimitDecision {
        allowed,
        limit,
        remaining: limit.saturating_sub(used),
        reset_at_ms,
    })
}

#[async_trait]
impl RateLimitStore for UpstashStore {
    async fn check_and_consume(
        &self,
        key: &str,
        now_ms: i64,
        policy: &RateLimitConfig,
    ) -> Result<RateLimitDecision> {
        let window_ms = policy.window.as_millis() as i64;
        let member = format!("{now_ms}:{}", Uuid::new_v4());

        let command = json!([
            "EVAL",
            SLIDING_WINDOW_SCRIPT,
            "1",
            Self::key_for(key),
            now_ms.to_string(),
            window_ms.to_string(),
            policy.max_requests.to_string(),
            member,
        ]);

        let result = self.command(command).await?;
        parse_script_reply(&result, policy.max_requests)
    }
}
