//! Upstash Redis REST client for the sliding-window limiter.
//!
//! Each hit is a single `EVAL` of [`SLIDING_WINDOW_SCRIPT`], which Redis runs
//! atomically: prune entries older than the window, count, add the hit when
//! there is room, refresh the key TTL, and report the oldest entry so the
//! caller can compute the reset time.
//!
//! Wire format: `POST <url>` with a JSON array command body and a bearer
//! token; replies are `{"result": ...}` or `{"error": "..."}`.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{CounterStore, CounterStoreError, SlidingWindow, WindowOutcome};

/// Sorted-set sliding log. Returns `{admitted, remaining, reset_ms}`.
pub const SLIDING_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
local member = ARGV[4]

redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)
local admitted = 0
if count < limit then
  redis.call('ZADD', key, now, member)
  count = count + 1
  admitted = 1
end
redis.call('PEXPIRE', key, window)

local reset = now + window
local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
if oldest[2] then
  reset = tonumber(oldest[2]) + window
end
return {admitted, limit - count, reset}
"#;

#[derive(Debug, Deserialize)]
struct RestReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Counter store backed by Upstash Redis over REST.
#[derive(Debug, Clone)]
pub struct UpstashStore {
    http: Client,
    url: String,
    token: SecretString,
}

impl UpstashStore {
    pub fn new(http: Client, url: impl Into<String>, token: SecretString) -> Self {
        Self {
            http,
            url: url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Run a single Redis command and return its `result`.
    async fn command(&self, args: &[String]) -> Result<Value, CounterStoreError> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(self.token.expose_secret())
            .json(args)
            .send()
            .await
            .map_err(|e| CounterStoreError::Transport(e.to_string()))?;

        let status = response.status();
        let reply: RestReply = response
            .json()
            .await
            .map_err(|e| CounterStoreError::Protocol(format!("status {status}: {e}")))?;

        if let Some(error) = reply.error {
            return Err(CounterStoreError::Remote(error));
        }
        if !status.is_success() {
            return Err(CounterStoreError::Remote(format!("status {status}")));
        }

        reply
            .result
            .ok_or_else(|| CounterStoreError::Protocol("missing result".to_string()))
    }
}

fn as_i64(value: Option<&Value>, field: &str) -> Result<i64, CounterStoreError> {
    value
        .and_then(Value::as_i64)
        .ok_or_else(|| CounterStoreError::Protocol(format!("{field} is not an integer")))
}

/// Decode the `{admitted, remaining, reset}` triple returned by the script.
fn parse_outcome(result: &Value) -> Result<WindowOutcome, CounterStoreError> {
    let items = result
        .as_array()
        .ok_or_else(|| CounterStoreError::Protocol(format!("expected array, got {result}")))?;

    let admitted = as_i64(items.first(), "admitted")? == 1;
    let remaining = as_i64(items.get(1), "remaining")?;
    let reset_ms = as_i64(items.get(2), "reset")?;

    Ok(WindowOutcome {
        admitted,
        remaining: u32::try_from(remaining.max(0)).unwrap_or(u32::MAX),
        reset_ms,
    })
}

#[async_trait]
impl CounterStore for UpstashStore {
    async fn hit(
        &self,
        key: &str,
        window: SlidingWindow,
        now_ms: i64,
    ) -> Result<WindowOutcome, CounterStoreError> {
        // Unique member so that hits within the same millisecond are all counted
        let member = format!("{now_ms}-{}", Uuid::new_v4().simple());
        let args = [
            "EVAL".to_string(),
            SLIDING_WINDOW_SCRIPT.to_string(),
            "1".to_string(),
            key.to_string(),
            now_ms.to_string(),
            window.window_ms().to_string(),
            window.limit.to_string(),
            member,
        ];

        let result = self.command(&args).await?;
        let outcome = parse_outcome(&result)?;
        debug!(key, admitted = outcome.admitted, remaining = outcome.remaining, "Sliding window hit");
        Ok(outcome)
    }
}
