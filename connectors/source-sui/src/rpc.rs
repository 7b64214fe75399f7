//! Minimal Sui JSON-RPC client with bounded retry.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use tidemark_types::errors::SourceError;

/// Longest response excerpt carried in an error.
const PREVIEW_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Why a single call failed.
#[derive(Debug)]
pub(crate) enum CallError {
    /// Worth another attempt: transport failure, non-2xx, or a JSON-RPC error.
    Transient(String),
    /// The node answered with something that will not decode on retry.
    Malformed { message: String, body: String },
}

fn preview(raw: &str) -> String {
    if raw.len() <= PREVIEW_LIMIT {
        return raw.to_string();
    }
    let mut end = PREVIEW_LIMIT;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} bytes total)", &raw[..end], raw.len())
}

pub(crate) struct RpcClient {
    http: reqwest::Client,
    url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl RpcClient {
    pub(crate) fn new(
        url: String,
        timeout: Duration,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        Ok(Self {
            http,
            url,
            max_retries,
            retry_delay,
        })
    }

    async fn call_once<T: DeserializeOwned>(&self, method: &str, params: &Value) -> Result<T, CallError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CallError::Transient(format!("{method} request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CallError::Transient(format!("{method} response read failed: {e}")))?;
        if !status.is_success() {
            return Err(CallError::Transient(format!(
                "{method} returned HTTP {status}: {}",
                preview(&text)
            )));
        }

        let envelope: RpcEnvelope<T> = serde_json::from_str(&text).map_err(|e| CallError::Malformed {
            message: format!("undecodable {method} response: {e}"),
            body: preview(&text),
        })?;
        if let Some(error) = envelope.error {
            return Err(CallError::Transient(format!(
                "{method} RPC error {}: {}",
                error.code, error.message
            )));
        }
        envelope.result.ok_or_else(|| CallError::Malformed {
            message: format!("{method} response missing both result and error fields"),
            body: preview(&text),
        })
    }

    /// Call `method`, retrying transient failures up to `max_retries` extra
    /// times with a fixed delay.
    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, SourceError> {
        let attempts = self.max_retries + 1;
        let mut attempt = 1;
        loop {
            match self.call_once(method, &params).await {
                Ok(result) => return Ok(result),
                Err(CallError::Malformed { message, body }) => {
                    return Err(SourceError::Upstream {
                        status: Some(200),
                        message,
                        body: Some(body),
                    });
                }
                Err(CallError::Transient(message)) if attempt >= attempts => {
                    tracing::error!(method, attempts, error = %message, "source-sui: giving up");
                    return Err(SourceError::unavailable(attempts, message));
                }
                Err(CallError::Transient(message)) => {
                    tracing::warn!(
                        method,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = self.retry_delay.as_millis() as u64,
                        error = %message,
                        "source-sui: call failed, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
