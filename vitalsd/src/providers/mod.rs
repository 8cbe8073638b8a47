//! LLM completion providers.
//!
//! The rest of the service only sees [`CompletionProvider`]: prompt string
//! in, structured advice JSON out. The two implementations are thin HTTP
//! wrappers over the vendor APIs; everything vendor-specific (envelope
//! shapes, auth headers, model naming) stays inside this module.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;

use crate::config::{ProviderConfig, ProviderKind};

pub mod anthropic;
pub mod gemini;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;

#[derive(Debug, ThisError)]
pub enum ProviderError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("still rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("unexpected status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// An opaque "LLM completion" capability: given a prompt, return the model's
/// advice as structured JSON.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<Value, ProviderError>;
}

/// Construct the configured provider.
pub fn build(config: &ProviderConfig) -> Arc<dyn CompletionProvider> {
    match config.kind {
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(config)),
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(config)),
    }
}

/// Retry behaviour for provider calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
    pub backoff_factor: u32,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(500),
            backoff_factor: 2,
            max_backoff: Duration::from_secs(8),
        }
    }
}

/// Retry on server errors (5xx), rate limits (429), and timeouts (408).
fn should_retry(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::REQUEST_TIMEOUT
}

/// Send a request with bounded exponential backoff.
///
/// `build` is invoked once per attempt since a `RequestBuilder` is consumed
/// by `send`. Non-retryable statuses return immediately as [`ProviderError::Api`];
/// exhausting the retry allowance on 429s reports [`ProviderError::RateLimited`].
pub(crate) async fn send_with_retry(
    build: impl Fn() -> reqwest::RequestBuilder,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, ProviderError> {
    let mut backoff = policy.backoff;
    let mut attempts = 0;

    loop {
        attempts += 1;
        let response = build().send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        if !should_retry(status) || attempts > policy.max_retries {
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(ProviderError::RateLimited { attempts });
            }
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        tracing::warn!(status = status.as_u16(), attempts, backoff_ms = backoff.as_millis() as u64, "retrying provider request");
        tokio::time::sleep(backoff).await;
        backoff = (backoff * policy.backoff_factor).min(policy.max_backoff);
    }
}

/// Interpret the model's text output as advice JSON.
///
/// Models are instructed to reply with a bare JSON object but routinely wrap
/// it in a markdown fence or preamble text. Accept a fenced or raw object; if
/// no object parses, fall back to wrapping the raw text so callers always get
/// a usable advice payload.
pub(crate) fn advice_json_from_text(text: &str) -> Value {
    let trimmed = text.trim();

    let candidate = if let Some(fenced) = extract_fenced_block(trimmed) {
        fenced
    } else if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        &trimmed[start..=end]
    } else {
        trimmed
    };

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) if value.is_object() => value,
        _ => {
            tracing::debug!("provider returned non-JSON advice text; wrapping as summary");
            json!({ "summary": trimmed, "structured": false })
        }
    }
}

fn extract_fenced_block(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```json").or_else(|| text.strip_prefix("```"))?;
    let end = rest.rfind("```")?;
    Some(rest[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_json_object_passes_through() {
        let value = advice_json_from_text(r#"{"summary": "rest today"}"#);
        assert_eq!(value["summary"], "rest today");
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let value = advice_json_from_text("```json\n{\"summary\": \"hydrate\"}\n```");
        assert_eq!(value["summary"], "hydrate");
    }

    #[test]
    fn json_embedded_in_prose_is_extracted() {
        let value = advice_json_from_text("Here is your advice:\n{\"summary\": \"walk\"}\nEnjoy!");
        assert_eq!(value["summary"], "walk");
    }

    #[test]
    fn plain_text_falls_back_to_summary_object() {
        let value = advice_json_from_text("Take it easy today.");
        assert_eq!(value["summary"], "Take it easy today.");
        assert_eq!(value["structured"], false);
    }
}
