//! Anthropic messages API wrapper.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use super::{CompletionProvider, ProviderError, RetryPolicy, advice_json_from_text, send_with_retry};
use crate::config::ProviderConfig;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl AnthropicProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| Url::parse(DEFAULT_BASE_URL).expect("static URL")),
            api_key: config.api_key.clone(),
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            retry: RetryPolicy::default(),
        }
    }

    #[cfg(test)]
    fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self) -> Result<Url, ProviderError> {
        self.base_url
            .join("/v1/messages")
            .map_err(|e| ProviderError::Malformed(format!("invalid base URL: {e}")))
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, prompt: &str) -> Result<Value, ProviderError> {
        let endpoint = self.endpoint()?;
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = send_with_retry(
            || {
                self.client
                    .post(endpoint.clone())
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", API_VERSION)
                    .json(&body)
            },
            &self.retry,
        )
        .await?;

        let envelope: MessagesResponse = response.json().await?;
        let text = envelope
            .content
            .first()
            .map(|block| block.text.as_str())
            .ok_or_else(|| ProviderError::Malformed("empty content array".to_string()))?;

        Ok(advice_json_from_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> AnthropicProvider {
        let config = ProviderConfig {
            kind: crate::config::ProviderKind::Anthropic,
            api_key: "test-key".to_string(),
            base_url: Some(Url::parse(&server.uri()).unwrap()),
            model: None,
        };
        AnthropicProvider::new(&config).with_retry(RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(1),
            backoff_factor: 2,
            max_backoff: Duration::from_millis(4),
        })
    }

    fn envelope(text: &str) -> serde_json::Value {
        json!({ "content": [{ "type": "text", "text": text }] })
    }

    #[tokio::test]
    async fn parses_advice_from_message_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(r#"{"summary": "rest"}"#)))
            .mount(&server)
            .await;

        let advice = provider_for(&server).complete("prompt").await.unwrap();
        assert_eq!(advice["summary"], "rest");
    }

    #[tokio::test]
    async fn retries_rate_limits_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(r#"{"summary": "ok"}"#)))
            .expect(1)
            .mount(&server)
            .await;

        let advice = provider_for(&server).complete("prompt").await.unwrap();
        assert_eq!(advice["summary"], "ok");
    }

    #[tokio::test]
    async fn persistent_rate_limit_surfaces_as_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = provider_for(&server).complete("prompt").await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn non_json_text_becomes_fallback_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope("Drink more water.")))
            .mount(&server)
            .await;

        let advice = provider_for(&server).complete("prompt").await.unwrap();
        assert_eq!(advice["summary"], "Drink more water.");
        assert_eq!(advice["structured"], false);
    }
}
