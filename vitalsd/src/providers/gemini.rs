//! Google Gemini generateContent API wrapper.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use super::{CompletionProvider, ProviderError, RetryPolicy, advice_json_from_text, send_with_retry};
use crate::config::ProviderConfig;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GeminiProvider {
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
            .join(&format!("/v1beta/models/{}:generateContent", self.model))
            .map_err(|e| ProviderError::Malformed(format!("invalid base URL: {e}")))
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, prompt: &str) -> Result<Value, ProviderError> {
        let endpoint = self.endpoint()?;
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        let response = send_with_retry(
            || {
                self.client
                    .post(endpoint.clone())
                    .query(&[("key", self.api_key.as_str())])
                    .json(&body)
            },
            &self.retry,
        )
        .await?;

        let envelope: GenerateContentResponse = response.json().await?;
        let text = envelope
            .candidates
            .first()
            .and_then(|candidate| candidate.content.parts.first())
            .map(|part| part.text.as_str())
            .ok_or_else(|| ProviderError::Malformed("no candidates in response".to_string()))?;

        Ok(advice_json_from_text(text))
    }
}
