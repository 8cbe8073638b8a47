//! Shared helpers for unit and integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use recall::AnalysisCache;
use serde_json::{Value, json};

use crate::config::{CacheSettings, Config, ProviderConfig, ProviderKind, WeatherConfig};
use crate::providers::{CompletionProvider, ProviderError};
use crate::weather::WeatherClient;
use crate::{AppState, api};

/// Completion provider that returns a canned payload and counts calls.
pub struct StubProvider {
    response: Value,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn new(response: Value) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, _prompt: &str) -> Result<Value, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        provider: ProviderConfig {
            kind: ProviderKind::Anthropic,
            api_key: "test-key".to_string(),
            base_url: None,
            model: None,
        },
        weather: WeatherConfig::default(),
        cache: CacheSettings::default(),
    }
}

/// Build a router backed by the given provider, fresh cache included.
pub fn test_app(provider: Arc<dyn CompletionProvider>) -> Router {
    let config = test_config();
    let state = AppState {
        cache: Arc::new(AnalysisCache::new(config.cache.to_cache_config())),
        provider,
        weather: Arc::new(WeatherClient::new(&config.weather)),
        config,
    };
    api::router(state)
}

/// A minimal valid advice request body. No location, so handlers never reach
/// out to the weather API.
pub fn advice_body(user_id: &str) -> Value {
    json!({
        "user_id": user_id,
        "energy_level": 62.0,
        "energy_trend": "stable",
        "time_of_day": "morning",
        "focus_areas": ["sleep", "hydration"],
    })
}
