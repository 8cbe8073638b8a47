//! The Vitals advice backend.
//!
//! Receives a user's health context (energy level and trend, focus areas,
//! optional location), enriches it with a weather and air-quality lookup,
//! and serves structured daily advice generated by an LLM completion
//! provider. Advice calls go through [`recall::AnalysisCache`], a
//! context-similarity cache that reuses recent results for near-identical
//! contexts and tracks per-user daily spend.

pub mod advice;
pub mod api;
pub mod config;
pub mod errors;
pub mod prompt;
pub mod providers;
pub mod telemetry;
pub mod test_utils;
pub mod weather;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use recall::AnalysisCache;

pub use config::Config;
pub use errors::{Error, Result};

use crate::providers::CompletionProvider;
use crate::weather::WeatherClient;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub cache: Arc<AnalysisCache>,
    pub provider: Arc<dyn CompletionProvider>,
    pub weather: Arc<WeatherClient>,
}

pub struct Application {
    router: Router,
    config: Config,
    cache: Arc<AnalysisCache>,
}

impl Application {
    /// Create a new application instance with all resources initialized.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        tracing::debug!("starting advice backend with configuration: {:#?}", config);

        let cache = Arc::new(AnalysisCache::new(config.cache.to_cache_config()));
        let provider = providers::build(&config.provider);
        let weather = Arc::new(WeatherClient::new(&config.weather));

        let state = AppState {
            config: config.clone(),
            cache: cache.clone(),
            provider,
            weather,
        };
        let router = api::router(state);

        Ok(Self { router, config, cache })
    }

    /// Serve until `shutdown` resolves, then drain and tear the cache down.
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!(%addr, "vitalsd listening");

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        // Cancel pending eviction timers so nothing outlives the server.
        self.cache.clear();
        tracing::info!("shutdown complete");
        Ok(())
    }
}
