//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides. The file path defaults to `config.yaml` but can be specified
//! via the `-f` flag or the `VITALSD_CONFIG` environment variable.
//!
//! Sources are merged in order (later overrides earlier):
//!
//! 1. **YAML config file** - base configuration
//! 2. **Environment variables** - variables prefixed with `VITALSD_`
//!
//! Nested values use double underscores: `VITALSD_PROVIDER__API_KEY=...`
//! sets `provider.api_key`.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "VITALSD_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub cache: CacheSettings,
}

/// Which LLM backend serves completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    Gemini,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    #[serde(default)]
    pub api_key: String,
    /// Override the provider's default API base URL (useful for proxies and tests).
    pub base_url: Option<Url>,
    /// Override the provider's default model.
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_forecast_url")]
    pub forecast_url: Url,
    #[serde(default = "default_air_quality_url")]
    pub air_quality_url: Url,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            forecast_url: default_forecast_url(),
            air_quality_url: default_air_quality_url(),
        }
    }
}

/// Knobs forwarded to [`recall::CacheConfig`]. Similarity thresholds keep
/// their library defaults; only lifetimes and the budget are operator-facing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_fresh_ttl", with = "humantime_serde")]
    pub fresh_ttl: Duration,
    #[serde(default = "default_adapt_max_age", with = "humantime_serde")]
    pub adapt_max_age: Duration,
    /// Per-user daily spend allowance, dollars.
    #[serde(default = "default_daily_budget")]
    pub daily_budget: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            fresh_ttl: default_fresh_ttl(),
            adapt_max_age: default_adapt_max_age(),
            daily_budget: default_daily_budget(),
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> recall::CacheConfig {
        recall::CacheConfig {
            fresh_ttl: self.fresh_ttl,
            adapt_max_age: self.adapt_max_age,
            daily_budget: self.daily_budget,
            ..recall::CacheConfig::default()
        }
    }
}

impl Config {
    /// Load configuration from the YAML file named in `args` plus
    /// `VITALSD_`-prefixed environment overrides.
    pub fn load(args: &Args) -> Result<Self, Error> {
        let figment = Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("VITALSD_").split("__"));

        let config: Config = figment.extract().map_err(|e| Error::BadRequest {
            message: format!("Invalid configuration: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.provider.api_key.is_empty() {
            return Err(Error::BadRequest {
                message: "provider.api_key must be set (or VITALSD_PROVIDER__API_KEY)".to_string(),
            });
        }
        if self.cache.daily_budget <= 0.0 {
            return Err(Error::BadRequest {
                message: "cache.daily_budget must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3030
}

fn default_forecast_url() -> Url {
    Url::parse("https://api.open-meteo.com").expect("static URL")
}

fn default_air_quality_url() -> Url {
    Url::parse("https://air-quality-api.open-meteo.com").expect("static URL")
}

fn default_fresh_ttl() -> Duration {
    Duration::from_secs(3600)
}

fn default_adapt_max_age() -> Duration {
    Duration::from_secs(4 * 3600)
}

fn default_daily_budget() -> f64 {
    0.10
}
