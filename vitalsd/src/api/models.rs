//! Request/response DTOs for the advice API.

use chrono::{DateTime, Utc};
use recall::{AdviceSource, EnergyTrend};
use serde::{Deserialize, Serialize};

use crate::advice::Tip;
use crate::prompt::AdviceFlavor;

#[derive(Debug, Clone, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Environmental readings the client already has (e.g. from a recent weather
/// fetch on-device). When present, these take precedence over a server-side
/// weather lookup for the cache context.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentOverride {
    pub humidity: f64,
    pub pressure_trend: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdviceRequest {
    pub user_id: String,
    /// Energy/charge percentage, 0-100.
    pub energy_level: f64,
    #[serde(default)]
    pub energy_trend: EnergyTrend,
    /// Coarse bucket like "morning"; derived from the server clock when absent.
    pub time_of_day: Option<String>,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    pub location: Option<Coordinates>,
    pub environment: Option<EnvironmentOverride>,
    #[serde(default)]
    pub flavor: AdviceFlavor,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdviceReply {
    /// The LLM's structured advice payload.
    pub advice: serde_json::Value,
    /// Deterministic weather/environment tips, independent of the LLM.
    pub tips: Vec<Tip>,
    pub source: AdviceSource,
    pub estimated_cost: f64,
    pub generated_at: DateTime<Utc>,
}
