//! Request context types and cache key derivation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Direction the user's energy level is moving in.
///
/// Informational only: it is carried alongside the request so the analysis
/// backend can see it, but it does not participate in similarity scoring or
/// key derivation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyTrend {
    Rising,
    Falling,
    #[default]
    Stable,
}

/// The context an analysis was requested under.
///
/// Two requests are cached together when their contexts collide under
/// [`AnalysisRequest::cache_key`] or score highly under
/// [`crate::similarity::similarity`]. Focus tags live in a `BTreeSet` so
/// iteration order is sorted regardless of the order the caller supplied them
/// in, which keeps key derivation and tag overlap deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Energy/charge percentage, 0-100.
    pub energy_level: f64,
    pub energy_trend: EnergyTrend,
    /// Coarse time bucket, e.g. "morning".
    pub time_of_day: String,
    /// User-selected focus areas.
    pub focus_tags: BTreeSet<String>,
    /// Relative humidity, percent.
    pub humidity: f64,
    /// Signed surface pressure delta, hPa.
    pub pressure_trend: f64,
}

impl AnalysisRequest {
    /// Derive the bucketed cache key for this context.
    ///
    /// Continuous values are coarsened into fixed-width buckets so requests
    /// that differ only within a bucket collide to the same key: energy into
    /// 10-point buckets keeping the bucket floor (42 -> 40), humidity into
    /// 10-point buckets keeping the bucket index (63 -> 6), and the pressure
    /// trend floored to a whole hPa. Tags are joined sorted, comma-separated.
    pub fn cache_key(&self) -> String {
        let energy_bucket = (self.energy_level / 10.0).floor() as i64 * 10;
        let tags: Vec<&str> = self.focus_tags.iter().map(String::as_str).collect();
        let humidity_bucket = (self.humidity / 10.0).floor() as i64;
        let pressure_bucket = self.pressure_trend.floor() as i64;
        format!(
            "{energy_bucket}_{}_{}_{humidity_bucket}_{pressure_bucket}",
            self.time_of_day,
            tags.join(",")
        )
    }
}

/// An analysis result as produced by the fresh-computation callback.
///
/// The payload is opaque to the cache: it is stored, cloned, and returned but
/// never inspected. Only `generated_at` is touched, via
/// [`AnalysisResponse::with_refreshed_timestamp`], when a cached result is
/// served as if freshly produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub advice: serde_json::Value,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisResponse {
    pub fn new(advice: serde_json::Value) -> Self {
        Self {
            advice,
            generated_at: Utc::now(),
        }
    }

    /// Shallow copy with the generation timestamp set to now.
    ///
    /// Used when serving a cache hit: the payload is reused unchanged but the
    /// result presents as current.
    #[must_use]
    pub fn with_refreshed_timestamp(&self) -> Self {
        Self {
            advice: self.advice.clone(),
            generated_at: Utc::now(),
        }
    }
}
