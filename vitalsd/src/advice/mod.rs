//! Rule-based advice tips layered on top of the LLM analysis.

pub mod rules;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipCategory {
    Heat,
    Cold,
    Uv,
    Precipitation,
    Wind,
    Humidity,
    Pressure,
    AirQuality,
}

/// A single threshold-derived tip. Deterministic and free, unlike the LLM
/// advice these accompany.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    pub category: TipCategory,
    pub message: String,
}

impl Tip {
    fn new(category: TipCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}
