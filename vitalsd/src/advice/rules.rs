//! Threshold rules over current conditions.
//!
//! Pure branching over the weather snapshot; thresholds follow common
//! public-health guidance bands (European AQI bands for air quality).

use super::{Tip, TipCategory};
use crate::weather::WeatherSnapshot;

const HOT_TEMPERATURE_C: f64 = 30.0;
const FREEZING_TEMPERATURE_C: f64 = 0.0;
const HIGH_UV_INDEX: f64 = 6.0;
const LIKELY_RAIN_PROBABILITY: f64 = 50.0;
const STRONG_WIND_KMH: f64 = 30.0;
const HIGH_HUMIDITY_PERCENT: f64 = 80.0;
const RAPID_PRESSURE_DROP_HPA: f64 = -3.0;

pub fn weather_tips(weather: &WeatherSnapshot) -> Vec<Tip> {
    let mut tips = Vec::new();

    if weather.temperature_c >= HOT_TEMPERATURE_C {
        tips.push(Tip::new(
            TipCategory::Heat,
            "High temperatures today - drink water regularly and avoid strenuous activity around midday.",
        ));
    } else if weather.temperature_c <= FREEZING_TEMPERATURE_C {
        tips.push(Tip::new(
            TipCategory::Cold,
            "Freezing conditions - dress in layers and warm up before exercising outdoors.",
        ));
    }

    if weather.uv_index.is_some_and(|uv| uv >= HIGH_UV_INDEX) {
        tips.push(Tip::new(
            TipCategory::Uv,
            "UV index is high - use sun protection and seek shade during peak hours.",
        ));
    }

    if weather
        .precipitation_probability
        .is_some_and(|p| p >= LIKELY_RAIN_PROBABILITY)
    {
        tips.push(Tip::new(
            TipCategory::Precipitation,
            "Rain is likely - plan indoor alternatives for outdoor activities.",
        ));
    }

    if weather.wind_speed_kmh >= STRONG_WIND_KMH {
        tips.push(Tip::new(
            TipCategory::Wind,
            "Strong winds expected - cycling and running may take more effort than usual.",
        ));
    }

    if weather.humidity >= HIGH_HUMIDITY_PERCENT {
        tips.push(Tip::new(
            TipCategory::Humidity,
            "Very humid conditions - your body cools less efficiently, so pace yourself.",
        ));
    }

    if weather.pressure_trend_hpa <= RAPID_PRESSURE_DROP_HPA {
        tips.push(Tip::new(
            TipCategory::Pressure,
            "Pressure is dropping quickly - weather-sensitive people may notice headaches or joint aches.",
        ));
    }

    tips
}

/// Tips from the European AQI bands: 0-20 good, 20-40 fair, 40-60 moderate,
/// 60-80 poor, 80-100 very poor, above 100 extremely poor.
pub fn air_quality_tips(european_aqi: f64) -> Vec<Tip> {
    let message = if european_aqi > 100.0 {
        Some("Air quality is extremely poor - stay indoors and keep windows closed.")
    } else if european_aqi > 60.0 {
        Some("Air quality is poor - limit prolonged outdoor exertion.")
    } else if european_aqi > 40.0 {
        Some("Air quality is moderate - sensitive groups should take it easy outdoors.")
    } else {
        None
    };

    message
        .map(|m| vec![Tip::new(TipCategory::AirQuality, m)])
        .unwrap_or_default()
}
