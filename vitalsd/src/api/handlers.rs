//! HTTP request handlers.

use axum::{Json, extract::State};
use chrono::{Local, Timelike};
use recall::{AnalysisRequest, AnalysisResponse, DailyCostReport};
use serde_json::{Value, json};

use crate::AppState;
use crate::advice::rules::{air_quality_tips, weather_tips};
use crate::api::models::{AdviceReply, AdviceRequest};
use crate::errors::Error;
use crate::prompt::build_prompt;
use crate::providers::ProviderError;
use crate::weather::WeatherSnapshot;

/// Humidity/pressure assumed when neither the client nor the weather lookup
/// supplies readings.
const NEUTRAL_HUMIDITY: f64 = 50.0;
const NEUTRAL_PRESSURE_TREND: f64 = 0.0;

// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// GET /v1/costs/daily - today's spend aggregate
pub async fn daily_costs(State(state): State<AppState>) -> Json<DailyCostReport> {
    Json(state.cache.daily_report())
}

// POST /v1/advice - cached or fresh LLM advice plus rule-based tips
pub async fn daily_advice(
    State(state): State<AppState>,
    Json(request): Json<AdviceRequest>,
) -> Result<Json<AdviceReply>, Error> {
    validate(&request)?;

    let weather = match &request.location {
        Some(coords) => match state.weather.lookup(coords.latitude, coords.longitude).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(error = %e, "weather lookup failed; continuing without enrichment");
                None
            }
        },
        None => None,
    };

    let analysis_request = to_analysis_request(&request, weather.as_ref());
    let prompt = build_prompt(request.flavor, &analysis_request, weather.as_ref());

    let provider = state.provider.clone();
    let outcome = state
        .cache
        .get_analysis(&request.user_id, &analysis_request, move || async move {
            let advice = provider.complete(&prompt).await?;
            Ok::<_, ProviderError>(AnalysisResponse::new(advice))
        })
        .await?;

    let mut tips = weather.as_ref().map(weather_tips).unwrap_or_default();
    if let Some(aqi) = weather.as_ref().and_then(|w| w.european_aqi) {
        tips.extend(air_quality_tips(aqi));
    }

    tracing::info!(
        user_id = %request.user_id,
        source = ?outcome.source,
        cost = outcome.cost,
        "served advice"
    );

    Ok(Json(AdviceReply {
        advice: outcome.analysis.advice,
        tips,
        source: outcome.source,
        estimated_cost: outcome.cost,
        generated_at: outcome.analysis.generated_at,
    }))
}

fn validate(request: &AdviceRequest) -> Result<(), Error> {
    if request.user_id.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "user_id must not be empty".to_string(),
        });
    }
    if !(0.0..=100.0).contains(&request.energy_level) {
        return Err(Error::BadRequest {
            message: "energy_level must be between 0 and 100".to_string(),
        });
    }
    Ok(())
}

/// Assemble the cache context: client-supplied environment readings win over
/// the weather lookup, and both fall back to neutral values.
fn to_analysis_request(request: &AdviceRequest, weather: Option<&WeatherSnapshot>) -> AnalysisRequest {
    let (humidity, pressure_trend) = match (&request.environment, weather) {
        (Some(env), _) => (env.humidity, env.pressure_trend),
        (None, Some(w)) => (w.humidity, w.pressure_trend_hpa),
        (None, None) => (NEUTRAL_HUMIDITY, NEUTRAL_PRESSURE_TREND),
    };

    AnalysisRequest {
        energy_level: request.energy_level,
        energy_trend: request.energy_trend,
        time_of_day: request
            .time_of_day
            .clone()
            .unwrap_or_else(|| current_time_bucket().to_string()),
        focus_tags: request.focus_areas.iter().cloned().collect(),
        humidity,
        pressure_trend,
    }
}

fn current_time_bucket() -> &'static str {
    match Local::now().hour() {
        5..=11 => "morning",
        12..=16 => "afternoon",
        17..=21 => "evening",
        _ => "night",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::EnvironmentOverride;

    fn request() -> AdviceRequest {
        AdviceRequest {
            user_id: "u1".to_string(),
            energy_level: 60.0,
            energy_trend: recall::EnergyTrend::Stable,
            time_of_day: Some("morning".to_string()),
            focus_areas: vec!["sleep".to_string(), "hydration".to_string()],
            location: None,
            environment: None,
            flavor: crate::prompt::AdviceFlavor::Daily,
        }
    }

    #[test]
    fn environment_override_beats_weather() {
        let mut req = request();
        req.environment = Some(EnvironmentOverride {
            humidity: 72.0,
            pressure_trend: -4.0,
        });
        let weather = WeatherSnapshot {
            temperature_c: 20.0,
            humidity: 55.0,
            wind_speed_kmh: 5.0,
            uv_index: None,
            precipitation_probability: None,
            pressure_trend_hpa: 1.0,
            european_aqi: None,
        };
        let analysis = to_analysis_request(&req, Some(&weather));
        assert_eq!(analysis.humidity, 72.0);
        assert_eq!(analysis.pressure_trend, -4.0);
    }

    #[test]
    fn missing_everything_uses_neutral_environment() {
        let analysis = to_analysis_request(&request(), None);
        assert_eq!(analysis.humidity, NEUTRAL_HUMIDITY);
        assert_eq!(analysis.pressure_trend, NEUTRAL_PRESSURE_TREND);
    }

    #[test]
    fn out_of_range_energy_is_rejected() {
        let mut req = request();
        req.energy_level = 140.0;
        assert!(validate(&req).is_err());

        req.energy_level = -1.0;
        assert!(validate(&req).is_err());

        req.energy_level = 100.0;
        assert!(validate(&req).is_ok());
    }

    #[test]
    fn blank_user_id_is_rejected() {
        let mut req = request();
        req.user_id = "  ".to_string();
        assert!(validate(&req).is_err());
    }
}
