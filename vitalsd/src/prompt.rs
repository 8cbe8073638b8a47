//! Prompt construction for the advice flavors.
//!
//! The prompt is assembled from structured sections (energy state, focus
//! areas, current conditions) and ends with a JSON-shape instruction so the
//! model's reply can be parsed by the provider layer.

use std::fmt::Write;

use recall::{AnalysisRequest, EnergyTrend};
use serde::{Deserialize, Serialize};

use crate::weather::WeatherSnapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceFlavor {
    #[default]
    Daily,
    Workout,
    Recovery,
}

impl AdviceFlavor {
    fn role_line(&self) -> &'static str {
        match self {
            AdviceFlavor::Daily => "You are a health coach producing a short daily-advice briefing.",
            AdviceFlavor::Workout => "You are a training coach advising on today's workout intensity and timing.",
            AdviceFlavor::Recovery => "You are a recovery coach advising on rest, sleep and load management.",
        }
    }
}

pub fn build_prompt(flavor: AdviceFlavor, request: &AnalysisRequest, weather: Option<&WeatherSnapshot>) -> String {
    let mut prompt = String::new();

    let _ = writeln!(prompt, "{}", flavor.role_line());
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "Energy level: {:.0}% ({})",
        request.energy_level,
        trend_label(request.energy_trend)
    );
    let _ = writeln!(prompt, "Time of day: {}", request.time_of_day);

    if request.focus_tags.is_empty() {
        let _ = writeln!(prompt, "Focus areas: none selected");
    } else {
        let tags: Vec<&str> = request.focus_tags.iter().map(String::as_str).collect();
        let _ = writeln!(prompt, "Focus areas: {}", tags.join(", "));
    }

    if let Some(weather) = weather {
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Current conditions:");
        let _ = writeln!(prompt, "- Temperature: {:.1} C", weather.temperature_c);
        let _ = writeln!(prompt, "- Humidity: {:.0}%", weather.humidity);
        let _ = writeln!(prompt, "- Wind: {:.0} km/h", weather.wind_speed_kmh);
        let _ = writeln!(prompt, "- Pressure trend (3h): {:+.1} hPa", weather.pressure_trend_hpa);
        if let Some(uv) = weather.uv_index {
            let _ = writeln!(prompt, "- UV index: {uv:.0}");
        }
        if let Some(aqi) = weather.european_aqi {
            let _ = writeln!(prompt, "- European AQI: {aqi:.0}");
        }
    }

    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "Respond with a single JSON object, no surrounding text, with keys: \
         \"summary\" (one sentence), \"recommendations\" (array of 2-4 short strings), \
         \"hydration\" (one short string), \"caution\" (one short string or null)."
    );

    prompt
}

fn trend_label(trend: EnergyTrend) -> &'static str {
    match trend {
        EnergyTrend::Rising => "rising",
        EnergyTrend::Falling => "falling",
        EnergyTrend::Stable => "stable",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            energy_level: 62.0,
            energy_trend: EnergyTrend::Falling,
            time_of_day: "afternoon".to_string(),
            focus_tags: BTreeSet::from(["hydration".to_string(), "sleep".to_string()]),
            humidity: 70.0,
            pressure_trend: -2.0,
        }
    }

    #[test]
    fn prompt_contains_context_sections() {
        let prompt = build_prompt(AdviceFlavor::Daily, &request(), None);
        assert!(prompt.contains("Energy level: 62% (falling)"));
        assert!(prompt.contains("Time of day: afternoon"));
        assert!(prompt.contains("Focus areas: hydration, sleep"));
        assert!(prompt.contains("single JSON object"));
        assert!(!prompt.contains("Current conditions"));
    }

    #[test]
    fn weather_section_appears_when_available() {
        let weather = WeatherSnapshot {
            temperature_c: 28.3,
            humidity: 70.0,
            wind_speed_kmh: 14.0,
            uv_index: Some(7.0),
            precipitation_probability: Some(30.0),
            pressure_trend_hpa: -2.0,
            european_aqi: Some(22.0),
        };
        let prompt = build_prompt(AdviceFlavor::Workout, &request(), Some(&weather));
        assert!(prompt.contains("training coach"));
        assert!(prompt.contains("Temperature: 28.3 C"));
        assert!(prompt.contains("Pressure trend (3h): -2.0 hPa"));
        assert!(prompt.contains("UV index: 7"));
    }

    #[test]
    fn flavors_change_the_role_line() {
        let daily = build_prompt(AdviceFlavor::Daily, &request(), None);
        let recovery = build_prompt(AdviceFlavor::Recovery, &request(), None);
        assert_ne!(
            daily.lines().next().unwrap(),
            recovery.lines().next().unwrap()
        );
    }
}
