//! Open-Meteo weather and air-quality lookups.
//!
//! The advice pipeline only consumes a handful of fields, flattened into
//! [`WeatherSnapshot`]. The pressure trend is derived client-side from the
//! hourly surface-pressure series: current reading minus the reading three
//! hours earlier. Air quality is fetched best-effort; a failed AQI lookup
//! leaves the snapshot usable.

use anyhow::{Context, anyhow};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::WeatherConfig;

/// Hours between the two pressure readings used for the trend.
const PRESSURE_TREND_WINDOW_HOURS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature_c: f64,
    /// Relative humidity, percent.
    pub humidity: f64,
    pub wind_speed_kmh: f64,
    pub uv_index: Option<f64>,
    pub precipitation_probability: Option<f64>,
    /// Signed surface pressure delta over the trend window, hPa.
    pub pressure_trend_hpa: f64,
    pub european_aqi: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentWeather,
    hourly: HourlyPressure,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    time: String,
    temperature_2m: f64,
    relative_humidity_2m: f64,
    surface_pressure: f64,
    wind_speed_10m: f64,
    uv_index: Option<f64>,
    precipitation_probability: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HourlyPressure {
    time: Vec<String>,
    surface_pressure: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct AirQualityResponse {
    current: AirQualityCurrent,
}

#[derive(Debug, Deserialize)]
struct AirQualityCurrent {
    european_aqi: Option<f64>,
}

#[derive(Clone)]
pub struct WeatherClient {
    client: reqwest::Client,
    forecast_url: Url,
    air_quality_url: Url,
}

impl WeatherClient {
    pub fn new(config: &WeatherConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            forecast_url: config.forecast_url.clone(),
            air_quality_url: config.air_quality_url.clone(),
        }
    }

    /// Fetch current conditions for a coordinate.
    ///
    /// The forecast lookup is required; the AQI lookup failing only logs.
    pub async fn lookup(&self, latitude: f64, longitude: f64) -> anyhow::Result<WeatherSnapshot> {
        let forecast = self.fetch_forecast(latitude, longitude).await?;
        let pressure_trend_hpa = pressure_trend(&forecast);

        let european_aqi = match self.fetch_european_aqi(latitude, longitude).await {
            Ok(aqi) => aqi,
            Err(e) => {
                tracing::warn!(error = %e, "air quality lookup failed");
                None
            }
        };

        Ok(WeatherSnapshot {
            temperature_c: forecast.current.temperature_2m,
            humidity: forecast.current.relative_humidity_2m,
            wind_speed_kmh: forecast.current.wind_speed_10m,
            uv_index: forecast.current.uv_index,
            precipitation_probability: forecast.current.precipitation_probability,
            pressure_trend_hpa,
            european_aqi,
        })
    }

    async fn fetch_forecast(&self, latitude: f64, longitude: f64) -> anyhow::Result<ForecastResponse> {
        let url = self
            .forecast_url
            .join("/v1/forecast")
            .context("building forecast URL")?;

        let response = self
            .client
            .get(url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,surface_pressure,wind_speed_10m,uv_index,precipitation_probability"
                        .to_string(),
                ),
                ("hourly", "surface_pressure".to_string()),
                ("forecast_days", "1".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .context("requesting forecast")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("forecast API returned {status}"));
        }

        response.json().await.context("decoding forecast response")
    }

    async fn fetch_european_aqi(&self, latitude: f64, longitude: f64) -> anyhow::Result<Option<f64>> {
        let url = self
            .air_quality_url
            .join("/v1/air-quality")
            .context("building air quality URL")?;

        let response = self
            .client
            .get(url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current", "european_aqi".to_string()),
            ])
            .send()
            .await
            .context("requesting air quality")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("air quality API returned {status}"));
        }

        let envelope: AirQualityResponse = response.json().await.context("decoding air quality response")?;
        Ok(envelope.current.european_aqi)
    }
}

/// Current surface pressure minus the hourly reading from the trend window
/// ago. Falls back to 0 when the hourly series is too short or the current
/// timestamp does not match a series slot.
fn pressure_trend(forecast: &ForecastResponse) -> f64 {
    let hourly = &forecast.hourly;
    if hourly.time.len() != hourly.surface_pressure.len() {
        return 0.0;
    }

    let current_hour = parse_hour(&forecast.current.time).unwrap_or_else(|| Utc::now().naive_utc());
    let index = hourly
        .time
        .iter()
        .position(|t| parse_hour(t).is_some_and(|parsed| parsed >= current_hour));

    match index {
        Some(i) if i >= PRESSURE_TREND_WINDOW_HOURS => {
            forecast.current.surface_pressure - hourly.surface_pressure[i - PRESSURE_TREND_WINDOW_HOURS]
        }
        _ => 0.0,
    }
}

/// Open-Meteo timestamps are ISO 8601 without an offset, e.g. "2026-08-28T14:00".
fn parse_hour(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(forecast: &MockServer, air_quality: &MockServer) -> WeatherClient {
        WeatherClient::new(&WeatherConfig {
            forecast_url: Url::parse(&forecast.uri()).unwrap(),
            air_quality_url: Url::parse(&air_quality.uri()).unwrap(),
        })
    }

    fn forecast_body() -> serde_json::Value {
        json!({
            "current": {
                "time": "2026-08-28T06:00",
                "temperature_2m": 21.5,
                "relative_humidity_2m": 63.0,
                "surface_pressure": 1009.0,
                "wind_speed_10m": 12.0,
                "uv_index": 4.0,
                "precipitation_probability": 20.0
            },
            "hourly": {
                "time": [
                    "2026-08-28T00:00", "2026-08-28T01:00", "2026-08-28T02:00",
                    "2026-08-28T03:00", "2026-08-28T04:00", "2026-08-28T05:00",
                    "2026-08-28T06:00"
                ],
                "surface_pressure": [1014.0, 1013.5, 1013.0, 1012.5, 1012.0, 1010.0, 1009.0]
            }
        })
    }

    #[tokio::test]
    async fn snapshot_includes_pressure_trend_and_aqi() {
        let forecast = MockServer::start().await;
        let air_quality = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
            .mount(&forecast)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/air-quality"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "current": { "european_aqi": 35.0 }
            })))
            .mount(&air_quality)
            .await;

        let snapshot = client_for(&forecast, &air_quality).lookup(51.5, -0.1).await.unwrap();
        assert_eq!(snapshot.temperature_c, 21.5);
        // Current 1009.0 minus the reading three hours earlier (1012.5).
        assert!((snapshot.pressure_trend_hpa - (-3.5)).abs() < 1e-9);
        assert_eq!(snapshot.european_aqi, Some(35.0));
    }

    #[tokio::test]
    async fn aqi_failure_degrades_to_none() {
        let forecast = MockServer::start().await;
        let air_quality = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
            .mount(&forecast)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/air-quality"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&air_quality)
            .await;

        let snapshot = client_for(&forecast, &air_quality).lookup(51.5, -0.1).await.unwrap();
        assert_eq!(snapshot.european_aqi, None);
    }

    #[tokio::test]
    async fn forecast_failure_is_an_error() {
        let forecast = MockServer::start().await;
        let air_quality = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&forecast)
            .await;

        assert!(client_for(&forecast, &air_quality).lookup(51.5, -0.1).await.is_err());
    }
}
