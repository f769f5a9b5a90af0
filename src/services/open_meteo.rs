//! Open-Meteo HTTP client
//!
//! Thin typed wrapper over the public forecast and geocoding APIs. Response
//! bodies are decoded into the structs below; anything that does not match is
//! reported as [`ToolError::MalformedResponse`] instead of leaking an untyped
//! value into the tools.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use weather_mcp_gateway::services::OpenMeteoClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenMeteoClient::new(
//!     "https://api.open-meteo.com",
//!     "https://geocoding-api.open-meteo.com",
//!     "fr",
//!     Duration::from_secs(30),
//! );
//! let forecast = client.current_weather(48.85, 2.35).await?;
//! println!("{} degrees", forecast.current_weather.temperature);
//! # Ok(())
//! # }
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::ToolError;

pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com";
pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com";

const FORECAST_SERVICE: &str = "Open-Meteo forecast";
const GEOCODING_SERVICE: &str = "Open-Meteo geocoding";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub windspeed: f64,
    pub winddirection: f64,
    pub weathercode: i64,
    pub is_day: u8,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub current_weather: CurrentWeather,
    #[serde(
        default,
        alias = "current_units",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_weather_units: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedLocation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin1: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodedLocation>,
}

/// Shared Open-Meteo client
///
/// Cheap to clone; the underlying `reqwest::Client` pools connections and is
/// designed for concurrent use.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    forecast_url: String,
    geocoding_url: String,
    language: String,
}

impl OpenMeteoClient {
    pub fn new(
        forecast_url: impl Into<String>,
        geocoding_url: impl Into<String>,
        language: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            forecast_url: forecast_url.into().trim_end_matches('/').to_string(),
            geocoding_url: geocoding_url.into().trim_end_matches('/').to_string(),
            language: language.into(),
        }
    }

    /// Current conditions at a coordinate.
    pub async fn current_weather(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<ForecastResponse, ToolError> {
        let url = format!("{}/v1/forecast", self.forecast_url);
        let query = [
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current_weather", "true".to_string()),
            ("timezone", "auto".to_string()),
        ];

        tracing::debug!(latitude, longitude, "Fetching current weather");
        self.get_json(FORECAST_SERVICE, &url, &query).await
    }

    /// Candidate locations for a place name, at most `count` of them.
    pub async fn search_locations(
        &self,
        name: &str,
        country: Option<&str>,
        count: u32,
    ) -> Result<Vec<GeocodedLocation>, ToolError> {
        let url = format!("{}/v1/search", self.geocoding_url);
        let mut query = vec![
            ("name", name.to_string()),
            ("count", count.to_string()),
            ("language", self.language.clone()),
            ("format", "json".to_string()),
        ];
        if let Some(country) = country {
            query.push(("country", country.to_string()));
        }

        tracing::debug!(name, ?country, count, "Searching locations");
        let response: GeocodingResponse = self.get_json(GEOCODING_SERVICE, &url, &query).await?;
        Ok(response.results)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        service: &'static str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ToolError> {
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(service, status = status.as_u16(), "Upstream returned an error");
            return Err(ToolError::UpstreamStatus {
                service,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(service, error = %e, "Upstream body did not match expected shape");
            ToolError::MalformedResponse(format!("{}: {}", service, e))
        })
    }
}
