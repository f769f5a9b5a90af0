//! `get_weather` and `stream_weather`

use async_trait::async_trait;
use rmcp::model::Content;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::ToolError;
use crate::services::OpenMeteoClient;
use crate::tools::registry::{ToolDescriptor, ToolHandler};
use crate::tools::schema::{FieldSpec, InputSchema, ValidatedArgs};

pub const GET_WEATHER: &str = "get_weather";
pub const STREAM_WEATHER: &str = "stream_weather";

fn coordinate_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::number("latitude", "Latitude of the location"),
        FieldSpec::number("longitude", "Longitude of the location"),
        FieldSpec::string(
            "location_name",
            "Optional name of the location for display",
        )
        .optional(),
    ]
}

fn display_name(location_name: Option<String>, latitude: f64, longitude: f64) -> String {
    location_name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("{}, {}", latitude, longitude))
}

#[derive(Debug, Deserialize)]
struct WeatherArgs {
    latitude: f64,
    longitude: f64,
    location_name: Option<String>,
}

pub struct GetWeatherTool {
    client: OpenMeteoClient,
}

impl GetWeatherTool {
    pub fn descriptor(client: OpenMeteoClient) -> ToolDescriptor {
        ToolDescriptor::new(
            GET_WEATHER,
            "Get current weather information for a location",
            InputSchema::new(coordinate_fields()),
            Arc::new(Self { client }),
        )
    }
}

#[async_trait]
impl ToolHandler for GetWeatherTool {
    async fn call(&self, args: ValidatedArgs) -> Result<Vec<Content>, ToolError> {
        let args: WeatherArgs = args.parse()?;
        let forecast = self
            .client
            .current_weather(args.latitude, args.longitude)
            .await?;

        let report = json!({
            "location": display_name(args.location_name, args.latitude, args.longitude),
            "weather": forecast,
            "lastUpdate": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| ToolError::MalformedResponse(e.to_string()))?;
        Ok(vec![Content::text(text)])
    }

    fn action(&self) -> &'static str {
        "fetching weather data"
    }
}

#[derive(Debug, Deserialize)]
struct StreamArgs {
    latitude: f64,
    longitude: f64,
    location_name: Option<String>,
    interval_seconds: f64,
}

/// Acknowledges a stream request. Periodic pushes are not performed; the
/// confirmation is the whole contract.
pub struct StreamWeatherTool;

impl StreamWeatherTool {
    pub fn descriptor() -> ToolDescriptor {
        let mut fields = coordinate_fields();
        fields.push(
            FieldSpec::number(
                "interval_seconds",
                "Update interval in seconds (default: 60)",
            )
            .default_value(json!(60)),
        );

        ToolDescriptor::new(
            STREAM_WEATHER,
            "Stream weather updates for a location with periodic updates",
            InputSchema::new(fields),
            Arc::new(Self),
        )
    }
}

#[async_trait]
impl ToolHandler for StreamWeatherTool {
    async fn call(&self, args: ValidatedArgs) -> Result<Vec<Content>, ToolError> {
        let args: StreamArgs = args.parse()?;
        let location = display_name(args.location_name, args.latitude, args.longitude);
        Ok(vec![Content::text(format!(
            "Starting weather stream for {} with {}s interval...",
            location, args.interval_seconds
        ))])
    }

    fn action(&self) -> &'static str {
        "starting weather stream"
    }
}
