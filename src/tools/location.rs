//! `search_location`: geocode a place name through Open-Meteo

use async_trait::async_trait;
use rmcp::model::Content;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::ToolError;
use crate::services::OpenMeteoClient;
use crate::tools::registry::{ToolDescriptor, ToolHandler};
use crate::tools::schema::{FieldSpec, InputSchema, ValidatedArgs};

pub const SEARCH_LOCATION: &str = "search_location";

#[derive(Debug, Deserialize)]
struct SearchLocationArgs {
    city_name: String,
    country: Option<String>,
    limit: u32,
}

pub struct SearchLocationTool {
    client: OpenMeteoClient,
}

impl SearchLocationTool {
    pub fn descriptor(client: OpenMeteoClient) -> ToolDescriptor {
        ToolDescriptor::new(
            SEARCH_LOCATION,
            "Search for GPS coordinates of a city or location by name",
            InputSchema::new(vec![
                FieldSpec::string("city_name", "Name of the city or location to search for"),
                FieldSpec::string("country", "Optional country name to narrow the search")
                    .optional(),
                FieldSpec::integer(
                    "limit",
                    "Maximum number of results to return (default: 5)",
                )
                .range(1.0, 10.0)
                .default_value(json!(5)),
            ]),
            Arc::new(Self { client }),
        )
    }
}

#[async_trait]
impl ToolHandler for SearchLocationTool {
    async fn call(&self, args: ValidatedArgs) -> Result<Vec<Content>, ToolError> {
        let args: SearchLocationArgs = args.parse()?;
        let country = args.country.as_deref().filter(|c| !c.is_empty());

        let locations = self
            .client
            .search_locations(&args.city_name, country, args.limit)
            .await?;

        if locations.is_empty() {
            let scope = country
                .map(|c| format!(" in {}", c))
                .unwrap_or_default();
            return Err(ToolError::NoMatches(format!(
                "No location found for \"{}\"{}",
                args.city_name, scope
            )));
        }

        let report = json!({
            "query": args.city_name,
            "country_filter": country,
            "total_results": locations.len(),
            "locations": locations,
        });
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| ToolError::MalformedResponse(e.to_string()))?;
        Ok(vec![Content::text(text)])
    }

    fn action(&self) -> &'static str {
        "searching for location"
    }
}
