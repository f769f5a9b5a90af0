//! Tool table and the built-in weather tools
//!
//! - [`schema`] - typed argument declarations, validation and defaults
//! - [`registry`] - the read-only [`ToolRegistry`] and the [`ToolHandler`] seam
//! - [`weather`], [`location`], [`local_cities`] - built-in handlers

pub mod local_cities;
pub mod location;
pub mod registry;
pub mod schema;
pub mod weather;

use std::sync::Arc;

pub use registry::{RegistryError, ToolDescriptor, ToolHandler, ToolRegistry};
pub use schema::{FieldSpec, FieldType, InputSchema, SchemaError, ValidatedArgs, ValidationError};

use crate::services::{CityDataset, OpenMeteoClient};

/// Build the gateway's fixed tool table.
pub fn builtin_registry(
    client: OpenMeteoClient,
    dataset: Arc<CityDataset>,
) -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::new(vec![
        weather::GetWeatherTool::descriptor(client.clone()),
        weather::StreamWeatherTool::descriptor(),
        location::SearchLocationTool::descriptor(client),
        local_cities::SearchLocalCitiesTool::descriptor(dataset),
    ])
}

/// Text of the first content block a handler returned.
#[cfg(test)]
pub(crate) fn first_text(content: &[rmcp::model::Content]) -> &str {
    match content.first().map(|c| &c.raw) {
        Some(rmcp::model::RawContent::Text(text)) => &text.text,
        _ => panic!("Expected text content"),
    }
}
