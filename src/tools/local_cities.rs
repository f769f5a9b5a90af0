//! `search_local_cities`: lookups against the preloaded city dataset

use async_trait::async_trait;
use rmcp::model::Content;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::ToolError;
use crate::services::CityDataset;
use crate::tools::registry::{ToolDescriptor, ToolHandler};
use crate::tools::schema::{FieldSpec, InputSchema, ValidatedArgs};

pub const SEARCH_LOCAL_CITIES: &str = "search_local_cities";

#[derive(Debug, Deserialize)]
struct SearchLocalCitiesArgs {
    city_name: String,
    exact_match: bool,
    limit: usize,
}

pub struct SearchLocalCitiesTool {
    dataset: Arc<CityDataset>,
}

impl SearchLocalCitiesTool {
    pub fn descriptor(dataset: Arc<CityDataset>) -> ToolDescriptor {
        ToolDescriptor::new(
            SEARCH_LOCAL_CITIES,
            "Search cities in the local dataset by name (case-insensitive)",
            InputSchema::new(vec![
                FieldSpec::string("city_name", "Name (or part of the name) of the city"),
                FieldSpec::boolean(
                    "exact_match",
                    "Only return cities whose name equals city_name (default: false)",
                )
                .default_value(json!(false)),
                FieldSpec::integer(
                    "limit",
                    "Maximum number of results to return (default: 10)",
                )
                .range(1.0, 50.0)
                .default_value(json!(10)),
            ]),
            Arc::new(Self { dataset }),
        )
    }
}

#[async_trait]
impl ToolHandler for SearchLocalCitiesTool {
    async fn call(&self, args: ValidatedArgs) -> Result<Vec<Content>, ToolError> {
        let args: SearchLocalCitiesArgs = args.parse()?;
        let matches = self.dataset.search(&args.city_name, args.exact_match);

        if matches.is_empty() {
            return Err(ToolError::NoMatches(format!(
                "No city found matching \"{}\" in the local dataset",
                args.city_name
            )));
        }

        let total_matches = matches.len();
        let cities: Vec<_> = matches.into_iter().take(args.limit).collect();
        let report = json!({
            "query": args.city_name,
            "exact_match": args.exact_match,
            "total_matches": total_matches,
            "returned": cities.len(),
            "cities": cities,
        });
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| ToolError::MalformedResponse(e.to_string()))?;
        Ok(vec![Content::text(text)])
    }

    fn action(&self) -> &'static str {
        "searching local cities"
    }
}
