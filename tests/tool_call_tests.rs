//! Integration tests for `tools/call` through the HTTP endpoint
//!
//! Open-Meteo is replaced by a wiremock server; the local city tool runs on a
//! small in-memory dataset.

mod common;

use async_trait::async_trait;
use axum::http::StatusCode;
use rmcp::model::Content;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{gateway, gateway_with};
use weather_mcp_gateway::error::ToolError;
use weather_mcp_gateway::tools::{
    FieldSpec, InputSchema, ToolDescriptor, ToolHandler, ToolRegistry, ValidatedArgs,
};

const NO_UPSTREAM: &str = "http://127.0.0.1:9";

fn forecast_body() -> Value {
    json!({
        "latitude": 48.86,
        "longitude": 2.34,
        "current_weather_units": {"temperature": "°C", "windspeed": "km/h"},
        "current_weather": {
            "time": "2024-05-01T12:00",
            "temperature": 17.3,
            "windspeed": 11.2,
            "winddirection": 240.0,
            "weathercode": 2,
            "is_day": 1
        }
    })
}

#[tokio::test]
async fn test_get_weather() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("latitude", "48.8566"))
        .and(query_param("longitude", "2.3522"))
        .and(query_param("current_weather", "true"))
        .and(query_param("timezone", "auto"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
        .expect(1)
        .mount(&upstream)
        .await;

    let gw = gateway(&upstream.uri());
    let session = gw.initialize().await;

    let response = gw
        .call_tool(
            &session,
            "get_weather",
            json!({"latitude": 48.8566, "longitude": 2.3522, "location_name": "Paris"}),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["result"]["isError"], false);
    let report = response.tool_json();
    assert_eq!(report["location"], "Paris");
    assert_eq!(report["weather"]["current_weather"]["temperature"], 17.3);
    assert_eq!(report["weather"]["current_weather_units"]["temperature"], "°C");
    assert!(report["lastUpdate"].is_string());
}

#[tokio::test]
async fn test_get_weather_defaults_location_to_coordinates() {
    let upstream = MockServer::start().await;
    Mock::given(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
        .mount(&upstream)
        .await;

    let gw = gateway(&upstream.uri());
    let session = gw.initialize().await;

    let response = gw
        .call_tool(&session, "get_weather", json!({"latitude": 45.5, "longitude": -73.5}))
        .await;

    assert_eq!(response.tool_json()["location"], "45.5, -73.5");
}

#[tokio::test]
async fn test_upstream_failure_is_tool_error() {
    let upstream = MockServer::start().await;
    Mock::given(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;

    let gw = gateway(&upstream.uri());
    let session = gw.initialize().await;

    let response = gw
        .call_tool(&session, "get_weather", json!({"latitude": 10, "longitude": 10}))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.get("error").is_none());
    assert_eq!(response.body["result"]["isError"], true);
    let text = response.body["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Error fetching weather data:"), "{}", text);
}

#[tokio::test]
async fn test_malformed_upstream_body_is_tool_error() {
    let upstream = MockServer::start().await;
    Mock::given(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&upstream)
        .await;

    let gw = gateway(&upstream.uri());
    let session = gw.initialize().await;

    let response = gw
        .call_tool(&session, "get_weather", json!({"latitude": 0, "longitude": 0}))
        .await;

    assert_eq!(response.body["result"]["isError"], true);
}

#[tokio::test]
async fn test_out_of_range_coordinates_reach_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(path("/v1/forecast"))
        .and(query_param("latitude", "91"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": true,
            "reason": "Latitude must be in range of -90 to 90°. Given: 91.0."
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let gw = gateway(&upstream.uri());
    let session = gw.initialize().await;

    let response = gw
        .call_tool(&session, "get_weather", json!({"latitude": 91, "longitude": 0}))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.get("error").is_none());
    assert_eq!(response.body["result"]["isError"], true);
    assert!(response
        .tool_text()
        .starts_with("Error fetching weather data:"));
}

#[tokio::test]
async fn test_search_location() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("name", "Lyon"))
        .and(query_param("count", "5"))
        .and(query_param("language", "fr"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "name": "Lyon",
                "country": "France",
                "admin1": "Auvergne-Rhône-Alpes",
                "latitude": 45.748,
                "longitude": 4.847,
                "timezone": "Europe/Paris",
                "population": 522250,
                "elevation": 173.0
            }]
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let gw = gateway(&upstream.uri());
    let session = gw.initialize().await;

    let response = gw
        .call_tool(&session, "search_location", json!({"city_name": "Lyon"}))
        .await;

    assert_eq!(response.body["result"]["isError"], false);
    let report = response.tool_json();
    assert_eq!(report["query"], "Lyon");
    assert_eq!(report["country_filter"], Value::Null);
    assert_eq!(report["total_results"], 1);
    assert_eq!(report["locations"][0]["timezone"], "Europe/Paris");
}

#[tokio::test]
async fn test_search_location_no_results() {
    let upstream = MockServer::start().await;
    Mock::given(path("/v1/search"))
        .and(query_param("country", "Belgique"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"generationtime_ms": 0.5})))
        .mount(&upstream)
        .await;

    let gw = gateway(&upstream.uri());
    let session = gw.initialize().await;

    let response = gw
        .call_tool(
            &session,
            "search_location",
            json!({"city_name": "Atlantis", "country": "Belgique"}),
        )
        .await;

    assert_eq!(response.body["result"]["isError"], true);
    assert_eq!(
        response.body["result"]["content"][0]["text"],
        "No location found for \"Atlantis\" in Belgique"
    );
}

#[tokio::test]
async fn test_limit_out_of_bounds_rejected() {
    let gw = gateway(NO_UPSTREAM);
    let session = gw.initialize().await;

    for limit in [0, 11] {
        let response = gw
            .call_tool(
                &session,
                "search_location",
                json!({"city_name": "Paris", "limit": limit}),
            )
            .await;
        assert_eq!(response.body["error"]["code"], -32602, "limit {}", limit);
    }

    let response = gw
        .call_tool(
            &session,
            "search_local_cities",
            json!({"city_name": "Paris", "limit": 51}),
        )
        .await;
    assert_eq!(response.body["error"]["code"], -32602);
}

#[tokio::test]
async fn test_local_cities_exact_and_partial() {
    let gw = gateway(NO_UPSTREAM);
    let session = gw.initialize().await;

    let exact = gw
        .call_tool(
            &session,
            "search_local_cities",
            json!({"city_name": "Paris", "exact_match": true}),
        )
        .await
        .tool_json();
    let partial = gw
        .call_tool(&session, "search_local_cities", json!({"city_name": "Par"}))
        .await
        .tool_json();

    let exact_cities = exact["cities"].as_array().unwrap();
    assert_eq!(exact_cities.len(), 2);
    for city in exact_cities {
        assert_eq!(city["name"].as_str().unwrap().to_lowercase(), "paris");
    }

    let partial_cities = partial["cities"].as_array().unwrap();
    assert_eq!(partial["total_matches"], 5);
    for city in partial_cities {
        assert!(city["name"].as_str().unwrap().to_lowercase().contains("par"));
    }
    for city in exact_cities {
        assert!(partial_cities.contains(city));
    }
}

#[tokio::test]
async fn test_local_cities_no_match() {
    let gw = gateway(NO_UPSTREAM);
    let session = gw.initialize().await;

    let response = gw
        .call_tool(&session, "search_local_cities", json!({"city_name": "Tokyo"}))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["result"]["isError"], true);
}

#[tokio::test]
async fn test_stream_weather_confirms() {
    let gw = gateway(NO_UPSTREAM);
    let session = gw.initialize().await;

    let response = gw
        .call_tool(
            &session,
            "stream_weather",
            json!({"latitude": 43.3, "longitude": 5.37, "location_name": "Marseille", "interval_seconds": 30}),
        )
        .await;

    assert_eq!(
        response.body["result"]["content"][0]["text"],
        "Starting weather stream for Marseille with 30s interval..."
    );
}

#[tokio::test]
async fn test_unknown_tool_is_not_found() {
    let gw = gateway(NO_UPSTREAM);
    let session = gw.initialize().await;

    let response = gw.call_tool(&session, "get_forecast", json!({})).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["error"]["code"], -32601);
    assert!(response.body.get("result").is_none());
}

#[tokio::test]
async fn test_call_before_initialize_completes_is_rejected() {
    let gw = gateway(NO_UPSTREAM);
    let (session_id, _) = gw.sessions.create();

    let response = gw
        .call_tool(&session_id, "search_local_cities", json!({"city_name": "Lyon"}))
        .await;

    assert_eq!(response.body["error"]["code"], -32002);
}

struct ExplodingTool;

#[async_trait]
impl ToolHandler for ExplodingTool {
    async fn call(&self, _args: ValidatedArgs) -> Result<Vec<Content>, ToolError> {
        panic!("handler blew up");
    }
}

#[tokio::test]
async fn test_panicking_tool_is_internal_error() {
    let registry = ToolRegistry::new(vec![ToolDescriptor::new(
        "explode",
        "Always panics",
        InputSchema::new(vec![FieldSpec::string("reason", "why").optional()]),
        Arc::new(ExplodingTool),
    )])
    .unwrap();
    let gw = gateway_with(registry);
    let session = gw.initialize().await;

    let response = gw.call_tool(&session, "explode", json!({})).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error"]["code"], -32603);
    assert_eq!(response.body["error"]["message"], "Internal server error");

    // The session itself survives the failed call.
    let response = gw
        .post(
            Some(&session),
            &json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}),
        )
        .await;
    assert_eq!(response.body["result"], json!({}));
}
