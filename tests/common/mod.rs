//! Shared helpers for driving the gateway router in-process

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // for `oneshot`

use weather_mcp_gateway::{
    build_app,
    mcp::{http_transport::SESSION_HEADER, Dispatcher, SessionRegistry},
    services::{City, CityDataset, OpenMeteoClient},
    tools::{self, ToolRegistry},
};

pub struct TestGateway {
    pub app: Router,
    pub sessions: SessionRegistry,
}

pub struct RpcResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl RpcResponse {
    pub fn session_id(&self) -> Option<String> {
        self.headers
            .get(SESSION_HEADER)
            .map(|v| v.to_str().unwrap().to_string())
    }

    /// Text of the first content item of a tool result.
    pub fn tool_text(&self) -> &str {
        self.body["result"]["content"][0]["text"]
            .as_str()
            .expect("tool result should carry text content")
    }

    /// Parsed JSON text of the first content item of a tool result.
    pub fn tool_json(&self) -> Value {
        serde_json::from_str(self.tool_text()).expect("tool text should be JSON")
    }
}

pub fn city(name: &str, country: &str, latitude: f64, longitude: f64) -> City {
    City {
        name: name.to_string(),
        country: country.to_string(),
        admin1: None,
        latitude,
        longitude,
        population: None,
    }
}

pub fn sample_dataset() -> CityDataset {
    CityDataset::from_records(vec![
        city("Paris", "France", 48.8566, 2.3522),
        city("Paray-le-Monial", "France", 46.4508, 4.1197),
        city("Parthenay", "France", 46.6486, -0.2469),
        city("Lyon", "France", 45.764, 4.8357),
        city("PARIS", "United States", 33.6609, -95.5555),
        city("Parma", "Italy", 44.8015, 10.3279),
    ])
    .expect("sample dataset is valid")
}

/// Gateway with the built-in tools; both Open-Meteo endpoints point at `upstream`.
pub fn gateway(upstream: &str) -> TestGateway {
    let client = OpenMeteoClient::new(upstream, upstream, "fr", Duration::from_secs(5));
    let registry = tools::builtin_registry(client, Arc::new(sample_dataset()))
        .expect("built-in registry is valid");
    gateway_with(registry)
}

pub fn gateway_with(registry: ToolRegistry) -> TestGateway {
    let sessions = SessionRegistry::new(Arc::new(Dispatcher::new(Arc::new(registry))));
    TestGateway {
        app: build_app(sessions.clone()),
        sessions,
    }
}

pub fn initialize_body(id: i64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "integration-test", "version": "1.0.0"}
        }
    })
}

pub fn call_body(id: i64, tool: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": tool, "arguments": arguments}
    })
}

impl TestGateway {
    pub async fn send(&self, method: &str, session: Option<&str>, body: Body) -> RpcResponse {
        self.send_to("/mcp", method, session, body).await
    }

    pub async fn get(&self, uri: &str) -> RpcResponse {
        self.send_to(uri, "GET", None, Body::empty()).await
    }

    async fn send_to(
        &self,
        uri: &str,
        method: &str,
        session: Option<&str>,
        body: Body,
    ) -> RpcResponse {
        let response = self.raw(uri, method, session, body).await;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Failed to parse JSON")
        };

        RpcResponse {
            status,
            headers,
            body,
        }
    }

    async fn raw(&self, uri: &str, method: &str, session: Option<&str>, body: Body) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(session) = session {
            builder = builder.header("Mcp-Session-Id", session);
        }

        self.app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .expect("Failed to execute request")
    }

    /// Open the session's event stream without reading the body.
    pub async fn open_stream(&self, session: &str) -> Response {
        self.raw("/mcp", "GET", Some(session), Body::empty()).await
    }

    pub async fn post(&self, session: Option<&str>, body: &Value) -> RpcResponse {
        self.send("POST", session, Body::from(body.to_string())).await
    }

    /// Run `initialize` and return the minted session id.
    pub async fn initialize(&self) -> String {
        let response = self.post(None, &initialize_body(1)).await;
        assert_eq!(response.status, StatusCode::OK);
        response.session_id().expect("initialize should mint a session")
    }

    pub async fn call_tool(&self, session: &str, tool: &str, arguments: Value) -> RpcResponse {
        self.post(Some(session), &call_body(2, tool, arguments)).await
    }
}
