//! JSON-RPC 2.0 envelopes and the MCP payloads carried inside them
//!
//! Result and error payloads are `rmcp::model` types; only the envelope and
//! the request-side params are decoded here.

use rmcp::model::{ErrorData, Implementation, ProtocolVersion};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revisions the gateway can speak, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] =
    &["2025-06-18", "2025-03-26", "2024-11-05", "2024-10-07"];

pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_PING: &str = "ping";
pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// JSON-RPC request id - string or number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.into(),
            params: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<RequestId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Decode a request body, rejecting anything that is not a single
    /// JSON-RPC 2.0 request object.
    ///
    /// # Errors
    ///
    /// `ParseError` when the body is not JSON at all, `InvalidRequest` when it
    /// is JSON but not a request (batch array, missing `method`, wrong
    /// `jsonrpc` version).
    pub fn from_slice(body: &[u8]) -> ProtocolResult<Self> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| ProtocolError::ParseError(e.to_string()))?;
        if value.is_array() {
            return Err(ProtocolError::InvalidRequest(
                "batch requests are not supported".to_string(),
            ));
        }
        let request: Self = serde_json::from_value(value)
            .map_err(|e| ProtocolError::InvalidRequest(e.to_string()))?;
        if request.jsonrpc != JSONRPC_VERSION {
            return Err(ProtocolError::InvalidRequest(format!(
                "unsupported jsonrpc version '{}'",
                request.jsonrpc
            )));
        }
        Ok(request)
    }

    /// Notifications carry no id and expect no response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn is_initialize(&self) -> bool {
        self.method == METHOD_INITIALIZE
    }

    /// Deserialize `params` into a typed payload.
    pub fn parse_params<T: serde::de::DeserializeOwned>(&self) -> ProtocolResult<T> {
        let params = self
            .params
            .clone()
            .ok_or_else(|| ProtocolError::InvalidParams("Missing params".to_string()))?;
        serde_json::from_value(params).map_err(|e| ProtocolError::InvalidParams(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorData>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<RequestId>, error: ErrorData) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default)]
    pub client_info: Option<Implementation>,
}

impl InitializeParams {
    /// Protocol version to answer with: the client's if we support it,
    /// otherwise our latest.
    pub fn negotiated_version(&self) -> &'static str {
        SUPPORTED_PROTOCOL_VERSIONS
            .iter()
            .find(|v| **v == self.protocol_version)
            .copied()
            .unwrap_or(LATEST_PROTOCOL_VERSION)
    }

    /// The negotiated version as the model type carried in `InitializeResult`.
    pub fn protocol_version(&self) -> ProtocolResult<ProtocolVersion> {
        serde_json::from_value(Value::from(self.negotiated_version()))
            .map_err(|e| ProtocolError::Internal(format!("Bad protocol version: {}", e)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}
