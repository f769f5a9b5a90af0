use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use rmcp::model::{ErrorCode, ErrorData};
use thiserror::Error;

use crate::mcp::protocol::{JsonRpcResponse, RequestId};

/// Server-defined codes outside the standard JSON-RPC set.
pub mod codes {
    use rmcp::model::ErrorCode;

    pub const INVALID_SESSION: ErrorCode = ErrorCode(-32000);
    pub const NOT_INITIALIZED: ErrorCode = ErrorCode(-32002);
}

pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Errors raised by the gateway itself while routing or validating a call
///
/// These are reported as a JSON-RPC `error` object. Anything a tool reports
/// about its own work is a [`ToolError`] instead and travels inside a
/// successful envelope.
///
/// | Variant            | Code    | HTTP status |
/// |--------------------|---------|-------------|
/// | InvalidSession     | -32000  | 400         |
/// | ParseError         | -32700  | 400         |
/// | InvalidRequest     | -32600  | 400         |
/// | AlreadyInitialized | -32600  | 200         |
/// | NotInitialized     | -32002  | 200         |
/// | MethodNotFound     | -32601  | 200         |
/// | ToolNotFound       | -32601  | 200         |
/// | InvalidParams      | -32602  | 200         |
/// | Internal           | -32603  | 500         |
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Bad Request: No valid session ID provided")]
    InvalidSession,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Session already initialized")]
    AlreadyInitialized,

    #[error("Session not initialized")]
    NotInitialized,

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ProtocolError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidSession => codes::INVALID_SESSION,
            Self::ParseError(_) => ErrorCode::PARSE_ERROR,
            Self::InvalidRequest(_) | Self::AlreadyInitialized => ErrorCode::INVALID_REQUEST,
            Self::NotInitialized => codes::NOT_INITIALIZED,
            Self::MethodNotFound(_) | Self::ToolNotFound(_) => ErrorCode::METHOD_NOT_FOUND,
            Self::InvalidParams(_) => ErrorCode::INVALID_PARAMS,
            Self::Internal(_) => ErrorCode::INTERNAL_ERROR,
        }
    }

    /// HTTP status the adapter answers with when this error ends a request.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidSession | Self::ParseError(_) | Self::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        }
    }

    pub fn to_rpc_error(&self) -> ErrorData {
        ErrorData::new(self.code(), self.to_string(), None)
    }

    /// Build the full response for this error, keeping the request id when known.
    pub fn into_response_for(self, id: Option<RequestId>) -> Response {
        let status = self.http_status();
        let envelope = JsonRpcResponse::error(id, self.to_rpc_error());
        (status, Json(envelope)).into_response()
    }
}

impl IntoResponse for ProtocolError {
    fn into_response(self) -> Response {
        self.into_response_for(None)
    }
}

/// Domain failures reported by a tool handler
///
/// Never surfaced as a protocol error: the dispatcher wraps the message into a
/// tool result with `isError: true`.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}")]
    UpstreamStatus { service: &'static str, status: u16 },

    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    NoMatches(String),

    #[error("Invalid arguments: {0}")]
    Arguments(String),
}

impl ToolError {
    /// Prefix the message with what the tool was trying to do.
    pub fn describe(&self, action: &str) -> String {
        match self {
            Self::NoMatches(message) => message.clone(),
            other => format!("Error {}: {}", action, other),
        }
    }
}
