//! Method routing and the tool-call pipeline
//!
//! The dispatcher is stateless with respect to sessions: lifecycle checks
//! happen in the transport before a request gets here.
//!
//! # Supported Methods
//!
//! * `initialize` - server info, capabilities and the negotiated version
//! * `notifications/*` - accepted and ignored
//! * `ping` - empty result
//! * `tools/list` - every registered tool with its input schema
//! * `tools/call` - resolve, validate, invoke
//!
//! A `tools/call` ends in exactly one of three ways: a protocol error
//! (unknown tool, invalid arguments), a tool result with `isError: true`
//! (the handler reported a domain failure), or a successful tool result.

use rmcp::model::{
    CallToolResult, Content, Implementation, InitializeResult, ListToolsResult, ServerCapabilities,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

use crate::error::{ProtocolError, ProtocolResult};
use crate::mcp::protocol::{
    CallToolParams, InitializeParams, JsonRpcRequest, METHOD_INITIALIZE, METHOD_PING,
    METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
};
use crate::tools::ToolRegistry;

pub const SERVER_NAME: &str = "weather-mcp-server";

pub struct Dispatcher {
    tools: Arc<ToolRegistry>,
    server_info: Implementation,
}

impl Dispatcher {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                website_url: None,
                icons: None,
            },
        }
    }

    /// Route one request and produce its `result` payload.
    #[instrument(skip(self, request), fields(method = %request.method))]
    pub async fn dispatch(&self, request: &JsonRpcRequest) -> ProtocolResult<Value> {
        match request.method.as_str() {
            METHOD_INITIALIZE => {
                let params: InitializeParams = request.parse_params()?;
                to_value(&self.initialize(&params)?)
            }
            method if method.starts_with("notifications/") => {
                tracing::debug!(method, "Notification received");
                Ok(Value::Null)
            }
            METHOD_PING => Ok(json!({})),
            METHOD_TOOLS_LIST => to_value(&ListToolsResult::with_all_items(self.tools.list())),
            METHOD_TOOLS_CALL => {
                let params: CallToolParams = request.parse_params()?;
                to_value(&self.call_tool(params).await?)
            }
            other => Err(ProtocolError::MethodNotFound(other.to_string())),
        }
    }

    fn initialize(&self, params: &InitializeParams) -> ProtocolResult<InitializeResult> {
        Ok(InitializeResult {
            protocol_version: params.protocol_version()?,
            capabilities: ServerCapabilities::builder()
                .enable_logging()
                .enable_tools()
                .build(),
            server_info: self.server_info.clone(),
            instructions: None,
        })
    }

    /// Resolve, validate, invoke.
    ///
    /// # Arguments
    ///
    /// * `params` - Tool name and raw arguments from the `tools/call` request
    ///
    /// # Returns
    ///
    /// A `CallToolResult` that is either a success carrying the handler's
    /// content, or `isError: true` with the handler's failure described as text.
    ///
    /// # Errors
    ///
    /// * `ProtocolError::ToolNotFound` - no tool is registered under that name
    /// * `ProtocolError::InvalidParams` - the arguments fail the tool's schema;
    ///   the handler is not invoked
    pub async fn call_tool(&self, params: CallToolParams) -> ProtocolResult<CallToolResult> {
        let tool = self
            .tools
            .get(&params.name)
            .ok_or_else(|| ProtocolError::ToolNotFound(params.name.clone()))?;

        let args = tool
            .schema
            .validate(params.arguments.as_ref())
            .map_err(|e| {
                ProtocolError::InvalidParams(format!("Invalid arguments for tool {}: {}", tool.name, e))
            })?;

        tracing::debug!(tool = tool.name, "Calling tool");
        match tool.handler.call(args).await {
            Ok(content) => Ok(CallToolResult::success(content)),
            Err(err) => {
                tracing::warn!(tool = tool.name, error = %err, "Tool reported failure");
                Ok(CallToolResult::error(vec![Content::text(
                    err.describe(tool.handler.action()),
                )]))
            }
        }
    }
}

fn to_value<T: Serialize>(payload: &T) -> ProtocolResult<Value> {
    serde_json::to_value(payload)
        .map_err(|e| ProtocolError::Internal(format!("Failed to serialize result: {}", e)))
}
