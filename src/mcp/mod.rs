//! MCP over streamable HTTP
//!
//! # Architecture
//!
//! - [`protocol`] - JSON-RPC envelopes and request decoding; payloads come from `rmcp::model`
//! - [`Dispatcher`] - method routing and the tool-call pipeline, shared by all sessions
//! - [`SessionTransport`] - per-session lifecycle state machine
//! - [`SessionRegistry`] - thread-safe map from session token to [`Session`]
//! - [`http_transport`] - the axum handler bound to `/mcp`
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use weather_mcp_gateway::mcp::{Dispatcher, SessionRegistry};
//! use weather_mcp_gateway::tools::ToolRegistry;
//!
//! let dispatcher = Arc::new(Dispatcher::new(Arc::new(ToolRegistry::default())));
//! let sessions = SessionRegistry::new(dispatcher);
//! let app = weather_mcp_gateway::build_app(sessions.clone());
//! # let _ = app;
//! ```

pub mod dispatcher;
pub mod http_transport;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use dispatcher::Dispatcher;
pub use registry::{Session, SessionRegistry};
pub use transport::{SessionTransport, TransportState};
