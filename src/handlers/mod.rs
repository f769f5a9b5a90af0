//! Plain HTTP handlers outside the MCP endpoint

pub mod health;

pub use health::health_handler;
