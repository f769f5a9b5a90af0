//! Per-session transport and its lifecycle state machine
//!
//! ```text
//! UNINITIALIZED --initialize--> ACTIVE --close--> CLOSED
//!       |                                           ^
//!       +------------------close--------------------+
//! ```
//!
//! `CLOSED` is terminal. Requests on one transport are handled strictly in
//! arrival order; closing cancels whatever request is still in flight.

use serde_json::Value;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tokio_util::sync::CancellationToken;

use crate::error::{ProtocolError, ProtocolResult};
use crate::mcp::dispatcher::Dispatcher;
use crate::mcp::protocol::{InitializeParams, JsonRpcRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Uninitialized,
    Active,
    Closed,
}

/// Invoked exactly once, with the session id, when the transport closes.
pub type CloseHook = Box<dyn Fn(&str) + Send + Sync>;

pub struct SessionTransport {
    session_id: String,
    state: Mutex<TransportState>,
    /// Held for the whole of a request so a session never reorders calls.
    turn: tokio::sync::Mutex<()>,
    closed: CancellationToken,
    on_close: CloseHook,
    protocol_version: OnceLock<&'static str>,
    dispatcher: Arc<Dispatcher>,
}

impl SessionTransport {
    pub fn new(session_id: impl Into<String>, dispatcher: Arc<Dispatcher>, on_close: CloseHook) -> Self {
        Self {
            session_id: session_id.into(),
            state: Mutex::new(TransportState::Uninitialized),
            turn: tokio::sync::Mutex::new(()),
            closed: CancellationToken::new(),
            on_close,
            protocol_version: OnceLock::new(),
            dispatcher,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> TransportState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_closed(&self) -> bool {
        self.state() == TransportState::Closed
    }

    /// Protocol version agreed during `initialize`, once active.
    pub fn protocol_version(&self) -> Option<&'static str> {
        self.protocol_version.get().copied()
    }

    /// Token cancelled when the transport closes.
    pub fn closed_signal(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Decode-and-dispatch one request on this session.
    ///
    /// Waits for any earlier request on the same session to finish first, so
    /// responses are produced in arrival order.
    ///
    /// # Arguments
    ///
    /// * `request` - A decoded JSON-RPC request addressed to this session
    ///
    /// # Returns
    ///
    /// The `result` payload; the caller owns envelope framing. A successful
    /// `initialize` moves the transport to `Active`.
    ///
    /// # Errors
    ///
    /// * `ProtocolError::InvalidSession` - the transport is already closed
    /// * `ProtocolError::NotInitialized` - anything but `initialize` before activation
    /// * `ProtocolError::AlreadyInitialized` - `initialize` on an active transport
    /// * `ProtocolError::Internal` - the transport closed while the request was in flight
    /// * any error the dispatcher returns for the request itself
    pub async fn handle(&self, request: &JsonRpcRequest) -> ProtocolResult<Value> {
        let _turn = self.turn.lock().await;

        match (self.state(), request.is_initialize()) {
            (TransportState::Closed, _) => return Err(ProtocolError::InvalidSession),
            (TransportState::Uninitialized, false) => return Err(ProtocolError::NotInitialized),
            (TransportState::Active, true) => return Err(ProtocolError::AlreadyInitialized),
            _ => {}
        }

        let outcome = tokio::select! {
            biased;
            _ = self.closed.cancelled() => {
                tracing::warn!(
                    session_id = %self.session_id,
                    method = %request.method,
                    "Session closed with request in flight"
                );
                Err(ProtocolError::Internal("session closed during request".to_string()))
            }
            outcome = self.dispatcher.dispatch(request) => outcome,
        };

        if request.is_initialize() && outcome.is_ok() {
            self.activate(request);
        }

        outcome
    }

    fn activate(&self, request: &JsonRpcRequest) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != TransportState::Uninitialized {
            return;
        }
        if let Ok(params) = request.parse_params::<InitializeParams>() {
            let _ = self.protocol_version.set(params.negotiated_version());
            tracing::info!(
                session_id = %self.session_id,
                protocol_version = params.negotiated_version(),
                client = params.client_info.as_ref().map(|c| c.name.as_str()).unwrap_or("unknown"),
                "Session initialized"
            );
        }
        *state = TransportState::Active;
    }

    /// Close the transport. Idempotent: returns `false` if it was already
    /// closed. The close hook runs before the state flips to `Closed`.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == TransportState::Closed {
            return false;
        }

        (self.on_close)(&self.session_id);
        *state = TransportState::Closed;
        drop(state);

        self.closed.cancel();
        tracing::info!(session_id = %self.session_id, "Transport closed");
        true
    }
}

impl Drop for SessionTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn transport_with_counter() -> (SessionTransport, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closes);
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(ToolRegistry::default())));
        let transport = SessionTransport::new(
            "session-1",
            dispatcher,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (transport, closes)
    }

    fn initialize() -> JsonRpcRequest {
        JsonRpcRequest::new("initialize").with_id(1).with_params(json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "test-client", "version": "1.0.0"}
        }))
    }

    #[tokio::test]
    async fn test_initialize_activates() {
        let (transport, _) = transport_with_counter();
        assert_eq!(transport.state(), TransportState::Uninitialized);

        transport.handle(&initialize()).await.unwrap();
        assert_eq!(transport.state(), TransportState::Active);
        assert_eq!(transport.protocol_version(), Some("2024-11-05"));
    }

    #[tokio::test]
    async fn test_requests_before_initialize_rejected() {
        let (transport, _) = transport_with_counter();
        let err = transport
            .handle(&JsonRpcRequest::new("tools/list").with_id(2))
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::NotInitialized);
        assert_eq!(transport.state(), TransportState::Uninitialized);
    }

    #[tokio::test]
    async fn test_reinitialize_rejected() {
        let (transport, _) = transport_with_counter();
        transport.handle(&initialize()).await.unwrap();

        let err = transport.handle(&initialize()).await.unwrap_err();
        assert_eq!(err, ProtocolError::AlreadyInitialized);
        assert_eq!(transport.state(), TransportState::Active);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (transport, closes) = transport_with_counter();
        transport.handle(&initialize()).await.unwrap();

        assert!(transport.close());
        assert!(!transport.close());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(transport.closed_signal().is_cancelled());

        let err = transport
            .handle(&JsonRpcRequest::new("ping").with_id(3))
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::InvalidSession);
    }

    #[tokio::test]
    async fn test_drop_runs_close_hook_once() {
        let (transport, closes) = transport_with_counter();
        transport.close();
        drop(transport);
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        let (transport, closes) = transport_with_counter();
        drop(transport);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
