//! Streamable HTTP transport handler for MCP
//!
//! Every verb is routed to one path. The session is carried in the
//! `Mcp-Session-Id` header, which the server mints on `initialize` and the
//! client echoes on every later call.
//!
//! # Verbs
//!
//! - `POST /mcp` - JSON-RPC request, JSON-RPC response
//! - `GET /mcp` - event stream bound to the session; dropping it closes the session
//! - `DELETE /mcp` - close the session
//!
//! # Usage
//!
//! ```http
//! POST /mcp
//! Content-Type: application/json
//!
//! {"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26"}}
//! ```
//!
//! Response:
//! ```http
//! HTTP/1.1 200 OK
//! Content-Type: application/json
//! Mcp-Session-Id: 550e8400-e29b-41d4-a716-446655440000
//!
//! {"jsonrpc":"2.0","id":1,"result":{...}}
//! ```

use axum::{
    body::Bytes,
    extract::State,
    http::{header::HeaderValue, HeaderMap, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::any,
    Json, Router,
};
use futures_util::stream;
use serde_json::Value;
use std::any::Any;
use std::convert::Infallible;
use std::sync::Arc;

use crate::error::{ProtocolError, ProtocolResult};
use crate::mcp::protocol::{InitializeParams, JsonRpcRequest, JsonRpcResponse};
use crate::mcp::registry::{Session, SessionRegistry};

/// Session header; HTTP header names are case-insensitive.
pub const SESSION_HEADER: &str = "mcp-session-id";

pub const MCP_PATH: &str = "/mcp";

pub fn router(sessions: SessionRegistry) -> Router {
    Router::new()
        .route(MCP_PATH, any(handle_mcp))
        .with_state(sessions)
}

/// Any verb on `/mcp`.
pub async fn handle_mcp(
    State(sessions): State<SessionRegistry>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match method {
        Method::GET => open_event_stream(&sessions, &headers),
        Method::DELETE => close_session(&sessions, &headers),
        _ => handle_rpc(&sessions, &headers, &body).await,
    }
}

fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn known_session(sessions: &SessionRegistry, headers: &HeaderMap) -> Option<Arc<Session>> {
    session_token(headers).and_then(|token| sessions.lookup(token))
}

fn with_session_header(mut response: Response, session_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

async fn handle_rpc(sessions: &SessionRegistry, headers: &HeaderMap, body: &[u8]) -> Response {
    let request = match JsonRpcRequest::from_slice(body) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(error = %err, "Rejected malformed request body");
            return err.into_response();
        }
    };

    let (session, fresh) = match (session_token(headers), request.is_initialize()) {
        (Some(token), _) => match sessions.lookup(token) {
            Some(session) => (session, None),
            None => {
                tracing::warn!(session_id = %token, method = %request.method, "Unknown session");
                return ProtocolError::InvalidSession.into_response_for(request.id.clone());
            }
        },
        (None, true) => {
            // Nothing is created for an initialize we would refuse anyway.
            if let Err(err) = request.parse_params::<InitializeParams>() {
                return err.into_response_for(request.id.clone());
            }
            let (id, session) = sessions.create();
            (session, Some(FreshSession::new(sessions.clone(), id)))
        }
        (None, false) => {
            tracing::warn!(method = %request.method, "Request without session");
            return ProtocolError::InvalidSession.into_response_for(request.id.clone());
        }
    };

    let outcome = session.handle(&request).await;
    respond(&request, &session, fresh, outcome)
}

/// Frame the outcome of a request that reached a session.
///
/// Notifications always get 202. A session minted for this request only
/// survives if the request succeeded; otherwise it is removed and the
/// response carries no session header.
fn respond(
    request: &JsonRpcRequest,
    session: &Session,
    fresh: Option<FreshSession>,
    outcome: ProtocolResult<Value>,
) -> Response {
    let succeeded = outcome.is_ok();

    let response = if request.is_notification() {
        if let Err(err) = &outcome {
            tracing::warn!(
                session_id = %session.id(),
                method = %request.method,
                error = %err,
                "Notification failed"
            );
        }
        StatusCode::ACCEPTED.into_response()
    } else {
        match outcome {
            Ok(result) => Json(JsonRpcResponse::success(request.id.clone(), result)).into_response(),
            Err(err) => {
                if matches!(err, ProtocolError::Internal(_)) {
                    tracing::error!(session_id = %session.id(), error = ?err, "Request failed");
                }
                err.into_response_for(request.id.clone())
            }
        }
    };

    match fresh {
        Some(fresh) if succeeded => {
            fresh.keep();
            with_session_header(response, session.id())
        }
        Some(fresh) => {
            drop(fresh);
            response
        }
        None => with_session_header(response, session.id()),
    }
}

/// A session minted for an `initialize` that has not completed yet.
///
/// Dropped without [`FreshSession::keep`] (failed dispatch, or a panic caught
/// further up) it removes the session again.
struct FreshSession {
    sessions: SessionRegistry,
    session_id: String,
    kept: bool,
}

impl FreshSession {
    fn new(sessions: SessionRegistry, session_id: String) -> Self {
        Self {
            sessions,
            session_id,
            kept: false,
        }
    }

    fn keep(mut self) {
        self.kept = true;
    }
}

impl Drop for FreshSession {
    fn drop(&mut self) {
        if !self.kept && self.sessions.remove(&self.session_id) {
            tracing::warn!(session_id = %self.session_id, "Discarded session after failed initialize");
        }
    }
}

fn close_session(sessions: &SessionRegistry, headers: &HeaderMap) -> Response {
    match session_token(headers) {
        Some(token) if sessions.close(token) => {
            tracing::info!(session_id = %token, "Session closed by client");
            with_session_header(StatusCode::OK.into_response(), token)
        }
        _ => ProtocolError::InvalidSession.into_response(),
    }
}

/// Removes the session when the client drops its event stream.
struct StreamGuard {
    sessions: SessionRegistry,
    session_id: String,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if self.sessions.remove(&self.session_id) {
            tracing::info!(session_id = %self.session_id, "Event stream dropped, session closed");
        }
    }
}

fn open_event_stream(sessions: &SessionRegistry, headers: &HeaderMap) -> Response {
    let Some(session) = known_session(sessions, headers) else {
        return ProtocolError::InvalidSession.into_response();
    };

    let session_id = session.id().to_string();
    let closed = session.transport().closed_signal();
    let guard = StreamGuard {
        sessions: sessions.clone(),
        session_id: session_id.clone(),
    };
    drop(session);

    tracing::debug!(session_id = %session_id, "Event stream opened");
    let events = stream::once(async move {
        let guard = guard;
        closed.cancelled().await;
        Ok::<_, Infallible>(Event::default().event("close").data(&guard.session_id))
    });

    let sse = Sse::new(events).keep_alive(KeepAlive::default());
    with_session_header(sse.into_response(), &session_id)
}

/// Panic handler for `CatchPanicLayer`: the client gets an internal error,
/// the detail only goes to the log.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "Request handler panicked");
    ProtocolError::Internal(detail.to_string()).into_response()
}
