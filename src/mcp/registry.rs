//! Thread-safe session registry
//!
//! Maps opaque session tokens to live [`Session`]s. This is the only state
//! shared between sessions; every insert, lookup and removal goes through one
//! lock so they are atomic with respect to each other.
//!
//! Removal is wired into the transport: whichever way a session ends
//! (explicit DELETE, dropped event stream, idle reaping, process shutdown)
//! its transport's close hook evicts the entry synchronously.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;
use uuid::Uuid;

use crate::error::ProtocolResult;
use crate::mcp::dispatcher::Dispatcher;
use crate::mcp::protocol::JsonRpcRequest;
use crate::mcp::transport::{SessionTransport, TransportState};

type SessionMap = HashMap<String, Arc<Session>>;

/// Server-side state bound to one client.
pub struct Session {
    transport: SessionTransport,
    created_at: DateTime<Utc>,
    last_activity: Mutex<DateTime<Utc>>,
}

impl Session {
    fn new(transport: SessionTransport) -> Self {
        let now = Utc::now();
        Self {
            transport,
            created_at: now,
            last_activity: Mutex::new(now),
        }
    }

    pub fn id(&self) -> &str {
        self.transport.session_id()
    }

    pub fn transport(&self) -> &SessionTransport {
        &self.transport
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time since the session was created.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Utc::now();
    }

    /// Forward a request to this session's transport.
    pub async fn handle(&self, request: &JsonRpcRequest) -> ProtocolResult<Value> {
        self.touch();
        let outcome = self.transport.handle(request).await;
        self.touch();
        outcome
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Registry of live sessions
///
/// Cheap to clone; clones share the same map. Pass it into the HTTP router as
/// state rather than keeping it in a global.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use weather_mcp_gateway::mcp::{Dispatcher, SessionRegistry};
/// use weather_mcp_gateway::tools::ToolRegistry;
///
/// let dispatcher = Arc::new(Dispatcher::new(Arc::new(ToolRegistry::default())));
/// let sessions = SessionRegistry::new(dispatcher);
///
/// let (id, _session) = sessions.create();
/// assert!(sessions.lookup(&id).is_some());
///
/// assert!(sessions.remove(&id));
/// assert!(!sessions.remove(&id));
/// assert!(sessions.lookup(&id).is_none());
/// ```
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<SessionMap>>,
    dispatcher: Arc<Dispatcher>,
}

impl SessionRegistry {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(Arc::clone)
    }

    /// Mint a fresh token and register a new, uninitialized session under it.
    ///
    /// The token is a v4 UUID, re-drawn on the (unlikely) collision with a live
    /// session. The new transport's close hook evicts the entry again.
    ///
    /// # Returns
    ///
    /// The session id together with the registered session.
    pub fn create(&self) -> (String, Arc<Session>) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

        let id = loop {
            let candidate = Uuid::new_v4().to_string();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let transport = SessionTransport::new(
            id.clone(),
            Arc::clone(&self.dispatcher),
            evict_on_close(Arc::downgrade(&self.sessions)),
        );
        let session = Arc::new(Session::new(transport));
        sessions.insert(id.clone(), Arc::clone(&session));
        drop(sessions);

        tracing::debug!(session_id = %id, "Session created");
        (id, session)
    }

    /// Evict a session and close its transport.
    ///
    /// Any request still running on the session resolves to an internal error.
    ///
    /// # Arguments
    ///
    /// * `id` - Session token as minted by [`SessionRegistry::create`]
    ///
    /// # Returns
    ///
    /// `true` if a live session was removed. Idempotent: returns `false` when
    /// there was nothing live to remove.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);

        match removed {
            Some(session) => {
                session.transport().close();
                tracing::debug!(
                    session_id = %id,
                    age_secs = session.age().num_seconds(),
                    "Session removed"
                );
                true
            }
            None => false,
        }
    }

    /// Close a live session's transport; its close hook evicts the entry.
    pub fn close(&self, id: &str) -> bool {
        match self.lookup(id) {
            Some(session) => session.transport().close(),
            None => false,
        }
    }

    /// Close every session. Used at process shutdown.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Arc<Session>> = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, session)| session)
            .collect();

        for session in &drained {
            session.transport().close();
        }
        drained.len()
    }

    /// Close sessions with no activity for longer than `max_idle`.
    pub fn reap_idle(&self, max_idle: Duration) -> usize {
        let Ok(max_idle) = chrono::Duration::from_std(max_idle) else {
            return 0;
        };
        let cutoff = Utc::now() - max_idle;

        let idle: Vec<String> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|s| s.last_activity() < cutoff)
            .map(|s| s.id().to_string())
            .collect();

        let mut reaped = 0;
        for id in idle {
            if self.remove(&id) {
                tracing::info!(session_id = %id, "Reaped idle session");
                reaped += 1;
            }
        }
        reaped
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Close hook that drops the session's entry from the map, if the map still
/// exists. The removed entry is released after the lock.
fn evict_on_close(sessions: Weak<RwLock<SessionMap>>) -> Box<dyn Fn(&str) + Send + Sync> {
    Box::new(move |id| {
        let Some(sessions) = sessions.upgrade() else {
            return;
        };
        let removed = sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if removed.is_some() {
            tracing::debug!(session_id = %id, "Session evicted");
        }
        drop(removed);
    })
}
