use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Oldest events are dropped past this length so a perpetual sweep stays bounded.
pub const MAX_SESSION_EVENTS: usize = 1_000;

pub type SessionState = HashMap<String, Value>;

/// Shared handle to one session. Only the task in flight holds the lock.
pub type SessionHandle = Arc<Mutex<Session>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionIdentity {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionIdentity {
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub id: Uuid,
    pub author: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Conversation state shared across tasks: a key/value state map plus an
/// append-only event log.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: SessionIdentity,
    pub created_at: DateTime<Utc>,
    state: SessionState,
    events: Vec<SessionEvent>,
}

impl Session {
    pub fn new(identity: SessionIdentity) -> Self {
        Self {
            identity,
            created_at: Utc::now(),
            state: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn get_state(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn set_state(&mut self, key: &str, value: Value) {
        self.state.insert(key.to_string(), value);
    }

    pub fn remove_state(&mut self, key: &str) -> Option<Value> {
        self.state.remove(key)
    }

    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    pub fn append_event(&mut self, author: &str, text: impl Into<String>) -> Uuid {
        let id = Uuid::new_v4();
        self.events.push(SessionEvent {
            id,
            author: author.to_string(),
            text: text.into(),
            timestamp: Utc::now(),
        });
        if self.events.len() > MAX_SESSION_EVENTS {
            let excess = self.events.len() - MAX_SESSION_EVENTS;
            self.events.drain(..excess);
        }
        id
    }
}

// --- SessionStore trait ---

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session(&self, identity: &SessionIdentity) -> Result<Option<SessionHandle>>;

    /// Create a fresh session. Fails if one already exists under `identity`.
    async fn create_session(&self, identity: &SessionIdentity) -> Result<SessionHandle>;
}

/// Return the session under `identity`, creating it on first use.
pub async fn get_or_create_session(
    store: &dyn SessionStore,
    identity: &SessionIdentity,
) -> Result<SessionHandle> {
    if let Some(existing) = store.get_session(identity).await? {
        info!(
            user = %identity.user_id,
            session = %identity.session_id,
            "Using existing session"
        );
        return Ok(existing);
    }

    let created = store.create_session(identity).await?;
    info!(
        user = %identity.user_id,
        session = %identity.session_id,
        "Created new session"
    );
    Ok(created)
}

// --- In-memory store ---

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: std::sync::Mutex<HashMap<SessionIdentity, SessionHandle>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_session(&self, identity: &SessionIdentity) -> Result<Option<SessionHandle>> {
        let sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(_) => bail!("Session store lock poisoned"),
        };
        Ok(sessions.get(identity).cloned())
    }

    async fn create_session(&self, identity: &SessionIdentity) -> Result<SessionHandle> {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(_) => bail!("Session store lock poisoned"),
        };
        if sessions.contains_key(identity) {
            bail!(
                "Session '{}' already exists for user '{}'",
                identity.session_id,
                identity.user_id
            );
        }
        let handle: SessionHandle = Arc::new(Mutex::new(Session::new(identity.clone())));
        sessions.insert(identity.clone(), handle.clone());
        Ok(handle)
    }
}
