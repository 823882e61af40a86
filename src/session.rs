//! Per-conversation session state
//!
//! A `Session` holds the durable state of one conversation: the append-only
//! message history, the agent that last spoke to the user, and whether the
//! conversation is awaiting further user input. Sessions are mutated exactly
//! once per turn, by the orchestrator, and never concurrently for the same
//! conversation id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::BoxError;
use crate::items::Message;

/// Durable state for one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub history: Vec<Message>,
    /// The last agent that produced a user-facing message, used to route
    /// follow-up turns back to the same specialist.
    pub last_active_agent: Option<String>,
    /// Whether the final message of the last turn was phrased as a question.
    pub awaiting_user: bool,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            history: vec![],
            last_active_agent: None,
            awaiting_user: false,
        }
    }
}

/// Defines the interface for session storage implementations.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session by conversation id, if one exists.
    async fn load(&self, id: &str) -> Result<Option<Session>, BoxError>;

    /// Persist a session, replacing any previous state for its id.
    async fn store(&self, session: Session) -> Result<(), BoxError>;
}

/// A simple in-memory session store.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    inner: Arc<Mutex<HashMap<String, Session>>>,
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &str) -> Result<Option<Session>, BoxError> {
        let map = self.inner.lock().expect("session store lock");
        Ok(map.get(id).cloned())
    }

    async fn store(&self, session: Session) -> Result<(), BoxError> {
        let mut map = self.inner.lock().expect("session store lock");
        map.insert(session.id.clone(), session);
        Ok(())
    }
}
