//! # Orchestrator façade
//!
//! The long-lived context object owning the backend chain and the session
//! store. One `Orchestrator` is constructed at startup, passed explicitly to
//! whatever serves conversations, and torn down with [`Orchestrator::shutdown`]
//! — no module-level singleton, so tests can run several independent
//! instances side by side.
//!
//! `handle` is the single caller-facing entry point. It never returns an
//! error: every failure path degrades to a well-formed reply. The session is
//! committed only after the turn fully resolves, so a cancelled turn leaves
//! no partial history behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::backend::{BackendSelector, FALLBACK_TEXT};
use crate::session::{Session, SessionStore};

/// The caller-facing result of one turn.
#[derive(Debug, Clone)]
pub struct TurnReply {
    /// The final user-facing message.
    pub text: String,
    /// The full multi-agent trace, in arrival order.
    pub messages: Vec<String>,
    /// Whether the conversation is waiting on the user.
    pub awaiting_user: bool,
}

impl TurnReply {
    fn fallback() -> Self {
        Self {
            text: FALLBACK_TEXT.to_string(),
            messages: vec![FALLBACK_TEXT.to_string()],
            awaiting_user: false,
        }
    }
}

/// Owns the backend chain and session store for one process.
pub struct Orchestrator {
    selector: BackendSelector,
    sessions: Arc<dyn SessionStore>,
    // In-flight turns hold the read side; shutdown takes the write side and
    // thereby waits for them to drain.
    gate: RwLock<()>,
    closed: AtomicBool,
}

impl Orchestrator {
    pub fn new(selector: BackendSelector, sessions: Arc<dyn SessionStore>) -> Self {
        info!(backends = ?selector.backend_names(), "orchestrator ready");
        Self {
            selector,
            sessions,
            gate: RwLock::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Handle one conversational turn. Never fails: backend errors, session
    /// store errors, and post-shutdown calls all resolve to a degraded but
    /// well-formed reply.
    pub async fn handle(&self, conversation_id: &str, user_text: &str) -> TurnReply {
        if self.closed.load(Ordering::SeqCst) {
            warn!(conversation = conversation_id, "turn rejected after shutdown");
            return TurnReply::fallback();
        }
        let _turn = self.gate.read().await;
        if self.closed.load(Ordering::SeqCst) {
            warn!(conversation = conversation_id, "turn rejected after shutdown");
            return TurnReply::fallback();
        }

        let session = match self.sessions.load(conversation_id).await {
            Ok(Some(session)) => session,
            Ok(None) => Session::new(conversation_id),
            Err(e) => {
                error!(conversation = conversation_id, error = %e, "session load failed");
                return TurnReply::fallback();
            }
        };

        let outcome = self.selector.resolve(&session, user_text).await;

        // Commit the turn: history grows monotonically, and the last agent
        // that spoke to the user becomes the follow-up target.
        let mut session = session;
        session.history.extend(outcome.transcript);
        if let Some(agent) = &outcome.last_agent {
            session.last_active_agent = Some(agent.clone());
        }
        session.awaiting_user = outcome.awaiting_user;

        if let Err(e) = self.sessions.store(session).await {
            // The reply is still valid; only durability degraded.
            error!(conversation = conversation_id, error = %e, "session store failed");
        }

        TurnReply {
            text: outcome.text,
            messages: outcome.messages,
            awaiting_user: outcome.awaiting_user,
        }
    }

    /// Await completion of all in-flight turns, then stop accepting new
    /// ones. Backend connection resources are released when the
    /// orchestrator is dropped.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _drain = self.gate.write().await;
        info!("orchestrator shut down");
    }
}
