//! Error types for the orchestration crate

use thiserror::Error;

/// Boxed error type used at the external-collaborator seams (catalogs,
/// stores, completion backends).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Main error type for turn orchestration.
///
/// Tool failures are deliberately *not* part of this taxonomy: a failing
/// tool is surfaced to the calling agent as a normal result (see
/// [`crate::tool::ToolError`]) and never aborts a turn.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// An agent reference could not be resolved against the remote catalog.
    /// Fatal to the backend being built, recoverable for the system.
    #[error("agent resolution failed: {message}")]
    AgentResolution { message: String },

    /// A hand-off graph violated a structural rule at build time.
    #[error("invalid hand-off graph: {0}")]
    GraphBuild(String),

    /// An agent requested a hand-off along an edge that does not exist.
    /// Rejected back to the issuing agent, never surfaced to the user.
    #[error("no hand-off edge from {from} to {to}")]
    InvalidHandoff { from: String, to: String },

    /// The configured maximum number of hand-offs was exceeded.
    #[error("hand-off limit exceeded: {max_handoffs}")]
    HandoffLimitExceeded { max_handoffs: usize },

    /// The turn performed more model steps than allowed.
    #[error("step limit exceeded: {max_steps}")]
    StepLimitExceeded { max_steps: usize },

    /// The underlying completion capability failed.
    #[error("completion error: {0}")]
    Completion(String),

    /// Any uncaught failure inside a backend's turn execution. Recoverable
    /// at the selector level by falling through to the next backend.
    #[error("backend execution failed: {message}")]
    BackendExecution { message: String },

    /// Session store failure.
    #[error("session error: {0}")]
    Session(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
