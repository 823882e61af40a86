//! # triage-llm
//!
//! Routes a user's conversational turn to the right specialist agent among a
//! set of cooperating agents (product lookup, order status, policy lookup,
//! and a generalist entry agent). Agents may invoke bound tools and hand the
//! conversation off to each other along a declared graph; the whole decision
//! is delegated to one of several interchangeable backends tried in priority
//! order, with partial-failure recovery down to a static fallback reply.
//!
//! ## Core concepts
//!
//! - **Agent**: a named participant with instructions, bound tools, and a
//!   local or remote execution mode
//! - **HandoffGraph**: which agents may transfer control to which others,
//!   with a routing hint per edge
//! - **OrchestrationRuntime**: the per-turn state machine — active agent,
//!   pending tool calls, terminal message — with a bounded hand-off count
//! - **BackendSelector**: the priority/fallback chain over complete
//!   orchestration strategies; it never raises
//! - **Orchestrator**: the long-lived façade owning the chain and the
//!   session store
//!
//! ## Getting started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use triage_llm::{
//!     Agent, BackendSelector, GraphBackend, HandoffGraph, InMemorySessionStore,
//!     OpenAiModel, Orchestrator, RETURN_EDGE_LABEL,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let graph = Arc::new(
//!     HandoffGraph::builder()
//!         .entry_agent(Agent::simple("TriageAgent", "Route customer requests."))
//!         .agent(Agent::simple("OrderStatusAgent", "Handle order status questions."))
//!         .edge("TriageAgent", "OrderStatusAgent", "Order status or tracking questions")
//!         .edge("OrderStatusAgent", "TriageAgent", RETURN_EDGE_LABEL)
//!         .build()?,
//! );
//!
//! let model = Arc::new(OpenAiModel::new("gpt-4o"));
//! let backend = GraphBackend::new("local-handoff-graph", graph, model);
//!
//! let orchestrator = Orchestrator::new(
//!     BackendSelector::new(vec![Arc::new(backend)]),
//!     Arc::new(InMemorySessionStore::default()),
//! );
//!
//! let reply = orchestrator
//!     .handle("conversation-1", "What's the status of order ORD-123?")
//!     .await;
//! println!("{}", reply.text);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod backend;
pub mod catalog;
pub mod completion;
pub mod config;
pub mod error;
pub mod graph;
pub mod items;
pub mod orchestrator;
pub mod plugins;
pub mod runtime;
pub mod session;
pub mod tool;

pub use agent::{Agent, AgentMode, AgentRef};
pub use backend::{
    Backend, BackendSelector, ClassifierBackend, GraphBackend, RemoteToolset, FALLBACK_TEXT,
};
pub use catalog::{AgentCatalog, AgentDefinition, StaticCatalog};
pub use completion::{AgentReply, CompletionModel, OpenAiModel};
pub use config::{from_env, OrchestratorConfig};
pub use error::{BoxError, OrchestratorError, Result};
pub use graph::{
    resolve_graph, GraphBuilder, HandoffEdge, HandoffGraph, RemoteAgentSpec, SpecialistSpec,
    RETURN_EDGE_LABEL,
};
pub use items::{Message, Role, ToolCall, ToolRecord};
pub use orchestrator::{Orchestrator, TurnReply};
pub use runtime::{
    follow_up_text, OrchestrationRuntime, RuntimeConfig, TurnOutcome, TurnState,
};
pub use session::{InMemorySessionStore, Session, SessionStore};
pub use tool::{typed_tool, Tool, ToolBridge, ToolError, ToolErrorKind};
