//! Configuration for the orchestration stack
//!
//! Mirrors the deployment surface: the completion model to use, the remote
//! agent platform endpoint and per-agent catalog ids, and the turn limits.
//! A missing specialist id simply omits that specialist from the resolved
//! graph; a missing endpoint or entry-agent id leaves the remote backend
//! unconfigured so the selector skips it.

use serde::{Deserialize, Serialize};

use crate::runtime::RuntimeConfig;

/// Process-wide orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Completion model/deployment name.
    pub model: String,

    /// Remote agent platform endpoint, if any.
    pub remote_endpoint: Option<String>,

    /// Catalog id of the remote entry/orchestrator agent.
    pub orchestrator_agent_id: Option<String>,

    /// Catalog id of the remote product lookup agent.
    pub product_agent_id: Option<String>,

    /// Catalog id of the remote order status agent.
    pub order_agent_id: Option<String>,

    /// Catalog id of the remote knowledge/policy agent.
    pub knowledge_agent_id: Option<String>,

    /// Maximum hand-offs per turn.
    pub max_handoffs: usize,

    /// Maximum completion calls per turn.
    pub max_steps: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let runtime = RuntimeConfig::default();
        Self {
            model: "gpt-4o".to_string(),
            remote_endpoint: None,
            orchestrator_agent_id: None,
            product_agent_id: None,
            order_agent_id: None,
            knowledge_agent_id: None,
            max_handoffs: runtime.max_handoffs,
            max_steps: runtime.max_steps,
        }
    }
}

impl OrchestratorConfig {
    /// Whether the remote agent platform backend can be built at all.
    pub fn has_remote_config(&self) -> bool {
        self.remote_endpoint.is_some() && self.orchestrator_agent_id.is_some()
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            max_handoffs: self.max_handoffs,
            max_steps: self.max_steps,
        }
    }
}

/// Load configuration from environment variables.
pub fn from_env() -> OrchestratorConfig {
    let mut config = OrchestratorConfig::default();

    if let Ok(model) = std::env::var("TRIAGE_MODEL") {
        config.model = model;
    }
    config.remote_endpoint = std::env::var("TRIAGE_REMOTE_ENDPOINT").ok();
    config.orchestrator_agent_id = std::env::var("TRIAGE_ORCHESTRATOR_AGENT_ID").ok();
    config.product_agent_id = std::env::var("TRIAGE_PRODUCT_AGENT_ID").ok();
    config.order_agent_id = std::env::var("TRIAGE_ORDER_AGENT_ID").ok();
    config.knowledge_agent_id = std::env::var("TRIAGE_KNOWLEDGE_AGENT_ID").ok();

    if let Ok(raw) = std::env::var("TRIAGE_MAX_HANDOFFS") {
        if let Ok(n) = raw.parse::<usize>() {
            config.max_handoffs = n;
        }
    }
    if let Ok(raw) = std::env::var("TRIAGE_MAX_STEPS") {
        if let Ok(n) = raw.parse::<usize>() {
            config.max_steps = n;
        }
    }

    config
}
