//! # Hand-off graph (build-time)
//!
//! A `HandoffGraph` is a directed graph over agents: each edge declares that
//! its source may transfer control to its target, with a human-readable
//! routing hint. Graphs are built once per backend activation — either
//! explicitly from a hand-authored agent list, or resolved against the
//! remote agent catalog — and are immutable and shareable afterwards.
//!
//! Structural rules, enforced at build time:
//! - every edge's source and target must exist in the graph's agent set;
//! - no edge may target its own source;
//! - agent names are unique within a graph.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::agent::{Agent, AgentRef};
use crate::catalog::{AgentCatalog, AgentDefinition};
use crate::error::{OrchestratorError, Result};
use crate::tool::Tool;

/// Label used for the generated specialist → entry return edges.
pub const RETURN_EDGE_LABEL: &str = "back to orchestrator";

/// A declared hand-off route between two agents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffEdge {
    pub source: String,
    pub target: String,
    /// Routing hint surfaced to the source agent, e.g.
    /// "Product search / SKU / availability".
    pub label: String,
}

/// An immutable graph of agents and hand-off edges with one entry agent.
#[derive(Debug, Clone)]
pub struct HandoffGraph {
    agents: HashMap<String, Arc<Agent>>,
    edges: Vec<HandoffEdge>,
    entry: String,
}

impl HandoffGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    pub fn entry(&self) -> &Arc<Agent> {
        &self.agents[&self.entry]
    }

    pub fn entry_name(&self) -> &str {
        &self.entry
    }

    pub fn agent(&self, name: &str) -> Option<&Arc<Agent>> {
        self.agents.get(name)
    }

    pub fn agent_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.agents.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn edges(&self) -> &[HandoffEdge] {
        &self.edges
    }

    /// Hand-off routes available to the named agent.
    pub fn edges_from(&self, source: &str) -> Vec<&HandoffEdge> {
        self.edges.iter().filter(|e| e.source == source).collect()
    }

    /// Whether `from` may hand control to `to` along a declared edge.
    pub fn is_reachable(&self, from: &str, to: &str) -> bool {
        self.edges.iter().any(|e| e.source == from && e.target == to)
    }
}

/// Explicit construction: a fixed, hand-authored list of agents and edges.
#[derive(Default)]
pub struct GraphBuilder {
    agents: Vec<Agent>,
    edges: Vec<HandoffEdge>,
    entry: Option<String>,
}

impl GraphBuilder {
    pub fn agent(mut self, agent: Agent) -> Self {
        self.agents.push(agent);
        self
    }

    /// Marks the entry agent and adds it to the graph.
    pub fn entry_agent(mut self, agent: Agent) -> Self {
        self.entry = Some(agent.name().to_string());
        self.agents.push(agent);
        self
    }

    pub fn edge(
        mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        self.edges.push(HandoffEdge {
            source: source.into(),
            target: target.into(),
            label: label.into(),
        });
        self
    }

    /// Validates the structural rules and freezes the graph.
    pub fn build(self) -> Result<HandoffGraph> {
        let entry = self
            .entry
            .ok_or_else(|| OrchestratorError::GraphBuild("no entry agent set".to_string()))?;

        let mut agents: HashMap<String, Arc<Agent>> = HashMap::new();
        for agent in self.agents {
            let name = agent.name().to_string();
            if agents.insert(name.clone(), Arc::new(agent)).is_some() {
                return Err(OrchestratorError::GraphBuild(format!(
                    "duplicate agent name '{}'",
                    name
                )));
            }
        }

        if !agents.contains_key(&entry) {
            return Err(OrchestratorError::GraphBuild(format!(
                "entry agent '{}' is not in the agent set",
                entry
            )));
        }

        for edge in &self.edges {
            if edge.source == edge.target {
                return Err(OrchestratorError::GraphBuild(format!(
                    "edge from '{}' targets its own source",
                    edge.source
                )));
            }
            for endpoint in [&edge.source, &edge.target] {
                if !agents.contains_key(endpoint) {
                    return Err(OrchestratorError::GraphBuild(format!(
                        "edge references unknown agent '{}'",
                        endpoint
                    )));
                }
            }
        }

        Ok(HandoffGraph {
            agents,
            edges: self.edges,
            entry,
        })
    }
}

/// A catalog reference plus the tools to bind to the resolved agent.
pub struct RemoteAgentSpec {
    pub reference: AgentRef,
    pub tools: Vec<Arc<dyn Tool>>,
}

/// An optional specialist: resolved if possible, omitted otherwise.
pub struct SpecialistSpec {
    pub reference: AgentRef,
    /// Domain description, used as the entry → specialist edge label.
    pub domain: String,
    pub tools: Vec<Arc<dyn Tool>>,
}

async fn resolve_reference(
    catalog: &dyn AgentCatalog,
    reference: &AgentRef,
) -> std::result::Result<Option<AgentDefinition>, crate::error::BoxError> {
    if let Some(id) = &reference.id {
        if let Some(def) = catalog.get_by_id(id).await? {
            return Ok(Some(def));
        }
        info!(
            agent = %reference.name,
            id = %id,
            "catalog id not found, falling back to lookup by name"
        );
    }
    catalog.find_by_name(&reference.name).await
}

/// Resolved construction: look the entry agent and each specialist up in the
/// remote catalog. Failure to resolve the entry agent is fatal for this
/// build; failure to resolve a specialist omits that specialist and its
/// edges. Every resolved specialist gets a forward edge labeled with its
/// domain and a return edge back to the entry agent, so each reachable
/// specialist can always hand control back.
pub async fn resolve_graph(
    catalog: &dyn AgentCatalog,
    entry: RemoteAgentSpec,
    specialists: Vec<SpecialistSpec>,
) -> Result<HandoffGraph> {
    let entry_def = resolve_reference(catalog, &entry.reference)
        .await
        .map_err(|e| OrchestratorError::AgentResolution {
            message: format!("catalog lookup for '{}' failed: {}", entry.reference.name, e),
        })?
        .ok_or_else(|| OrchestratorError::AgentResolution {
            message: format!("entry agent '{}' not found in catalog", entry.reference.name),
        })?;

    let entry_name = entry.reference.name.clone();
    let entry_agent = Agent::remote(
        entry_name.clone(),
        entry_def.instructions.clone(),
        AgentRef::by_id(entry_def.id.clone(), entry_def.name.clone()),
    )
    .with_tools(entry.tools);

    let mut builder = HandoffGraph::builder().entry_agent(entry_agent);

    for spec in specialists {
        let resolved = match resolve_reference(catalog, &spec.reference).await {
            Ok(Some(def)) => def,
            Ok(None) => {
                warn!(agent = %spec.reference.name, "specialist not found in catalog, omitting");
                continue;
            }
            Err(e) => {
                warn!(
                    agent = %spec.reference.name,
                    error = %e,
                    "specialist resolution failed, omitting"
                );
                continue;
            }
        };

        let name = spec.reference.name.clone();
        let agent = Agent::remote(
            name.clone(),
            resolved.instructions.clone(),
            AgentRef::by_id(resolved.id.clone(), resolved.name.clone()),
        )
        .with_tools(spec.tools);

        builder = builder
            .agent(agent)
            .edge(entry_name.clone(), name.clone(), spec.domain)
            .edge(name, entry_name.clone(), RETURN_EDGE_LABEL);
    }

    let graph = builder.build()?;
    info!(
        entry = %graph.entry_name(),
        agents = graph.agent_names().len(),
        "resolved hand-off graph"
    );
    Ok(graph)
}
