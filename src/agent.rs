//! # Agent (orientation)
//!
//! An `Agent` is a named participant in a conversation turn: instructions,
//! a set of bound tools, and an execution mode. Agents are built once per
//! graph construction and immutable afterwards; the hand-off loop shares
//! them as `Arc<Agent>` across concurrently executing turns.

use std::sync::Arc;

use crate::graph::HandoffEdge;
use crate::tool::Tool;

/// A reference into the remote agent catalog: resolved by id first, then by
/// name if the id is absent or unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRef {
    pub id: Option<String>,
    pub name: String,
}

impl AgentRef {
    pub fn by_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

/// How an agent executes: in-process, or against a remotely hosted
/// definition resolved from the agent catalog at graph-build time.
///
/// A closed set of variants keeps the hand-off loop's control flow uniform
/// regardless of execution mode.
#[derive(Debug, Clone)]
pub enum AgentMode {
    Local,
    Remote { reference: AgentRef },
}

/// A configured participant in a hand-off graph.
#[derive(Clone)]
pub struct Agent {
    name: String,
    instructions: String,
    tools: Vec<Arc<dyn Tool>>,
    mode: AgentMode,
}

impl Agent {
    /// Creates a local agent with a name and instructions.
    pub fn simple(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            tools: vec![],
            mode: AgentMode::Local,
        }
    }

    /// Creates an agent backed by a remote catalog definition.
    pub fn remote(
        name: impl Into<String>,
        instructions: impl Into<String>,
        reference: AgentRef,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            tools: vec![],
            mode: AgentMode::Remote { reference },
        }
    }

    /// Adds a tool to the agent.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Adds multiple tools to the agent.
    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn mode(&self) -> &AgentMode {
        &self.mode
    }

    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }

    /// Constructs the system directive for this agent: its instructions,
    /// the tools it can call, and the hand-off targets reachable from it
    /// with their routing hints.
    pub fn system_prompt(&self, handoffs: &[&HandoffEdge]) -> String {
        let mut content = self.instructions.clone();

        if !self.tools.is_empty() {
            content.push_str("\n\nYou have access to the following tools:\n");
            for tool in &self.tools {
                content.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
            }
        }

        if !handoffs.is_empty() {
            content.push_str("\n\nYou can hand the conversation off to:\n");
            for edge in handoffs {
                content.push_str(&format!("- {}: {}\n", edge.target, edge.label));
            }
        }

        content
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("tools_count", &self.tools.len())
            .field("mode", &self.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::typed_tool;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct NoArgs {}

    #[test]
    fn test_agent_creation() {
        let agent = Agent::simple("TriageAgent", "Route customer requests.");
        assert_eq!(agent.name(), "TriageAgent");
        assert_eq!(agent.instructions(), "Route customer requests.");
        assert!(!agent.has_tools());
        assert!(matches!(agent.mode(), AgentMode::Local));
    }

    #[test]
    fn test_remote_agent_reference() {
        let agent = Agent::remote(
            "ProductLookupAgent",
            "Find products.",
            AgentRef::by_id("asst_123", "ProductLookupAgent"),
        );
        match agent.mode() {
            AgentMode::Remote { reference } => {
                assert_eq!(reference.id.as_deref(), Some("asst_123"));
                assert_eq!(reference.name, "ProductLookupAgent");
            }
            AgentMode::Local => panic!("expected remote mode"),
        }
    }

    #[test]
    fn test_system_prompt_lists_tools_and_handoffs() {
        let tool = typed_tool("ping", "Health check", |_: NoArgs| async { Ok("pong") });
        let agent = Agent::simple("TriageAgent", "Route requests.").with_tool(tool);

        let edge = HandoffEdge {
            source: "TriageAgent".to_string(),
            target: "OrderStatusAgent".to_string(),
            label: "Order status or tracking questions".to_string(),
        };

        let prompt = agent.system_prompt(&[&edge]);
        assert!(prompt.contains("Route requests."));
        assert!(prompt.contains("ping: Health check"));
        assert!(prompt.contains("OrderStatusAgent: Order status or tracking questions"));
    }

    #[test]
    fn test_system_prompt_without_extras_is_just_instructions() {
        let agent = Agent::simple("KnowledgeAgent", "Answer policy questions.");
        assert_eq!(agent.system_prompt(&[]), "Answer policy questions.");
    }
}
