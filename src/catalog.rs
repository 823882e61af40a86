//! Remote agent catalog seam
//!
//! The catalog is an external collaborator: given an id or a name it returns
//! an agent definition, and it supports listing for name-based fallback
//! resolution. Lookups happen once per backend activation, never per turn.

use async_trait::async_trait;

use crate::error::BoxError;

/// An agent definition as stored in the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDefinition {
    pub id: String,
    pub name: String,
    pub instructions: String,
}

/// Defines the interface to the remote agent catalog.
#[async_trait]
pub trait AgentCatalog: Send + Sync {
    /// Fetch a definition by catalog id. `Ok(None)` means "not found";
    /// `Err` means the catalog itself could not be reached.
    async fn get_by_id(&self, id: &str) -> Result<Option<AgentDefinition>, BoxError>;

    /// List all definitions, for name-based fallback resolution.
    async fn list(&self) -> Result<Vec<AgentDefinition>, BoxError>;

    /// Find a definition by name.
    async fn find_by_name(&self, name: &str) -> Result<Option<AgentDefinition>, BoxError> {
        Ok(self.list().await?.into_iter().find(|d| d.name == name))
    }
}

/// Fixed in-memory catalog for local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    agents: Vec<AgentDefinition>,
}

impl StaticCatalog {
    pub fn new(agents: Vec<AgentDefinition>) -> Self {
        Self { agents }
    }
}

#[async_trait]
impl AgentCatalog for StaticCatalog {
    async fn get_by_id(&self, id: &str) -> Result<Option<AgentDefinition>, BoxError> {
        Ok(self.agents.iter().find(|d| d.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<AgentDefinition>, BoxError> {
        Ok(self.agents.clone())
    }
}
