//! Records Resolver Collaborator
//!
//! The engine's view of the external records store. Lookups return
//! `Ok(None)` for missing identifiers; `Err` means the store itself was
//! unreachable. Callers in the scope resolver absorb both into graceful
//! degradation rather than failing a run.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Action, KnowledgeItem, Playbook, Skill, ToolRecord};

/// Errors raised by external store collaborators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The store could not be reached at all.
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    /// The store answered but the record could not be used.
    #[error("Store error: {message}")]
    Internal { message: String },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Read-only access to configuration records.
///
/// Implementations must return `Ok(None)` rather than `Err` for a missing
/// identifier; `Err` is reserved for transport-level failure.
#[async_trait]
pub trait RecordsResolver: Send + Sync {
    async fn action(&self, id: &str) -> Result<Option<Action>, StoreError>;
    async fn skill(&self, id: &str) -> Result<Option<Skill>, StoreError>;
    async fn knowledge(&self, id: &str) -> Result<Option<KnowledgeItem>, StoreError>;
    async fn tool(&self, id: &str) -> Result<Option<ToolRecord>, StoreError>;
    async fn playbook(&self, id: &str) -> Result<Option<Playbook>, StoreError>;
}

/// In-memory records resolver for tests and embedded use.
#[derive(Default)]
pub struct InMemoryRecords {
    actions: HashMap<String, Action>,
    skills: HashMap<String, Skill>,
    knowledge: HashMap<String, KnowledgeItem>,
    tools: HashMap<String, ToolRecord>,
    playbooks: HashMap<String, Playbook>,
}

impl InMemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.insert(action.id.clone(), action);
        self
    }

    pub fn with_skill(mut self, skill: Skill) -> Self {
        self.skills.insert(skill.id.clone(), skill);
        self
    }

    pub fn with_knowledge(mut self, item: KnowledgeItem) -> Self {
        self.knowledge.insert(item.id.clone(), item);
        self
    }

    pub fn with_tool(mut self, tool: ToolRecord) -> Self {
        self.tools.insert(tool.id.clone(), tool);
        self
    }

    pub fn with_playbook(mut self, playbook: Playbook) -> Self {
        self.playbooks.insert(playbook.id.clone(), playbook);
        self
    }
}

#[async_trait]
impl RecordsResolver for InMemoryRecords {
    async fn action(&self, id: &str) -> Result<Option<Action>, StoreError> {
        Ok(self.actions.get(id).cloned())
    }

    async fn skill(&self, id: &str) -> Result<Option<Skill>, StoreError> {
        Ok(self.skills.get(id).cloned())
    }

    async fn knowledge(&self, id: &str) -> Result<Option<KnowledgeItem>, StoreError> {
        Ok(self.knowledge.get(id).cloned())
    }

    async fn tool(&self, id: &str) -> Result<Option<ToolRecord>, StoreError> {
        Ok(self.tools.get(id).cloned())
    }

    async fn playbook(&self, id: &str) -> Result<Option<Playbook>, StoreError> {
        Ok(self.playbooks.get(id).cloned())
    }
}
