//! Scope Resolution
//!
//! Turns configuration references (action/skill/knowledge/tool identifiers)
//! into resolved records, partitioned by delivery mode. Resolution is
//! tolerant: a missing identifier is skipped, and a records store that is
//! unreachable degrades the run to an empty scope instead of failing it (a
//! deleted skill or knowledge source must not break an otherwise-valid
//! playbook).

use std::sync::Arc;

use tracing::{debug, warn};

use crate::models::{Action, KnowledgeItem, KnowledgeKind, Skill, ToolRecord};
use crate::services::records::RecordsResolver;

/// The resolved skills/knowledge/tools for one playbook or ad-hoc request.
///
/// Built once per resolution call and owned by that run; the resolver does
/// not cache across calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedScope {
    pub skills: Vec<Skill>,
    pub knowledge: Vec<KnowledgeItem>,
    pub tools: Vec<ToolRecord>,
}

impl ResolvedScope {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty() && self.knowledge.is_empty() && self.tools.is_empty()
    }

    /// Identifiers of `rag-index` knowledge items. These contribute only
    /// their source identifier to retrieval; their bodies never enter the
    /// prompt.
    pub fn rag_source_ids(&self) -> Vec<String> {
        self.knowledge
            .iter()
            .filter(|k| k.kind == KnowledgeKind::RagIndex)
            .map(|k| k.source_id.clone().unwrap_or_else(|| k.id.clone()))
            .collect()
    }

    /// Inline knowledge items, in resolution order. Only these enter the
    /// composed prompt.
    pub fn inline_items(&self) -> Vec<&KnowledgeItem> {
        self.knowledge_of_kind(KnowledgeKind::Inline)
    }

    /// Document-reference items: retained in the scope, excluded from the
    /// prompt.
    pub fn document_references(&self) -> Vec<&KnowledgeItem> {
        self.knowledge_of_kind(KnowledgeKind::DocumentReference)
    }

    /// Knowledge items of one kind, in resolution order. When a caller also
    /// applies a query-level filter, both filters narrow the set; neither
    /// overrides the other.
    pub fn knowledge_of_kind(&self, kind: KnowledgeKind) -> Vec<&KnowledgeItem> {
        self.knowledge.iter().filter(|k| k.kind == kind).collect()
    }
}

/// Resolves configuration references through the records collaborator.
pub struct ScopeResolver {
    records: Arc<dyn RecordsResolver>,
}

impl ScopeResolver {
    pub fn new(records: Arc<dyn RecordsResolver>) -> Self {
        Self { records }
    }

    /// Resolve ad-hoc id lists into a scope. Missing ids and store failures
    /// are absorbed; the returned scope contains whatever resolved.
    pub async fn resolve_scopes(
        &self,
        skill_ids: &[String],
        knowledge_ids: &[String],
        tool_ids: &[String],
    ) -> ResolvedScope {
        let mut scope = ResolvedScope::empty();

        for id in skill_ids {
            match self.records.skill(id).await {
                Ok(Some(skill)) => scope.skills.push(skill),
                Ok(None) => debug!(skill_id = %id, "skill not found, omitting from scope"),
                Err(e) => warn!(skill_id = %id, error = %e, "skill lookup failed, omitting"),
            }
        }

        for id in knowledge_ids {
            match self.records.knowledge(id).await {
                Ok(Some(item)) => scope.knowledge.push(item),
                Ok(None) => debug!(knowledge_id = %id, "knowledge not found, omitting from scope"),
                Err(e) => {
                    warn!(knowledge_id = %id, error = %e, "knowledge lookup failed, omitting")
                }
            }
        }

        for id in tool_ids {
            match self.records.tool(id).await {
                Ok(Some(tool)) => scope.tools.push(tool),
                Ok(None) => debug!(tool_id = %id, "tool not found, omitting from scope"),
                Err(e) => warn!(tool_id = %id, error = %e, "tool lookup failed, omitting"),
            }
        }

        scope
    }

    /// Resolve a playbook's full scope. A missing playbook or an
    /// unreachable store yields an empty scope; the caller decides whether
    /// a missing playbook is a terminal condition.
    pub async fn resolve_playbook_scopes(&self, playbook_id: &str) -> ResolvedScope {
        match self.records.playbook(playbook_id).await {
            Ok(Some(playbook)) => {
                self.resolve_scopes(
                    &playbook.skill_ids,
                    &playbook.knowledge_ids,
                    &playbook.tool_ids,
                )
                .await
            }
            Ok(None) => {
                debug!(playbook_id, "playbook not found, resolving empty scope");
                ResolvedScope::empty()
            }
            Err(e) => {
                warn!(playbook_id, error = %e, "playbook lookup failed, degrading to empty scope");
                ResolvedScope::empty()
            }
        }
    }

    /// Look up a playbook record directly. `Ok(None)` means the id does not
    /// exist; `Err` means the store was unreachable (callers degrade).
    pub async fn playbook(
        &self,
        playbook_id: &str,
    ) -> Result<Option<crate::models::Playbook>, crate::services::records::StoreError> {
        self.records.playbook(playbook_id).await
    }

    /// Resolve an action, absorbing store failure into `None`.
    pub async fn get_action(&self, action_id: &str) -> Option<Action> {
        match self.records.action(action_id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(action_id, error = %e, "action lookup failed, continuing without action");
                None
            }
        }
    }
}
