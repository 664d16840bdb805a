//! Domain Records
//!
//! Plain data records for the configuration the engine runs against:
//! actions, skills, knowledge sources, tool records, playbooks, and analysis
//! records. These mirror what the external records store persists; the
//! engine never writes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named base behavior: the system prompt an analysis starts from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Action {
    pub id: String,
    pub name: String,
    pub system_prompt: String,
}

impl Action {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            system_prompt: system_prompt.into(),
        }
    }
}

/// A reusable prompt fragment injected under "Specialized Instructions".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub prompt_fragment: String,
}

impl Skill {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        prompt_fragment: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            prompt_fragment: prompt_fragment.into(),
        }
    }
}

/// Delivery mode of a knowledge source.
///
/// The partitioning is exhaustive and disjoint: `Inline` content enters the
/// composed prompt, `RagIndex` contributes only its identifier to the
/// retrieval-source list, and `DocumentReference` stays in the resolved
/// scope without entering the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KnowledgeKind {
    Inline,
    RagIndex,
    DocumentReference,
}

/// A knowledge source referenced by a playbook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeItem {
    pub id: String,
    pub name: String,
    pub kind: KnowledgeKind,
    /// Body text; present for `Inline` items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// External source identifier; present for `RagIndex` and
    /// `DocumentReference` items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl KnowledgeItem {
    pub fn inline(
        id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: KnowledgeKind::Inline,
            content: Some(content.into()),
            source_id: None,
        }
    }

    pub fn rag_index(
        id: impl Into<String>,
        name: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: KnowledgeKind::RagIndex,
            content: None,
            source_id: Some(source_id.into()),
        }
    }

    pub fn document_reference(
        id: impl Into<String>,
        name: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: KnowledgeKind::DocumentReference,
            content: None,
            source_id: Some(source_id.into()),
        }
    }
}

/// A playbook's reference to a tool handler plus its configuration payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolRecord {
    pub id: String,
    pub name: String,
    /// Identifier resolved through the handler registry (with fallback).
    pub handler_id: String,
    /// Handler-owned configuration payload.
    #[serde(default)]
    pub config: Value,
}

impl ToolRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        handler_id: impl Into<String>,
        config: Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            handler_id: handler_id.into(),
            config,
        }
    }
}

/// A named configuration bundling an action, skills, knowledge sources, and
/// tools to run against a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Playbook {
    pub id: String,
    pub name: String,
    pub action_id: String,
    #[serde(default)]
    pub skill_ids: Vec<String>,
    #[serde(default)]
    pub knowledge_ids: Vec<String>,
    #[serde(default)]
    pub tool_ids: Vec<String>,
}

/// A persisted analysis: the unit of work the document-edit tool operates
/// on. Owned by the external document/analysis store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRecord {
    pub id: String,
    /// The current working document, when one has been produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_document: Option<String>,
    /// The final composed output of the pipeline run, when it finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_output: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            working_document: None,
            final_output: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_working_document(mut self, text: impl Into<String>) -> Self {
        self.working_document = Some(text.into());
        self
    }
}
