//! Execution Context
//!
//! The per-run state threaded through the tool execution pipeline:
//!
//! 1. `DocumentInfo` - the target document (id, name, extracted text)
//! 2. `GenerationParams` - generation-model parameters for the run
//! 3. `ToolResult` - the immutable output of one handler invocation
//! 4. `PriorResults` - insertion-ordered results map for tool composition
//! 5. `AnalysisContext` - the run-scoped container owning all of the above
//!
//! An `AnalysisContext` is owned by exactly one pipeline run and discarded at
//! its end. Prior results are threaded forward by the pipeline's sequential
//! loop only, so no synchronization is needed inside a run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The document an analysis runs against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentInfo {
    pub id: String,
    pub name: String,
    /// Full extracted text. Handlers uniformly reject a document whose
    /// extracted text is empty; see `require_document_text`.
    pub extracted_text: String,
}

impl DocumentInfo {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        extracted_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            extracted_text: extracted_text.into(),
        }
    }
}

/// Generation-model parameters for one run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GenerationParams {
    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature (0.0 - 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// The immutable output of one handler invocation.
///
/// Stored into the run's prior-results map so downstream handlers can read
/// it. Never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    /// Identifier of the handler that produced this result.
    pub handler_id: String,
    pub success: bool,
    /// Structured payload, shape owned by the handler.
    pub payload: Value,
    /// Human-readable summary of the outcome.
    pub summary: String,
    /// Optional confidence score in [0.0, 1.0].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl ToolResult {
    pub fn ok(handler_id: impl Into<String>, payload: Value, summary: impl Into<String>) -> Self {
        Self {
            handler_id: handler_id.into(),
            success: true,
            payload,
            summary: summary.into(),
            confidence: None,
        }
    }

    pub fn failed(handler_id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            handler_id: handler_id.into(),
            success: false,
            payload: Value::Null,
            summary: summary.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Insertion-ordered map of handler identifier to `ToolResult`.
///
/// Append-only within a run. A later write for the same identifier replaces
/// the value in place, keeping the original position; the pipeline's
/// ordering guarantees each handler runs at most once per run, so in
/// practice this never triggers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PriorResults(Vec<(String, ToolResult)>);

impl PriorResults {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, handler_id: impl Into<String>, result: ToolResult) {
        let handler_id = handler_id.into();
        if let Some(slot) = self.0.iter_mut().find(|(id, _)| *id == handler_id) {
            slot.1 = result;
        } else {
            self.0.push((handler_id, result));
        }
    }

    pub fn get(&self, handler_id: &str) -> Option<&ToolResult> {
        self.0
            .iter()
            .find(|(id, _)| id == handler_id)
            .map(|(_, r)| r)
    }

    pub fn contains(&self, handler_id: &str) -> bool {
        self.get(handler_id).is_some()
    }

    /// Iterate results in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ToolResult)> {
        self.0.iter().map(|(id, r)| (id.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The run-scoped execution context.
///
/// Owned exclusively by one pipeline run; never shared across concurrent
/// runs.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    pub tenant_id: String,
    pub document: DocumentInfo,
    /// Results of handlers that already ran in this pipeline, in execution
    /// order. Later handlers read earlier results for composition.
    pub previous_results: PriorResults,
    pub params: GenerationParams,
}

impl AnalysisContext {
    pub fn new(tenant_id: impl Into<String>, document: DocumentInfo) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            document,
            previous_results: PriorResults::new(),
            params: GenerationParams::default(),
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }
}
