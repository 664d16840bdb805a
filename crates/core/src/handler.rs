//! Tool Handler Trait and Registry
//!
//! Defines the pluggable analysis-tool abstraction:
//!
//! - `ToolDescriptor` - Identity, display metadata, parameter schema, type tags
//! - `ToolHandler` - Validation + execution capability
//! - `ProgressSink` - The handler's view of the run's event stream
//! - `HandlerRegistry` - Case-insensitive lookup with generic-handler fallback
//!
//! The registry is populated once at process start and never mutated
//! afterwards, so concurrent `&self` lookups need no locking. Its core
//! design decision is the fallback entry: a playbook referencing an unknown
//! or removed handler identifier still executes through the designated
//! generic handler, at reduced specificity, instead of failing the run.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::{AnalysisContext, ToolResult};
use crate::error::{CoreError, CoreResult};

// ============================================================================
// Descriptor & Validation
// ============================================================================

/// Display metadata and identity of a registered handler.
///
/// Immutable once registered. The identifier is matched case-insensitively.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolDescriptor {
    /// Unique handler identifier (e.g. "document-summary").
    pub id: String,
    /// Human-readable name.
    pub name: String,
    pub version: String,
    /// JSON schema describing the handler's configuration payload.
    pub parameter_schema: Value,
    /// Tool-type tags this handler services (e.g. "summary", "extraction").
    pub tool_types: Vec<String>,
}

impl ToolDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            parameter_schema: serde_json::json!({ "type": "object" }),
            tool_types: Vec::new(),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.parameter_schema = schema;
        self
    }

    pub fn with_tool_types(mut self, types: Vec<&str>) -> Self {
        self.tool_types = types.into_iter().map(String::from).collect();
        self
    }

    /// Whether this handler services the given tool-type tag.
    pub fn has_type(&self, tag: &str) -> bool {
        self.tool_types.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Outcome of validating a context + tool configuration pair.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
        }
    }

    /// Combine two reports; the result is valid only if both are.
    pub fn merge(mut self, other: ValidationReport) -> Self {
        self.is_valid = self.is_valid && other.is_valid;
        self.errors.extend(other.errors);
        self
    }
}

/// Uniform precondition applied by every handler's `validate`: a document
/// with empty extracted text is rejected.
pub fn require_document_text(ctx: &AnalysisContext) -> ValidationReport {
    if ctx.document.extracted_text.trim().is_empty() {
        ValidationReport::invalid(vec![format!(
            "Document '{}' has no extracted text",
            ctx.document.name
        )])
    } else {
        ValidationReport::valid()
    }
}

// ============================================================================
// Handler traits
// ============================================================================

/// The handler's view of the run's event stream.
///
/// Handlers push free-text deltas and report generation-model token usage
/// through this sink; the pipeline's emitter implements it and owns the
/// ordering rules. Methods take `&self` because one sink is shared across
/// the sequential handler invocations of a run.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Emit a free-text delta to the run's event stream.
    async fn emit_text(&self, text: &str) -> CoreResult<()>;

    /// Accumulate generation-model token usage into the run totals.
    fn record_usage(&self, input: u64, output: u64);
}

/// A pluggable analysis tool.
///
/// Each handler validates a context/configuration pair and executes one
/// tool against the run's document, optionally streaming text through the
/// sink. Execution returns a `ToolResult` that the pipeline stores for
/// downstream handlers.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    /// Validate the context against this handler's configuration payload.
    ///
    /// Every implementation must apply `require_document_text`.
    fn validate(&self, ctx: &AnalysisContext, config: &Value) -> ValidationReport;

    /// Execute the tool. Streamed text goes through `sink`; the structured
    /// outcome is the returned `ToolResult`.
    async fn execute(
        &self,
        ctx: &AnalysisContext,
        config: &Value,
        sink: &dyn ProgressSink,
    ) -> CoreResult<ToolResult>;
}

// ============================================================================
// HandlerRegistry
// ============================================================================

/// Registry of available tool handlers.
///
/// Lookup is case-insensitive. `resolve` never reports "not found" to the
/// pipeline: an unknown identifier falls back to the designated generic
/// handler.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    /// Insertion order of lowercased ids for deterministic iteration.
    order: Vec<String>,
    /// Lowercased id of the designated fallback handler.
    fallback_id: Option<String>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            order: Vec::new(),
            fallback_id: None,
        }
    }

    /// Register a handler. Replaces any existing handler with the same
    /// (case-insensitive) identifier.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let key = handler.descriptor().id.to_lowercase();
        if !self.handlers.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.handlers.insert(key, handler);
    }

    /// Designate the fallback handler for unknown identifiers.
    ///
    /// The handler must already be registered.
    pub fn set_fallback(&mut self, id: &str) -> CoreResult<()> {
        let key = id.to_lowercase();
        if !self.handlers.contains_key(&key) {
            return Err(CoreError::config(format!(
                "Fallback handler is not registered: {}",
                id
            )));
        }
        self.fallback_id = Some(key);
        Ok(())
    }

    /// Look up a handler by identifier, case-insensitively.
    pub fn lookup(&self, id: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(&id.to_lowercase()).cloned()
    }

    /// Look up with fallback: an unknown identifier resolves to the generic
    /// handler rather than "not found". Errs only when no fallback has been
    /// designated, which is a startup wiring mistake.
    pub fn resolve(&self, id: &str) -> CoreResult<Arc<dyn ToolHandler>> {
        if let Some(handler) = self.lookup(id) {
            return Ok(handler);
        }
        self.fallback_id
            .as_ref()
            .and_then(|key| self.handlers.get(key).cloned())
            .ok_or_else(|| {
                CoreError::config(format!(
                    "No handler registered for '{}' and no fallback designated",
                    id
                ))
            })
    }

    pub fn is_available(&self, id: &str) -> bool {
        self.handlers.contains_key(&id.to_lowercase())
    }

    /// All descriptors in registration order.
    pub fn list_all(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|key| self.handlers.get(key))
            .map(|h| h.descriptor().clone())
            .collect()
    }

    /// All handlers servicing the given tool-type tag, in registration order.
    pub fn by_type(&self, tag: &str) -> Vec<Arc<dyn ToolHandler>> {
        self.order
            .iter()
            .filter_map(|key| self.handlers.get(key))
            .filter(|h| h.descriptor().has_type(tag))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
