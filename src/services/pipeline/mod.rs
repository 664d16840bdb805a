//! Tool Execution Pipeline
//!
//! Runs a playbook's tools against a document, threading prior results
//! forward, and streams progress as an ordered `StreamChunk` sequence:
//! `metadata` once, text deltas as tools produce them, then exactly one
//! terminal event. Business failures (missing playbook/document, all tools
//! failing) are encoded as terminal `error` events; the transport layer
//! always answers at success level. Partial output persistence is a soft
//! failure: the terminal event is still `done`, flagged with
//! `partialStorage` and an explanatory message.

pub mod storage;

use std::sync::Arc;

use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use docstream_core::{
    AnalysisContext, CoreError, CoreResult, DocumentInfo, HandlerRegistry, StreamChunk,
    ToolResult, ValidationReport,
};

use crate::models::ToolRecord;
use crate::services::pipeline::storage::OutputStore;
use crate::services::scope::{compose_system_prompt, ScopeResolver};
use crate::services::streaming::ChunkEmitter;

/// An incoming analysis request, validated before any streaming starts.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub playbook_id: String,
    pub document_ids: Vec<String>,
}

/// The tool execution pipeline.
///
/// Holds the read-only handler registry (populated once at startup) and the
/// collaborator seams. Each `execute*` call is an independent run with its
/// own context and event stream; runs share no mutable state.
pub struct AnalysisPipeline {
    registry: Arc<HandlerRegistry>,
    scopes: Arc<ScopeResolver>,
    outputs: Arc<dyn OutputStore>,
    /// Multi-document analysis is a fixed business-scope decision, off by
    /// default.
    multi_document: bool,
}

impl AnalysisPipeline {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        scopes: Arc<ScopeResolver>,
        outputs: Arc<dyn OutputStore>,
    ) -> Self {
        Self {
            registry,
            scopes,
            outputs,
            multi_document: false,
        }
    }

    pub fn with_multi_document(mut self, enabled: bool) -> Self {
        self.multi_document = enabled;
        self
    }

    /// Reject malformed requests before any streaming starts. These are
    /// client-visible validation failures, not protocol events.
    pub fn validate_request(&self, request: &AnalysisRequest) -> CoreResult<()> {
        if request.document_ids.is_empty() {
            return Err(CoreError::validation(
                "Analysis request must reference a document",
            ));
        }
        if request.document_ids.len() > 1 && !self.multi_document {
            return Err(CoreError::validation(
                "Multi-document analysis is not enabled for this request",
            ));
        }
        Ok(())
    }

    /// Synchronously validate a context against one tool's configuration,
    /// resolving the handler with fallback.
    pub fn validate(&self, ctx: &AnalysisContext, tool: &ToolRecord) -> ValidationReport {
        match self.registry.resolve(&tool.handler_id) {
            Ok(handler) => handler.validate(ctx, &tool.config),
            Err(e) => ValidationReport::invalid(vec![e.to_string()]),
        }
    }

    /// Execute tools against an already-built context. The returned stream
    /// is a lazy, single-pass sequence for exactly one consumer.
    pub fn execute(
        &self,
        context: AnalysisContext,
        tools: Vec<ToolRecord>,
    ) -> ReceiverStream<StreamChunk> {
        self.execute_cancellable(context, tools, CancellationToken::new())
    }

    /// `execute` with a caller-owned cancellation token. Cancellation is
    /// observed between tools; output already produced is retained and the
    /// run still closes with a terminal event.
    pub fn execute_cancellable(
        &self,
        context: AnalysisContext,
        tools: Vec<ToolRecord>,
        cancel: CancellationToken,
    ) -> ReceiverStream<StreamChunk> {
        let (emitter, stream) = ChunkEmitter::channel();
        let registry = Arc::clone(&self.registry);
        let outputs = Arc::clone(&self.outputs);

        tokio::spawn(async move {
            let analysis_id = Uuid::new_v4().to_string();
            if emitter
                .start(&analysis_id, &context.document.name)
                .await
                .is_err()
            {
                return;
            }
            run_tools(
                registry,
                outputs,
                &emitter,
                &analysis_id,
                context,
                tools,
                None,
                cancel,
            )
            .await;
        });

        stream
    }

    /// Full playbook flow: resolve the playbook's scope, compose the system
    /// prompt, and execute the scope's tools. A missing playbook or
    /// document ends the stream with a terminal `error` event; an
    /// unreachable records store degrades to an empty scope and the run
    /// continues.
    pub fn execute_playbook(
        &self,
        tenant_id: impl Into<String>,
        playbook_id: impl Into<String>,
        document: Option<DocumentInfo>,
        cancel: CancellationToken,
    ) -> ReceiverStream<StreamChunk> {
        let (emitter, stream) = ChunkEmitter::channel();
        let registry = Arc::clone(&self.registry);
        let scopes = Arc::clone(&self.scopes);
        let outputs = Arc::clone(&self.outputs);
        let tenant_id = tenant_id.into();
        let playbook_id = playbook_id.into();

        tokio::spawn(async move {
            let analysis_id = Uuid::new_v4().to_string();
            let document_name = document
                .as_ref()
                .map(|d| d.name.clone())
                .unwrap_or_default();
            if emitter.start(&analysis_id, &document_name).await.is_err() {
                return;
            }

            let Some(document) = document else {
                let _ = emitter.fail("Document not found").await;
                return;
            };

            // Missing playbook is terminal; an unreachable store is a soft
            // failure and the run continues with a degraded scope.
            let (action, scope) = match scopes.playbook(&playbook_id).await {
                Ok(Some(playbook)) => {
                    let action = scopes.get_action(&playbook.action_id).await;
                    if action.is_none() {
                        debug!(playbook_id = %playbook_id, "action missing, composing without base prompt");
                    }
                    let scope = scopes
                        .resolve_scopes(
                            &playbook.skill_ids,
                            &playbook.knowledge_ids,
                            &playbook.tool_ids,
                        )
                        .await;
                    (action, scope)
                }
                Ok(None) => {
                    let _ = emitter
                        .fail(&format!("Playbook not found: {}", playbook_id))
                        .await;
                    return;
                }
                Err(e) => {
                    warn!(playbook_id = %playbook_id, error = %e, "records store unreachable, continuing with empty scope");
                    (None, crate::services::scope::ResolvedScope::empty())
                }
            };

            let system_prompt = compose_system_prompt(action.as_ref(), &scope);
            let context = AnalysisContext::new(tenant_id, document);
            run_tools(
                registry,
                outputs,
                &emitter,
                &analysis_id,
                context,
                scope.tools,
                Some(system_prompt),
                cancel,
            )
            .await;
        });

        stream
    }
}

/// Merge the composed system prompt into a tool's configuration payload so
/// handlers see it alongside their own settings.
fn inject_system_prompt(config: &serde_json::Value, system_prompt: Option<&str>) -> serde_json::Value {
    let Some(prompt) = system_prompt.filter(|p| !p.is_empty()) else {
        return config.clone();
    };
    match config {
        serde_json::Value::Object(map) => {
            let mut merged = map.clone();
            merged.insert(
                "system_prompt".to_string(),
                serde_json::Value::String(prompt.to_string()),
            );
            serde_json::Value::Object(merged)
        }
        serde_json::Value::Null => serde_json::json!({ "system_prompt": prompt }),
        other => other.clone(),
    }
}

/// The sequential tool loop: resolve (with fallback), validate, execute,
/// append the result for downstream tools, then persist and terminate.
#[allow(clippy::too_many_arguments)]
async fn run_tools(
    registry: Arc<HandlerRegistry>,
    outputs: Arc<dyn OutputStore>,
    emitter: &ChunkEmitter,
    analysis_id: &str,
    mut context: AnalysisContext,
    tools: Vec<ToolRecord>,
    system_prompt: Option<String>,
    cancel: CancellationToken,
) {
    let total = tools.len();
    let mut succeeded = 0usize;

    for tool in tools {
        if cancel.is_cancelled() {
            info!(analysis_id, "run cancelled, skipping remaining tools");
            break;
        }

        let handler = match registry.resolve(&tool.handler_id) {
            Ok(handler) => handler,
            Err(e) => {
                error!(analysis_id, handler_id = %tool.handler_id, error = %e, "registry has no fallback");
                let _ = emitter
                    .fail(&format!("No handler available for tool '{}'", tool.name))
                    .await;
                return;
            }
        };
        if !registry.is_available(&tool.handler_id) {
            warn!(
                analysis_id,
                requested = %tool.handler_id,
                fallback = %handler.descriptor().id,
                "handler not registered, using generic fallback"
            );
        }
        let handler_id = handler.descriptor().id.clone();

        let config = inject_system_prompt(&tool.config, system_prompt.as_deref());

        let report = handler.validate(&context, &config);
        if !report.is_valid {
            let summary = format!("Validation failed: {}", report.errors.join("; "));
            warn!(analysis_id, handler_id = %handler_id, %summary, "tool skipped");
            context
                .previous_results
                .insert(handler_id.clone(), ToolResult::failed(handler_id, summary));
            continue;
        }

        match handler.execute(&context, &config, emitter).await {
            Ok(result) => {
                if result.success {
                    succeeded += 1;
                }
                context
                    .previous_results
                    .insert(result.handler_id.clone(), result);
            }
            Err(e) => {
                warn!(analysis_id, handler_id = %handler_id, error = %e, "tool execution failed");
                context.previous_results.insert(
                    handler_id.clone(),
                    ToolResult::failed(handler_id, format!("Tool execution failed: {}", e)),
                );
            }
        }
    }

    if total > 0 && succeeded == 0 && !cancel.is_cancelled() {
        let _ = emitter.fail("All tools failed to produce a result").await;
        return;
    }

    match outputs
        .store_outputs(analysis_id, &context.previous_results)
        .await
    {
        Ok(report) if report.is_partial() => {
            let message = format!(
                "{} of {} tool outputs saved; storage mapping was incomplete",
                report.stored,
                report.total()
            );
            warn!(analysis_id, %message, "partial output storage");
            let _ = emitter.done_partial(&message).await;
        }
        Ok(_) => {
            let _ = emitter.done().await;
        }
        Err(e) => {
            warn!(analysis_id, error = %e, "output storage failed entirely");
            let message = format!(
                "0 of {} tool outputs saved; storage mapping was incomplete",
                context.previous_results.len()
            );
            let _ = emitter.done_partial(&message).await;
        }
    }
}
