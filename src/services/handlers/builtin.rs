//! Built-in Analysis Handlers
//!
//! The specific handlers registered at startup: document summarization and
//! entity extraction. Extraction demonstrates tool composition by seeding
//! its prompt with a prior summary result when one is present in the run's
//! prior-results map.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use docstream_core::{
    require_document_text, AnalysisContext, CoreResult, ProgressSink, ToolDescriptor,
    ToolHandler, ToolResult, ValidationReport,
};
use docstream_llm::{CompletionSource, Message};

use crate::services::handlers::{generation_options, stream_to_sink};

pub const SUMMARY_HANDLER_ID: &str = "document-summary";
pub const EXTRACTION_HANDLER_ID: &str = "entity-extraction";

const ANALYST_SYSTEM_PROMPT: &str = "You are a document analyst.";

fn system_prompt_from(config: &Value) -> String {
    config
        .get("system_prompt")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(ANALYST_SYSTEM_PROMPT)
        .to_string()
}

// ============================================================================
// Document summary
// ============================================================================

pub struct DocumentSummaryHandler {
    source: Arc<dyn CompletionSource>,
    descriptor: ToolDescriptor,
}

impl DocumentSummaryHandler {
    pub fn new(source: Arc<dyn CompletionSource>) -> Self {
        let descriptor = ToolDescriptor::new(SUMMARY_HANDLER_ID, "Document Summary", "1.0.0")
            .with_tool_types(vec!["summary"]);
        Self { source, descriptor }
    }
}

#[async_trait]
impl ToolHandler for DocumentSummaryHandler {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn validate(&self, ctx: &AnalysisContext, _config: &Value) -> ValidationReport {
        require_document_text(ctx)
    }

    async fn execute(
        &self,
        ctx: &AnalysisContext,
        config: &Value,
        sink: &dyn ProgressSink,
    ) -> CoreResult<ToolResult> {
        let messages = vec![
            Message::system(system_prompt_from(config)),
            Message::user(format!(
                "Summarize the following document. Keep the summary factual and concise.\n\n\
                 Document '{}':\n{}",
                ctx.document.name, ctx.document.extracted_text
            )),
        ];

        let text = stream_to_sink(&*self.source, messages, generation_options(ctx), sink).await?;
        Ok(ToolResult::ok(
            SUMMARY_HANDLER_ID,
            json!({ "summary": text }),
            "Document summarized",
        ))
    }
}

// ============================================================================
// Entity extraction
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
struct ExtractionConfig {
    /// Query-level entity-type filter. Applied on top of whatever the
    /// resolved scope already narrowed; the two filters compose.
    #[serde(default)]
    entity_types: Vec<String>,
}

pub struct EntityExtractionHandler {
    source: Arc<dyn CompletionSource>,
    descriptor: ToolDescriptor,
}

impl EntityExtractionHandler {
    pub fn new(source: Arc<dyn CompletionSource>) -> Self {
        let descriptor = ToolDescriptor::new(EXTRACTION_HANDLER_ID, "Entity Extraction", "1.0.0")
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "entity_types": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Restrict extraction to these entity types"
                    }
                }
            }))
            .with_tool_types(vec!["extraction"]);
        Self { source, descriptor }
    }
}

#[async_trait]
impl ToolHandler for EntityExtractionHandler {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn validate(&self, ctx: &AnalysisContext, config: &Value) -> ValidationReport {
        let mut report = require_document_text(ctx);
        if serde_json::from_value::<ExtractionConfig>(config.clone()).is_err()
            && !config.is_null()
        {
            report = report.merge(ValidationReport::invalid(vec![
                "Invalid extraction configuration".to_string(),
            ]));
        }
        report
    }

    async fn execute(
        &self,
        ctx: &AnalysisContext,
        config: &Value,
        sink: &dyn ProgressSink,
    ) -> CoreResult<ToolResult> {
        let parsed: ExtractionConfig =
            serde_json::from_value(config.clone()).unwrap_or_default();

        let mut prompt = String::from("Extract the entities mentioned in the document.");
        if !parsed.entity_types.is_empty() {
            prompt.push_str(&format!(
                " Only report entities of these types: {}.",
                parsed.entity_types.join(", ")
            ));
        }
        // Tool composition: a summary produced earlier in the run narrows
        // the extraction prompt.
        if let Some(prior) = ctx.previous_results.get(SUMMARY_HANDLER_ID) {
            if let Some(summary) = prior.payload.get("summary").and_then(|v| v.as_str()) {
                prompt.push_str(&format!("\n\nDocument summary:\n{}", summary));
            }
        }
        prompt.push_str(&format!(
            "\n\nDocument '{}':\n{}",
            ctx.document.name, ctx.document.extracted_text
        ));

        let messages = vec![
            Message::system(system_prompt_from(config)),
            Message::user(prompt),
        ];

        let text = stream_to_sink(&*self.source, messages, generation_options(ctx), sink).await?;
        Ok(ToolResult::ok(
            EXTRACTION_HANDLER_ID,
            json!({ "entities_text": text, "entity_types": parsed.entity_types }),
            "Entities extracted",
        ))
    }
}
