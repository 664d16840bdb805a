//! Generic Analysis Handler
//!
//! The registry's designated fallback: a template-driven handler that can
//! service any tool type from a structured configuration (an operation name
//! plus a prompt template). A playbook referencing an unknown or removed
//! custom handler still executes through this handler, at reduced
//! specificity, instead of failing the analysis.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use docstream_core::{
    require_document_text, AnalysisContext, CoreError, CoreResult, ProgressSink, ToolDescriptor,
    ToolHandler, ToolResult, ValidationReport,
};
use docstream_llm::{CompletionSource, Message};

use crate::services::handlers::{generation_options, stream_to_sink};

/// Identifier under which the generic handler registers, and which the
/// registry designates as its fallback entry.
pub const GENERIC_HANDLER_ID: &str = "generic-analysis";

#[derive(Debug, Clone, Deserialize)]
struct GenericConfig {
    operation: String,
    /// Template with `{{document_text}}` and `{{operation}}` placeholders.
    prompt_template: String,
    #[serde(default)]
    system_prompt: Option<String>,
}

pub struct GenericAnalysisHandler {
    source: Arc<dyn CompletionSource>,
    descriptor: ToolDescriptor,
}

impl GenericAnalysisHandler {
    pub fn new(source: Arc<dyn CompletionSource>) -> Self {
        let descriptor = ToolDescriptor::new(GENERIC_HANDLER_ID, "Generic Analysis", "1.0.0")
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "operation": {
                        "type": "string",
                        "description": "Short name of the analysis operation"
                    },
                    "prompt_template": {
                        "type": "string",
                        "description": "Prompt with {{document_text}} and {{operation}} placeholders"
                    }
                },
                "required": ["operation", "prompt_template"]
            }))
            .with_tool_types(vec!["generic"]);
        Self { source, descriptor }
    }

    fn parse_config(config: &Value) -> Result<GenericConfig, String> {
        let parsed: GenericConfig = serde_json::from_value(config.clone())
            .map_err(|e| format!("Invalid generic tool configuration: {}", e))?;
        if parsed.operation.trim().is_empty() {
            return Err("Generic tool configuration requires an operation name".to_string());
        }
        if parsed.prompt_template.trim().is_empty() {
            return Err("Generic tool configuration requires a prompt template".to_string());
        }
        Ok(parsed)
    }
}

fn render_template(template: &str, operation: &str, document_text: &str) -> String {
    template
        .replace("{{document_text}}", document_text)
        .replace("{{operation}}", operation)
}

#[async_trait]
impl ToolHandler for GenericAnalysisHandler {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn validate(&self, ctx: &AnalysisContext, config: &Value) -> ValidationReport {
        let mut report = require_document_text(ctx);
        if let Err(message) = Self::parse_config(config) {
            report = report.merge(ValidationReport::invalid(vec![message]));
        }
        report
    }

    async fn execute(
        &self,
        ctx: &AnalysisContext,
        config: &Value,
        sink: &dyn ProgressSink,
    ) -> CoreResult<ToolResult> {
        let config = Self::parse_config(config).map_err(|e| CoreError::validation(e))?;
        let prompt = render_template(
            &config.prompt_template,
            &config.operation,
            &ctx.document.extracted_text,
        );

        let mut messages = Vec::new();
        if let Some(system) = config.system_prompt.filter(|s| !s.trim().is_empty()) {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(prompt));

        let text = stream_to_sink(&*self.source, messages, generation_options(ctx), sink).await?;
        Ok(ToolResult::ok(
            GENERIC_HANDLER_ID,
            json!({ "operation": config.operation, "text": text }),
            format!("Operation '{}' completed", config.operation),
        ))
    }
}
