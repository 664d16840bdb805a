//! Built-in Tool Handlers
//!
//! Handler implementations registered into the `HandlerRegistry` once at
//! process start, plus the shared generation-streaming helper they use.

pub mod builtin;
pub mod generic;

use std::sync::Arc;

use tokio::sync::mpsc;

use docstream_core::{AnalysisContext, CoreError, CoreResult, HandlerRegistry, ProgressSink};
use docstream_llm::{CompletionSource, GenerationOptions, Message};

pub use builtin::{
    DocumentSummaryHandler, EntityExtractionHandler, EXTRACTION_HANDLER_ID, SUMMARY_HANDLER_ID,
};
pub use generic::{GenericAnalysisHandler, GENERIC_HANDLER_ID};

/// Build the startup registry: the built-in handlers plus the generic
/// fallback entry. Called once; the registry is read-only afterwards.
pub fn build_registry(source: Arc<dyn CompletionSource>) -> CoreResult<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(DocumentSummaryHandler::new(Arc::clone(&source))));
    registry.register(Arc::new(EntityExtractionHandler::new(Arc::clone(&source))));
    registry.register(Arc::new(GenericAnalysisHandler::new(source)));
    registry.set_fallback(GENERIC_HANDLER_ID)?;
    Ok(registry)
}

/// Map the run's generation parameters onto the provider seam.
pub(crate) fn generation_options(ctx: &AnalysisContext) -> GenerationOptions {
    GenerationOptions {
        max_tokens: ctx.params.max_tokens,
        temperature: ctx.params.temperature,
    }
}

/// Stream a completion, forwarding every delta to the sink and collecting
/// the full text. Usage totals are recorded on the sink when the stream
/// completes. Any source failure (including cancellation) surfaces as an
/// error for the pipeline to fold into a failed `ToolResult`.
pub(crate) async fn stream_to_sink(
    source: &dyn CompletionSource,
    messages: Vec<Message>,
    options: GenerationOptions,
    sink: &dyn ProgressSink,
) -> CoreResult<String> {
    let (tx, mut rx) = mpsc::channel::<String>(16);
    let stream = source.stream_completion(messages, options, tx);
    let forward = async {
        let mut text = String::new();
        while let Some(delta) = rx.recv().await {
            sink.emit_text(&delta).await?;
            text.push_str(&delta);
        }
        Ok::<String, CoreError>(text)
    };

    let (outcome, collected) = tokio::join!(stream, forward);
    let text = collected?;
    match outcome {
        Ok(usage) => {
            sink.record_usage(usage.input_tokens, usage.output_tokens);
            Ok(text)
        }
        Err(e) => Err(CoreError::internal(format!(
            "Generation stream failed: {}",
            e
        ))),
    }
}
