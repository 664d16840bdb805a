//! Document-Edit Streaming Tool
//!
//! Re-emits the generation model's deltas as a `DocumentStreamEvent`
//! sequence for two operations: "edit whole document" (replace/document)
//! and "append section" (insert/end). Callers always see a symmetric
//! start/end pair: when the working document cannot be resolved the tool
//! still opens the stream and immediately closes it with the stable
//! `NO_DOCUMENT` code. For append, a synthetic heading token derived from
//! the section title is emitted at index 0 ahead of any model output, so
//! the terminal token count includes it.

pub mod store;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use docstream_core::{
    CoreError, CoreResult, DocumentStreamEvent, OperationType, StreamErrorCode, TargetPosition,
};
use docstream_llm::{CompletionSource, GenerationOptions, Message};

use crate::services::document_edit::store::AnalysisStore;
use crate::services::streaming::TokenSequencer;

const EDIT_SYSTEM_PROMPT: &str =
    "You are a document editor. Apply the instruction to the working document and \
     return only the revised document text.";

const APPEND_SYSTEM_PROMPT: &str =
    "You are a document editor. Write the body of a new section for the working \
     document. Return only the section body, without the heading.";

/// Streams document edits produced by the generation model.
///
/// One service instance serves one conversation; the current analysis id
/// points at the working document being edited.
pub struct DocumentEditService {
    analyses: Arc<dyn AnalysisStore>,
    source: Arc<dyn CompletionSource>,
    analysis_id: Option<String>,
    options: GenerationOptions,
    cancel: CancellationToken,
}

impl DocumentEditService {
    pub fn new(analyses: Arc<dyn AnalysisStore>, source: Arc<dyn CompletionSource>) -> Self {
        Self {
            analyses,
            source,
            analysis_id: None,
            options: GenerationOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Override the generation options used for edits.
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Point the service at the analysis whose working document is edited.
    pub fn with_analysis_id(mut self, id: impl Into<String>) -> Self {
        self.analysis_id = Some(id.into());
        self
    }

    /// Attach a caller-owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Rewrite the whole working document according to `instruction`.
    ///
    /// An empty instruction is a validation error raised before any event;
    /// every later failure surfaces inside the stream.
    pub fn edit_document(
        &self,
        instruction: &str,
    ) -> CoreResult<ReceiverStream<DocumentStreamEvent>> {
        let instruction = require_instruction(instruction)?;
        Ok(self.run(
            TargetPosition::Document,
            OperationType::Replace,
            None,
            move |working| {
                vec![
                    Message::system(EDIT_SYSTEM_PROMPT),
                    Message::user(format!(
                        "Instruction: {}\n\nWorking document:\n{}",
                        instruction, working
                    )),
                ]
            },
        ))
    }

    /// Append a new titled section to the end of the working document.
    pub fn append_section(
        &self,
        title: &str,
        instruction: &str,
    ) -> CoreResult<ReceiverStream<DocumentStreamEvent>> {
        let instruction = require_instruction(instruction)?;
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(CoreError::validation("Section title must not be empty"));
        }
        let heading = section_heading(&title);
        Ok(self.run(
            TargetPosition::End,
            OperationType::Insert,
            Some(heading),
            move |working| {
                vec![
                    Message::system(APPEND_SYSTEM_PROMPT),
                    Message::user(format!(
                        "Section title: {}\nInstruction: {}\n\nWorking document:\n{}",
                        title, instruction, working
                    )),
                ]
            },
        ))
    }

    fn run<F>(
        &self,
        target: TargetPosition,
        operation: OperationType,
        heading: Option<String>,
        build_messages: F,
    ) -> ReceiverStream<DocumentStreamEvent>
    where
        F: FnOnce(&str) -> Vec<Message> + Send + 'static,
    {
        let (mut seq, stream) = TokenSequencer::channel();
        let analyses = Arc::clone(&self.analyses);
        let source = Arc::clone(&self.source);
        let analysis_id = self.analysis_id.clone();
        let options = self.options;
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            if seq.start(target, operation).await.is_err() {
                return;
            }

            let working = match resolve_working_document(&*analyses, analysis_id.as_deref()).await
            {
                Ok(text) => text,
                Err(message) => {
                    let _ = seq
                        .end_failed(StreamErrorCode::NoDocument, &message)
                        .await;
                    return;
                }
            };

            if let Some(heading) = heading {
                if seq.token(&heading).await.is_err() {
                    return;
                }
            }

            let messages = build_messages(&working);
            let (delta_tx, mut delta_rx) = mpsc::channel::<String>(16);
            let generation = tokio::spawn(async move {
                source.stream_completion(messages, options, delta_tx).await
            });

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        generation.abort();
                        let _ = seq.end_cancelled().await;
                        return;
                    }
                    delta = delta_rx.recv() => match delta {
                        Some(text) => {
                            if seq.token(&text).await.is_err() {
                                generation.abort();
                                return;
                            }
                        }
                        None => break,
                    }
                }
            }

            match generation.await {
                Ok(Ok(usage)) => {
                    debug!(
                        operation_id = %seq.operation_id(),
                        output_tokens = usage.output_tokens,
                        "generation stream completed"
                    );
                    let _ = seq.end_completed().await;
                }
                Ok(Err(e)) if e.is_cancellation() => {
                    let _ = seq.end_cancelled().await;
                }
                Ok(Err(e)) => {
                    // The raw provider error stays in the logs; the caller
                    // sees the stable code and a sanitized message.
                    error!(operation_id = %seq.operation_id(), error = %e, "generation stream failed");
                    let _ = seq
                        .end_failed(
                            StreamErrorCode::LlmStreamFailed,
                            "The generation model stream failed before the edit completed",
                        )
                        .await;
                }
                Err(e) => {
                    error!(operation_id = %seq.operation_id(), error = %e, "generation task aborted");
                    let _ = seq
                        .end_failed(
                            StreamErrorCode::LlmStreamFailed,
                            "The generation model stream failed before the edit completed",
                        )
                        .await;
                }
            }
        });

        stream
    }
}

/// Render a terminal event as a human-readable summary for the
/// conversational agent. Returns `None` for non-terminal events.
pub fn outcome_summary(event: &DocumentStreamEvent) -> Option<String> {
    match event {
        DocumentStreamEvent::End {
            cancelled: true,
            total_tokens,
            ..
        } => Some(format!("Edit cancelled after {} tokens.", total_tokens)),
        DocumentStreamEvent::End {
            error_code: Some(code),
            error_message,
            ..
        } => Some(format!(
            "Edit failed ({}): {}",
            code,
            error_message.as_deref().unwrap_or("no further details")
        )),
        DocumentStreamEvent::End { total_tokens, .. } => {
            Some(format!("Edit streamed {} tokens.", total_tokens))
        }
        _ => None,
    }
}

fn require_instruction(instruction: &str) -> CoreResult<String> {
    let trimmed = instruction.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation("Instruction must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn section_heading(title: &str) -> String {
    format!("## {}\n\n", title)
}

/// Resolve the current working document, mapping every miss to the message
/// that rides with the `NO_DOCUMENT` terminal code.
async fn resolve_working_document(
    analyses: &dyn AnalysisStore,
    analysis_id: Option<&str>,
) -> Result<String, String> {
    let Some(id) = analysis_id else {
        return Err("No analysis is associated with this session".to_string());
    };
    if id.trim().is_empty() {
        return Err("The analysis identifier is malformed".to_string());
    }
    let record = match analyses.get_analysis(id).await {
        Ok(found) => found,
        Err(e) => {
            warn!(analysis_id = id, error = %e, "analysis store unreachable");
            return Err("The analysis could not be loaded".to_string());
        }
    };
    let Some(record) = record else {
        return Err("The analysis was not found".to_string());
    };
    match record.working_document {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err("The analysis has no working document".to_string()),
    }
}
