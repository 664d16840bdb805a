//! Replay Completion Source
//!
//! A deterministic `CompletionSource` that replays a scripted sequence of
//! deltas and then a scripted outcome. Used for engine dry-runs and as the
//! test double for every streaming code path: normal completion, mid-stream
//! cancellation, and mid-stream failure.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::provider::{
    CompletionSource, CompletionUsage, GenerationOptions, LlmError, LlmResult, Message,
};

/// How a replay ends after its deltas are exhausted.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayOutcome {
    /// Send every delta, then complete normally.
    Complete,
    /// Send `after` deltas, then signal cooperative cancellation.
    CancelAfter { after: usize },
    /// Send `after` deltas, then fail with the given raw provider message.
    FailAfter { after: usize, message: String },
}

/// Deterministic completion source replaying a fixed script.
pub struct ReplaySource {
    deltas: Vec<String>,
    outcome: ReplayOutcome,
    usage: CompletionUsage,
}

impl ReplaySource {
    pub fn new(deltas: Vec<&str>) -> Self {
        Self {
            deltas: deltas.into_iter().map(String::from).collect(),
            outcome: ReplayOutcome::Complete,
            usage: CompletionUsage::default(),
        }
    }

    pub fn with_outcome(mut self, outcome: ReplayOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_usage(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.usage = CompletionUsage {
            input_tokens,
            output_tokens,
        };
        self
    }

    /// Convenience: a source that cancels after sending all of `deltas`.
    pub fn cancelling(deltas: Vec<&str>) -> Self {
        let after = deltas.len();
        Self::new(deltas).with_outcome(ReplayOutcome::CancelAfter { after })
    }

    /// Convenience: a source that fails after sending all of `deltas`.
    pub fn failing(deltas: Vec<&str>, message: &str) -> Self {
        let after = deltas.len();
        Self::new(deltas).with_outcome(ReplayOutcome::FailAfter {
            after,
            message: message.to_string(),
        })
    }
}

#[async_trait]
impl CompletionSource for ReplaySource {
    fn name(&self) -> &'static str {
        "replay"
    }

    async fn stream_completion(
        &self,
        _messages: Vec<Message>,
        options: GenerationOptions,
        tx: mpsc::Sender<String>,
    ) -> LlmResult<CompletionUsage> {
        debug!(
            max_tokens = options.max_tokens,
            temperature = options.temperature,
            "replaying scripted completion"
        );
        let cutoff = match &self.outcome {
            ReplayOutcome::Complete => self.deltas.len(),
            ReplayOutcome::CancelAfter { after } | ReplayOutcome::FailAfter { after, .. } => {
                (*after).min(self.deltas.len())
            }
        };

        for delta in &self.deltas[..cutoff] {
            if tx.send(delta.clone()).await.is_err() {
                // Receiver dropped: the consumer stopped pulling, which is
                // cancellation from the source's point of view.
                debug!("replay receiver dropped, treating as cancellation");
                return Err(LlmError::Cancelled);
            }
        }

        match &self.outcome {
            ReplayOutcome::Complete => Ok(self.usage),
            ReplayOutcome::CancelAfter { .. } => Err(LlmError::Cancelled),
            ReplayOutcome::FailAfter { message, .. } => Err(LlmError::StreamInterrupted {
                message: message.clone(),
            }),
        }
    }
}
