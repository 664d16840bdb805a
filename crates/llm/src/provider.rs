//! Completion Source Trait
//!
//! Defines the seam to the generative-text model. The engine consumes the
//! model as an opaque streaming text source: a sequence of deltas pushed
//! into a channel, ending in completion, cancellation, or failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single conversation message sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Token usage reported by a completed (or interrupted) generation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Per-call generation options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GenerationOptions {
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

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Errors a completion source can raise.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Server error ({status:?}): {message}")]
    ServerError { message: String, status: Option<u16> },

    /// The stream was cancelled cooperatively. Downstream, cancellation is
    /// never classified as an error; consumers must branch on this variant
    /// before mapping to a protocol error code.
    #[error("Stream cancelled")]
    Cancelled,

    #[error("Stream interrupted: {message}")]
    StreamInterrupted { message: String },

    #[error("{message}")]
    Other { message: String },
}

impl LlmError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, LlmError::Cancelled)
    }
}

/// Result type alias for completion-source operations
pub type LlmResult<T> = Result<T, LlmError>;

/// An opaque streaming text source.
///
/// `stream_completion` pushes text deltas into the caller's channel as they
/// arrive, then returns the usage totals. A `Cancelled` error means the
/// stream stopped cooperatively; deltas already sent remain valid. Any
/// other error means the stream failed mid-flight.
#[async_trait]
pub trait CompletionSource: Send + Sync {
    /// Provider name for logging and identification.
    fn name(&self) -> &'static str;

    /// Stream a completion for the given messages.
    async fn stream_completion(
        &self,
        messages: Vec<Message>,
        options: GenerationOptions,
        tx: mpsc::Sender<String>,
    ) -> LlmResult<CompletionUsage>;
}
