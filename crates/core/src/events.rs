//! Streaming Protocol Events
//!
//! Event payload shapes shared by the two streaming producers: the analysis
//! pipeline (`StreamChunk`) and the document-edit tool (`DocumentStreamEvent`).
//! The engine does not define a wire format; an external transport serializes
//! these one-per-line. Field names here ARE the payload contract, so every
//! variant pins its serde names explicitly.
//!
//! Ordering rules enforced by the producers (see the engine's streaming
//! sequencer): exactly one start-class event first, exactly one terminal
//! event last, nothing after a terminal, and zero-based strictly increasing
//! content indices.

use serde::{Deserialize, Serialize};

/// Token usage totals carried by a terminal `done` event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self { input, output }
    }

    /// Accumulate usage from another generation call within the same run.
    pub fn add(&mut self, other: TokenUsage) {
        self.input = self.input.saturating_add(other.input);
        self.output = self.output.saturating_add(other.output);
    }
}

/// Stable, enumerable terminal error codes for document-edit operations.
///
/// Raw provider errors never reach the caller; they are mapped to one of
/// these codes plus a sanitized message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamErrorCode {
    /// No working document could be resolved for the operation.
    NoDocument,
    /// The generation-model stream failed before completing.
    LlmStreamFailed,
}

impl std::fmt::Display for StreamErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamErrorCode::NoDocument => write!(f, "NO_DOCUMENT"),
            StreamErrorCode::LlmStreamFailed => write!(f, "LLM_STREAM_FAILED"),
        }
    }
}

/// Pipeline-level stream event.
///
/// Exactly one `Metadata` opens a run, zero or more `Chunk`s follow, and
/// exactly one of `Done`/`Error` closes it. `Done` may carry soft-failure
/// fields: the analysis succeeded but secondary storage of outputs was
/// incomplete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Run identification, emitted exactly once and first.
    #[serde(rename_all = "camelCase")]
    Metadata {
        analysis_id: String,
        document_name: String,
    },

    /// Free-text delta produced by a tool or a generation call.
    Chunk { text: String },

    /// Terminal success.
    #[serde(rename_all = "camelCase")]
    Done {
        done: bool,
        token_usage: TokenUsage,
        #[serde(skip_serializing_if = "Option::is_none")]
        partial_storage: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        storage_message: Option<String>,
    },

    /// Terminal failure. Mutually exclusive with `Done`.
    Error { done: bool, error: String },
}

impl StreamChunk {
    pub fn metadata(analysis_id: impl Into<String>, document_name: impl Into<String>) -> Self {
        Self::Metadata {
            analysis_id: analysis_id.into(),
            document_name: document_name.into(),
        }
    }

    pub fn chunk(text: impl Into<String>) -> Self {
        Self::Chunk { text: text.into() }
    }

    /// Full success: no soft-failure fields, empty storage message.
    pub fn done(token_usage: TokenUsage) -> Self {
        Self::Done {
            done: true,
            token_usage,
            partial_storage: None,
            storage_message: None,
        }
    }

    /// Soft failure: the analysis succeeded but output storage was partial.
    /// The message must explain what was and was not saved.
    pub fn done_partial(token_usage: TokenUsage, storage_message: impl Into<String>) -> Self {
        Self::Done {
            done: true,
            token_usage,
            partial_storage: Some(true),
            storage_message: Some(storage_message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            done: true,
            error: message.into(),
        }
    }

    /// Whether this event ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

/// Target position of a document-edit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPosition {
    /// The whole working document.
    Document,
    /// Appended after the current end of the document.
    End,
    /// A caller-provided selection range.
    Selection,
}

/// Kind of edit applied at the target position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Insert,
    Replace,
    Diff,
}

/// Document-edit stream event.
///
/// One `Start` opens an operation, zero or more `Token`s follow with
/// zero-based strictly increasing indices, and exactly one `End` closes it.
/// `End` is never simultaneously cancelled and errored; use the
/// constructors, which make that state unrepresentable at call sites.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum DocumentStreamEvent {
    #[serde(rename = "document_stream_start", rename_all = "camelCase")]
    Start {
        operation_id: String,
        target_position: TargetPosition,
        operation_type: OperationType,
    },

    #[serde(rename = "document_stream_token", rename_all = "camelCase")]
    Token {
        operation_id: String,
        token: String,
        index: u64,
    },

    #[serde(rename = "document_stream_end", rename_all = "camelCase")]
    End {
        operation_id: String,
        cancelled: bool,
        total_tokens: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_code: Option<StreamErrorCode>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
}

impl DocumentStreamEvent {
    pub fn start(
        operation_id: impl Into<String>,
        target_position: TargetPosition,
        operation_type: OperationType,
    ) -> Self {
        Self::Start {
            operation_id: operation_id.into(),
            target_position,
            operation_type,
        }
    }

    pub fn token(operation_id: impl Into<String>, token: impl Into<String>, index: u64) -> Self {
        Self::Token {
            operation_id: operation_id.into(),
            token: token.into(),
            index,
        }
    }

    /// Terminal: the content source completed normally.
    pub fn completed(operation_id: impl Into<String>, total_tokens: u64) -> Self {
        Self::End {
            operation_id: operation_id.into(),
            cancelled: false,
            total_tokens,
            error_code: None,
            error_message: None,
        }
    }

    /// Terminal: the run was cancelled mid-stream. Cancellation is not an
    /// error; the tokens already emitted remain valid.
    pub fn cancelled(operation_id: impl Into<String>, total_tokens: u64) -> Self {
        Self::End {
            operation_id: operation_id.into(),
            cancelled: true,
            total_tokens,
            error_code: None,
            error_message: None,
        }
    }

    /// Terminal: the content source failed. Carries a stable code and a
    /// sanitized message, never the raw provider error.
    pub fn failed(
        operation_id: impl Into<String>,
        total_tokens: u64,
        code: StreamErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self::End {
            operation_id: operation_id.into(),
            cancelled: false,
            total_tokens,
            error_code: Some(code),
            error_message: Some(message.into()),
        }
    }

    /// Whether this event ends the operation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End { .. })
    }

    /// The correlation identifier shared by all events of one operation.
    pub fn operation_id(&self) -> &str {
        match self {
            Self::Start { operation_id, .. }
            | Self::Token { operation_id, .. }
            | Self::End { operation_id, .. } => operation_id,
        }
    }
}
