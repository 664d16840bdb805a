//! Streaming Sequencer
//!
//! The ordering machinery shared by both event producers. A run moves
//! through Idle → Started → Streaming → Terminal; these types make the
//! transitions explicit and refuse anything out of order:
//!
//! - `ChunkEmitter` - pipeline-level events (`metadata`, `chunk`, `done`/`error`)
//! - `TokenSequencer` - document-edit events (`start`, `token`, `end`)
//!
//! Events flow through a bounded channel of capacity 1, so the producer
//! suspends at each send until the consumer has pulled the previous event;
//! nothing is buffered speculatively ahead of the consumer's read. After a
//! terminal event both types drop further emissions with a warning rather
//! than corrupting the sequence.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};
use uuid::Uuid;

use docstream_core::{
    CoreError, CoreResult, DocumentStreamEvent, OperationType, ProgressSink, StreamChunk,
    StreamErrorCode, TargetPosition, TokenUsage,
};

/// One event in flight at a time; the producer waits for the consumer.
pub const EVENT_CHANNEL_CAPACITY: usize = 1;

// ============================================================================
// ChunkEmitter
// ============================================================================

#[derive(Debug, Default)]
struct ChunkState {
    started: bool,
    terminated: bool,
    usage: TokenUsage,
}

/// Pipeline-level event emitter.
///
/// Emits `metadata` exactly once, forwards text deltas, accumulates token
/// usage, and closes the run with exactly one terminal event. State lives
/// behind a `Mutex` because the emitter is also handed to handlers as a
/// shared `&dyn ProgressSink`; the guard is never held across an await.
pub struct ChunkEmitter {
    tx: mpsc::Sender<StreamChunk>,
    state: Mutex<ChunkState>,
}

impl ChunkEmitter {
    /// Create an emitter and the consumer's stream.
    pub fn channel() -> (Self, ReceiverStream<StreamChunk>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (
            Self {
                tx,
                state: Mutex::new(ChunkState::default()),
            },
            ReceiverStream::new(rx),
        )
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChunkState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn send(&self, event: StreamChunk) -> CoreResult<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| CoreError::channel("event receiver dropped"))
    }

    /// Emit the `metadata` event. Exactly one per run; duplicates are
    /// dropped with a warning.
    pub async fn start(&self, analysis_id: &str, document_name: &str) -> CoreResult<()> {
        {
            let mut state = self.lock();
            if state.terminated {
                warn!("start requested after terminal event, dropping");
                return Ok(());
            }
            if state.started {
                warn!("metadata already emitted, dropping duplicate start");
                return Ok(());
            }
            state.started = true;
        }
        self.send(StreamChunk::metadata(analysis_id, document_name))
            .await
    }

    /// Emit a free-text delta. Empty deltas are filtered.
    pub async fn text(&self, text: &str) -> CoreResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        {
            let state = self.lock();
            if !state.started || state.terminated {
                warn!("text delta outside Started..Terminal window, dropping");
                return Ok(());
            }
        }
        self.send(StreamChunk::chunk(text)).await
    }

    /// Accumulate generation-model token usage into the run totals.
    pub fn record_usage(&self, input: u64, output: u64) {
        self.lock().usage.add(TokenUsage::new(input, output));
    }

    pub fn usage(&self) -> TokenUsage {
        self.lock().usage
    }

    async fn finish(&self, event: StreamChunk) -> CoreResult<()> {
        {
            let mut state = self.lock();
            if state.terminated {
                warn!("terminal event already emitted, dropping");
                return Ok(());
            }
            if !state.started {
                warn!("terminal event before metadata");
            }
            state.terminated = true;
        }
        self.send(event).await
    }

    /// Terminal: full success.
    pub async fn done(&self) -> CoreResult<()> {
        let usage = self.usage();
        self.finish(StreamChunk::done(usage)).await
    }

    /// Terminal: success with incomplete secondary storage (soft failure).
    pub async fn done_partial(&self, storage_message: &str) -> CoreResult<()> {
        let usage = self.usage();
        self.finish(StreamChunk::done_partial(usage, storage_message))
            .await
    }

    /// Terminal: business failure, encoded as an event rather than an error
    /// at the transport level.
    pub async fn fail(&self, message: &str) -> CoreResult<()> {
        self.finish(StreamChunk::error(message)).await
    }
}

#[async_trait::async_trait]
impl ProgressSink for ChunkEmitter {
    async fn emit_text(&self, text: &str) -> CoreResult<()> {
        self.text(text).await
    }

    fn record_usage(&self, input: u64, output: u64) {
        self.lock().usage.add(TokenUsage::new(input, output));
    }
}

// ============================================================================
// TokenSequencer
// ============================================================================

/// Document-edit event sequencer.
///
/// Owns the operation identifier and the zero-based token index. Empty
/// tokens are filtered and never advance the index. Owned by a single
/// producer task, so state is plain fields behind `&mut`.
pub struct TokenSequencer {
    tx: mpsc::Sender<DocumentStreamEvent>,
    operation_id: String,
    started: bool,
    terminated: bool,
    next_index: u64,
}

impl TokenSequencer {
    /// Create a sequencer and the consumer's stream with a fresh operation
    /// identifier.
    pub fn channel() -> (Self, ReceiverStream<DocumentStreamEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (
            Self {
                tx,
                operation_id: Uuid::new_v4().to_string(),
                started: false,
                terminated: false,
                next_index: 0,
            },
            ReceiverStream::new(rx),
        )
    }

    /// The correlation identifier carried by every event of this operation.
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Count of tokens emitted so far.
    pub fn emitted(&self) -> u64 {
        self.next_index
    }

    async fn send(&self, event: DocumentStreamEvent) -> CoreResult<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| CoreError::channel("event receiver dropped"))
    }

    /// Emit the `start` event. Exactly one per operation.
    pub async fn start(
        &mut self,
        target: TargetPosition,
        operation: OperationType,
    ) -> CoreResult<()> {
        if self.started || self.terminated {
            warn!(operation_id = %self.operation_id, "duplicate start, dropping");
            return Ok(());
        }
        self.started = true;
        self.send(DocumentStreamEvent::start(
            &self.operation_id,
            target,
            operation,
        ))
        .await
    }

    /// Emit a token at the next index. Returns `false` when the token was
    /// filtered (empty text) and the index did not advance.
    pub async fn token(&mut self, text: &str) -> CoreResult<bool> {
        if text.is_empty() {
            debug!(operation_id = %self.operation_id, "empty token filtered");
            return Ok(false);
        }
        if !self.started || self.terminated {
            warn!(operation_id = %self.operation_id, "token outside Started..Terminal window, dropping");
            return Ok(false);
        }
        let index = self.next_index;
        self.next_index += 1;
        self.send(DocumentStreamEvent::token(&self.operation_id, text, index))
            .await?;
        Ok(true)
    }

    fn close(&mut self) -> bool {
        if self.terminated {
            warn!(operation_id = %self.operation_id, "terminal event already emitted, dropping");
            return false;
        }
        if !self.started {
            warn!(operation_id = %self.operation_id, "terminal event before start");
        }
        self.terminated = true;
        true
    }

    /// Terminal: the content source completed normally.
    pub async fn end_completed(&mut self) -> CoreResult<()> {
        if !self.close() {
            return Ok(());
        }
        self.send(DocumentStreamEvent::completed(
            &self.operation_id,
            self.next_index,
        ))
        .await
    }

    /// Terminal: cancelled mid-stream. Tokens already emitted stay counted.
    pub async fn end_cancelled(&mut self) -> CoreResult<()> {
        if !self.close() {
            return Ok(());
        }
        self.send(DocumentStreamEvent::cancelled(
            &self.operation_id,
            self.next_index,
        ))
        .await
    }

    /// Terminal: the content source failed with a stable code.
    pub async fn end_failed(&mut self, code: StreamErrorCode, message: &str) -> CoreResult<()> {
        if !self.close() {
            return Ok(());
        }
        self.send(DocumentStreamEvent::failed(
            &self.operation_id,
            self.next_index,
            code,
            message,
        ))
        .await
    }
}
