//! Docstream Core
//!
//! Foundational types for the Docstream engine workspace. This crate has zero
//! dependencies on application-level code (transport, stores, LLM providers).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `events` - Streaming protocol event payloads (`StreamChunk`, `DocumentStreamEvent`)
//! - `context` - Per-run execution context (`AnalysisContext`, `ToolResult`, `PriorResults`)
//! - `handler` - Tool handler abstraction (`ToolHandler`, `HandlerRegistry`, `ProgressSink`)
//!
//! ## Design Principles
//!
//! 1. **Zero external dependencies beyond serde/async-trait/thiserror** - keeps build times minimal
//! 2. **Trait-based seams** - handlers and sinks are trait objects, mockable in tests
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod context;
pub mod error;
pub mod events;
pub mod handler;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Streaming Events ───────────────────────────────────────────────────
pub use events::{
    DocumentStreamEvent, OperationType, StreamChunk, StreamErrorCode, TargetPosition, TokenUsage,
};

// ── Execution Context ──────────────────────────────────────────────────
pub use context::{AnalysisContext, DocumentInfo, GenerationParams, PriorResults, ToolResult};

// ── Handler Abstraction ────────────────────────────────────────────────
pub use handler::{
    require_document_text, HandlerRegistry, ProgressSink, ToolDescriptor, ToolHandler,
    ValidationReport,
};
