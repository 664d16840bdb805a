//! Docstream Engine
//!
//! An AI document-analysis execution core: dispatches configured analysis
//! tools against a document, composes their outputs, and streams progress
//! and results to the caller as an ordered event sequence with explicit
//! cancellation and failure semantics.
//!
//! The engine deliberately stops at its seams: HTTP transport, record
//! persistence, retrieval indexes, and the generation model itself are
//! collaborators behind traits (`RecordsResolver`, `OutputStore`,
//! `AnalysisStore`, `CompletionSource`).

pub mod models;
pub mod services;

// Re-export the main entry points
pub use services::document_edit::{outcome_summary, DocumentEditService};
pub use services::handlers::build_registry;
pub use services::pipeline::{AnalysisPipeline, AnalysisRequest};
pub use services::scope::{compose_system_prompt, ResolvedScope, ScopeResolver};

// Re-export the protocol types callers consume
pub use docstream_core::{
    AnalysisContext, DocumentInfo, DocumentStreamEvent, GenerationParams, HandlerRegistry,
    OperationType, PriorResults, StreamChunk, StreamErrorCode, TargetPosition, TokenUsage,
    ToolDescriptor, ToolResult,
};
