//! Integration Tests Module
//!
//! Cross-service tests for the Docstream engine. Covers the streaming
//! protocol invariants, scope resolution and prompt composition, the tool
//! execution pipeline (fallback, composition, soft failure), and the
//! document-edit streaming tool.

// Event payload shapes and protocol invariants
mod protocol_test;

// Scope resolution and system prompt composition
mod scope_test;

// Tool execution pipeline flows
mod pipeline_test;
