//! Docstream LLM
//!
//! The generation-model seam for the Docstream engine. The engine consumes
//! the model as an opaque streaming text source (`CompletionSource`); real
//! vendor integrations live behind this trait in downstream crates. This
//! crate ships the trait, its message and error types, and `ReplaySource`,
//! a deterministic source for dry-runs and tests.

pub mod provider;
pub mod replay;

// Re-export main types
pub use provider::{
    CompletionSource, CompletionUsage, GenerationOptions, LlmError, LlmResult, Message,
    MessageRole,
};
pub use replay::{ReplayOutcome, ReplaySource};
