//! Scope Resolution Service
//!
//! Resolves playbook configuration references into records partitioned by
//! delivery mode, and composes the run's system prompt from the result.

pub mod prompt;
pub mod resolver;

pub use prompt::compose_system_prompt;
pub use resolver::{ResolvedScope, ScopeResolver};
