//! Engine Services
//!
//! The service layer of the engine: scope resolution, the tool execution
//! pipeline, the streaming sequencer, the document-edit tool, built-in
//! handlers, and the collaborator seams to external stores.

pub mod document_edit;
pub mod handlers;
pub mod pipeline;
pub mod records;
pub mod scope;
pub mod streaming;
