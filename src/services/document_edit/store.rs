//! Analysis Store Collaborator
//!
//! The document-edit tool resolves its working document through this seam.
//! Missing ids answer `Ok(None)`; `Err` means the store was unreachable.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::models::AnalysisRecord;
use crate::services::records::StoreError;

/// Read-only access to persisted analyses.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn get_analysis(&self, id: &str) -> Result<Option<AnalysisRecord>, StoreError>;
}

/// In-memory analysis store for tests and embedded use.
#[derive(Default)]
pub struct InMemoryAnalyses {
    records: HashMap<String, AnalysisRecord>,
}

impl InMemoryAnalyses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_analysis(mut self, record: AnalysisRecord) -> Self {
        self.records.insert(record.id.clone(), record);
        self
    }
}

#[async_trait]
impl AnalysisStore for InMemoryAnalyses {
    async fn get_analysis(&self, id: &str) -> Result<Option<AnalysisRecord>, StoreError> {
        Ok(self.records.get(id).cloned())
    }
}
