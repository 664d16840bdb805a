//! Output Store Collaborator
//!
//! Persistence of tool outputs is an external concern; the pipeline only
//! needs to know whether the mapping was complete. A partial report turns
//! into the soft-failure `done` event: the analysis performed correctly,
//! secondary storage was incomplete.

use async_trait::async_trait;

use docstream_core::PriorResults;

use crate::services::records::StoreError;

/// How much of a run's output the store managed to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageReport {
    pub stored: usize,
    pub failed: usize,
}

impl StorageReport {
    pub fn complete(stored: usize) -> Self {
        Self { stored, failed: 0 }
    }

    pub fn partial(stored: usize, failed: usize) -> Self {
        Self { stored, failed }
    }

    pub fn is_partial(&self) -> bool {
        self.failed > 0
    }

    pub fn total(&self) -> usize {
        self.stored + self.failed
    }
}

/// Persists the results of a pipeline run.
#[async_trait]
pub trait OutputStore: Send + Sync {
    async fn store_outputs(
        &self,
        analysis_id: &str,
        results: &PriorResults,
    ) -> Result<StorageReport, StoreError>;
}

/// Output store that accepts everything without persisting. Useful when the
/// caller handles persistence elsewhere or for tests of the success path.
pub struct AcceptAllOutputs;

#[async_trait]
impl OutputStore for AcceptAllOutputs {
    async fn store_outputs(
        &self,
        _analysis_id: &str,
        results: &PriorResults,
    ) -> Result<StorageReport, StoreError> {
        Ok(StorageReport::complete(results.len()))
    }
}
