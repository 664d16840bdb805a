//! Tool Execution Pipeline Integration Tests
//!
//! End-to-end pipeline flows: event ordering, generic-handler fallback,
//! tool composition through prior results, soft-failure storage, and the
//! terminal error paths for missing records.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use docstream_engine::models::{Action, Playbook, ToolRecord};
use docstream_engine::services::pipeline::storage::{
    AcceptAllOutputs, OutputStore, StorageReport,
};
use docstream_engine::services::records::{InMemoryRecords, RecordsResolver, StoreError};
use docstream_engine::{
    build_registry, AnalysisContext, AnalysisPipeline, AnalysisRequest, DocumentInfo,
    PriorResults, ScopeResolver, StreamChunk,
};
use docstream_llm::ReplaySource;

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn make_document() -> DocumentInfo {
    DocumentInfo::new("doc-1", "contract.pdf", "The parties agree to the terms.")
}

fn records_with_playbook(tools: Vec<ToolRecord>) -> InMemoryRecords {
    let tool_ids: Vec<String> = tools.iter().map(|t| t.id.clone()).collect();
    let mut records = InMemoryRecords::new()
        .with_action(Action::new("act-1", "Review", "You review legal documents."));
    for tool in tools {
        records = records.with_tool(tool);
    }
    records.with_playbook(Playbook {
        id: "pb-1".to_string(),
        name: "Contract review".to_string(),
        action_id: "act-1".to_string(),
        skill_ids: vec![],
        knowledge_ids: vec![],
        tool_ids,
    })
}

fn summary_tool() -> ToolRecord {
    ToolRecord::new("tl-1", "Summary", "document-summary", serde_json::json!({}))
}

fn extraction_tool() -> ToolRecord {
    ToolRecord::new(
        "tl-2",
        "Entities",
        "entity-extraction",
        serde_json::json!({ "entity_types": ["organization"] }),
    )
}

fn make_pipeline(
    records: InMemoryRecords,
    outputs: Arc<dyn OutputStore>,
    deltas: Vec<&str>,
) -> AnalysisPipeline {
    let source = Arc::new(ReplaySource::new(deltas).with_usage(50, 10));
    let registry = Arc::new(build_registry(source).unwrap());
    let scopes = Arc::new(ScopeResolver::new(Arc::new(records)));
    AnalysisPipeline::new(registry, scopes, outputs)
}

async fn run_playbook(pipeline: &AnalysisPipeline) -> Vec<StreamChunk> {
    pipeline
        .execute_playbook(
            "tenant-1",
            "pb-1",
            Some(make_document()),
            CancellationToken::new(),
        )
        .collect()
        .await
}

// ============================================================================
// Collaborator test doubles
// ============================================================================

/// Output store reporting partial persistence.
struct PartialOutputs;

#[async_trait]
impl OutputStore for PartialOutputs {
    async fn store_outputs(
        &self,
        _analysis_id: &str,
        results: &PriorResults,
    ) -> Result<StorageReport, StoreError> {
        let total = results.len();
        Ok(StorageReport::partial(total.saturating_sub(1), 1))
    }
}

/// Output store capturing the results it was asked to persist.
#[derive(Default)]
struct RecordingOutputs {
    seen: Mutex<Option<PriorResults>>,
}

#[async_trait]
impl OutputStore for RecordingOutputs {
    async fn store_outputs(
        &self,
        _analysis_id: &str,
        results: &PriorResults,
    ) -> Result<StorageReport, StoreError> {
        *self.seen.lock().unwrap() = Some(results.clone());
        Ok(StorageReport::complete(results.len()))
    }
}

/// Records store that is always unreachable.
struct UnreachableRecords;

#[async_trait]
impl RecordsResolver for UnreachableRecords {
    async fn action(
        &self,
        _id: &str,
    ) -> Result<Option<Action>, StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn skill(
        &self,
        _id: &str,
    ) -> Result<Option<docstream_engine::models::Skill>, StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn knowledge(
        &self,
        _id: &str,
    ) -> Result<Option<docstream_engine::models::KnowledgeItem>, StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn tool(&self, _id: &str) -> Result<Option<ToolRecord>, StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn playbook(&self, _id: &str) -> Result<Option<Playbook>, StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }
}

// ============================================================================
// Ordering invariant
// ============================================================================

#[tokio::test]
async fn test_run_opens_with_metadata_and_closes_with_single_terminal() {
    let pipeline = make_pipeline(
        records_with_playbook(vec![summary_tool()]),
        Arc::new(AcceptAllOutputs),
        vec!["A ", "summary."],
    );
    let events = run_playbook(&pipeline).await;

    assert!(matches!(events[0], StreamChunk::Metadata { .. }));
    let terminal_count = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminal_count, 1);
    assert!(events.last().unwrap().is_terminal());

    // Content deltas sit strictly between metadata and the terminal event.
    for event in &events[1..events.len() - 1] {
        assert!(matches!(event, StreamChunk::Chunk { .. }));
    }
}

#[tokio::test]
async fn test_text_deltas_are_streamed_through() {
    let pipeline = make_pipeline(
        records_with_playbook(vec![summary_tool()]),
        Arc::new(AcceptAllOutputs),
        vec!["A ", "summary."],
    );
    let events = run_playbook(&pipeline).await;

    let texts: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            StreamChunk::Chunk { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["A ", "summary."]);
}

#[tokio::test]
async fn test_done_carries_accumulated_token_usage() {
    let pipeline = make_pipeline(
        records_with_playbook(vec![summary_tool(), extraction_tool()]),
        Arc::new(AcceptAllOutputs),
        vec!["out"],
    );
    let events = run_playbook(&pipeline).await;

    match events.last().unwrap() {
        StreamChunk::Done { token_usage, .. } => {
            // Two generation calls at 50/10 each.
            assert_eq!(token_usage.input, 100);
            assert_eq!(token_usage.output, 20);
        }
        other => panic!("expected Done, got {other:?}"),
    }
}

// ============================================================================
// Fallback determinism
// ============================================================================

#[tokio::test]
async fn test_unknown_handler_falls_back_to_generic() {
    let tool = ToolRecord::new(
        "tl-9",
        "Legacy risk scan",
        "removed-custom-handler",
        serde_json::json!({
            "operation": "risk-scan",
            "prompt_template": "Run {{operation}} over:\n{{document_text}}"
        }),
    );
    let outputs = Arc::new(RecordingOutputs::default());
    let pipeline = make_pipeline(
        records_with_playbook(vec![tool]),
        outputs.clone(),
        vec!["Risk: low."],
    );
    let events = run_playbook(&pipeline).await;

    // Never "handler not found": the run completes normally.
    match events.last().unwrap() {
        StreamChunk::Done { .. } => {}
        other => panic!("expected Done, got {other:?}"),
    }

    let seen = outputs.seen.lock().unwrap().clone().unwrap();
    let result = seen.get("generic-analysis").unwrap();
    assert!(result.success);
    assert_eq!(result.payload["operation"], "risk-scan");
}

// ============================================================================
// Tool composition
// ============================================================================

#[tokio::test]
async fn test_later_tools_read_earlier_results() {
    let outputs = Arc::new(RecordingOutputs::default());
    let pipeline = make_pipeline(
        records_with_playbook(vec![summary_tool(), extraction_tool()]),
        outputs.clone(),
        vec!["shared output"],
    );
    let events = run_playbook(&pipeline).await;
    assert!(matches!(events.last().unwrap(), StreamChunk::Done { .. }));

    let seen = outputs.seen.lock().unwrap().clone().unwrap();
    let ids_in_order: Vec<&str> = seen.iter().map(|(id, _)| id).collect();
    assert_eq!(ids_in_order, vec!["document-summary", "entity-extraction"]);
    assert!(seen.get("entity-extraction").unwrap().success);
}

// ============================================================================
// Soft failure
// ============================================================================

#[tokio::test]
async fn test_partial_storage_is_done_with_soft_failure_fields() {
    let pipeline = make_pipeline(
        records_with_playbook(vec![summary_tool(), extraction_tool()]),
        Arc::new(PartialOutputs),
        vec!["out"],
    );
    let events = run_playbook(&pipeline).await;

    match events.last().unwrap() {
        StreamChunk::Done {
            partial_storage,
            storage_message,
            ..
        } => {
            assert_eq!(*partial_storage, Some(true));
            let message = storage_message.as_deref().unwrap();
            assert!(!message.is_empty());
            assert!(message.contains("outputs saved"));
        }
        other => panic!("expected Done with soft failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_full_success_has_no_soft_failure_fields() {
    let pipeline = make_pipeline(
        records_with_playbook(vec![summary_tool()]),
        Arc::new(AcceptAllOutputs),
        vec!["out"],
    );
    let events = run_playbook(&pipeline).await;

    match events.last().unwrap() {
        StreamChunk::Done {
            partial_storage,
            storage_message,
            ..
        } => {
            assert!(partial_storage.is_none());
            assert!(storage_message.is_none());
        }
        other => panic!("expected Done, got {other:?}"),
    }
}

// ============================================================================
// Missing resources and degraded records
// ============================================================================

#[tokio::test]
async fn test_missing_playbook_is_a_terminal_error_event() {
    let pipeline = make_pipeline(
        InMemoryRecords::new(),
        Arc::new(AcceptAllOutputs),
        vec![],
    );
    let events = pipeline
        .execute_playbook(
            "tenant-1",
            "pb-missing",
            Some(make_document()),
            CancellationToken::new(),
        )
        .collect::<Vec<_>>()
        .await;

    assert!(matches!(events[0], StreamChunk::Metadata { .. }));
    match events.last().unwrap() {
        StreamChunk::Error { error, .. } => {
            assert!(error.contains("Playbook not found"));
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_document_is_a_terminal_error_event() {
    let pipeline = make_pipeline(
        records_with_playbook(vec![summary_tool()]),
        Arc::new(AcceptAllOutputs),
        vec![],
    );
    let events = pipeline
        .execute_playbook("tenant-1", "pb-1", None, CancellationToken::new())
        .collect::<Vec<_>>()
        .await;

    match events.last().unwrap() {
        StreamChunk::Error { error, .. } => assert!(error.contains("Document not found")),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_records_degrades_to_empty_scope() {
    let source = Arc::new(ReplaySource::new(vec!["out"]));
    let registry = Arc::new(build_registry(source).unwrap());
    let scopes = Arc::new(ScopeResolver::new(Arc::new(UnreachableRecords)));
    let pipeline = AnalysisPipeline::new(registry, scopes, Arc::new(AcceptAllOutputs));

    let events = pipeline
        .execute_playbook(
            "tenant-1",
            "pb-1",
            Some(make_document()),
            CancellationToken::new(),
        )
        .collect::<Vec<_>>()
        .await;

    // Soft failure: the run continues (with no tools) and still closes done.
    assert!(matches!(events.last().unwrap(), StreamChunk::Done { .. }));
}

#[tokio::test]
async fn test_all_tools_failing_is_a_terminal_error() {
    // Empty extracted text makes every handler's validation fail.
    let pipeline = make_pipeline(
        records_with_playbook(vec![summary_tool(), extraction_tool()]),
        Arc::new(AcceptAllOutputs),
        vec!["never used"],
    );
    let events = pipeline
        .execute_playbook(
            "tenant-1",
            "pb-1",
            Some(DocumentInfo::new("doc-1", "empty.pdf", "")),
            CancellationToken::new(),
        )
        .collect::<Vec<_>>()
        .await;

    match events.last().unwrap() {
        StreamChunk::Error { error, .. } => assert!(error.contains("All tools failed")),
        other => panic!("expected Error, got {other:?}"),
    }
}

// ============================================================================
// Request validation
// ============================================================================

#[tokio::test]
async fn test_multi_document_request_rejected_before_streaming() {
    let pipeline = make_pipeline(
        records_with_playbook(vec![summary_tool()]),
        Arc::new(AcceptAllOutputs),
        vec![],
    );
    let request = AnalysisRequest {
        playbook_id: "pb-1".to_string(),
        document_ids: ids(&["doc-1", "doc-2"]),
    };

    let err = pipeline.validate_request(&request).unwrap_err();
    assert!(err.to_string().contains("Multi-document"));
}

// ============================================================================
// Direct execution and cancellation
// ============================================================================

#[tokio::test]
async fn test_execute_with_prebuilt_context() {
    let pipeline = make_pipeline(
        records_with_playbook(vec![]),
        Arc::new(AcceptAllOutputs),
        vec!["direct"],
    );
    let context = AnalysisContext::new("tenant-1", make_document());
    let events: Vec<StreamChunk> = pipeline
        .execute(context, vec![summary_tool()])
        .collect()
        .await;

    assert!(matches!(events[0], StreamChunk::Metadata { .. }));
    assert!(matches!(events.last().unwrap(), StreamChunk::Done { .. }));
}

#[tokio::test]
async fn test_pre_cancelled_run_skips_tools_and_still_terminates() {
    let outputs = Arc::new(RecordingOutputs::default());
    let pipeline = make_pipeline(
        records_with_playbook(vec![]),
        outputs.clone(),
        vec!["never"],
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let context = AnalysisContext::new("tenant-1", make_document());
    let events: Vec<StreamChunk> = pipeline
        .execute_cancellable(context, vec![summary_tool()], cancel)
        .collect()
        .await;

    // Cancellation is not an error: the run closes with done and no tool ran.
    assert!(matches!(events.last().unwrap(), StreamChunk::Done { .. }));
    let seen = outputs.seen.lock().unwrap().clone().unwrap();
    assert!(seen.is_empty());
}
