//! Protocol Shape Tests
//!
//! Verifies the event payloads the external transport serializes: field
//! names, tag values, optional-field omission, and the terminal-event
//! exclusivity rules.

use docstream_engine::{DocumentStreamEvent, StreamChunk, StreamErrorCode, TokenUsage};

// ============================================================================
// Pipeline event shapes
// ============================================================================

#[test]
fn test_metadata_wire_shape() {
    let json = serde_json::to_value(StreamChunk::metadata("an-1", "contract.pdf")).unwrap();
    assert_eq!(json["type"], "metadata");
    assert_eq!(json["analysisId"], "an-1");
    assert_eq!(json["documentName"], "contract.pdf");
}

#[test]
fn test_chunk_wire_shape() {
    let json = serde_json::to_value(StreamChunk::chunk("delta text")).unwrap();
    assert_eq!(json["type"], "chunk");
    assert_eq!(json["text"], "delta text");
}

#[test]
fn test_done_wire_shape() {
    let json = serde_json::to_value(StreamChunk::done(TokenUsage::new(10, 3))).unwrap();
    assert_eq!(json["type"], "done");
    assert_eq!(json["done"], true);
    assert_eq!(json["tokenUsage"]["input"], 10);
    assert_eq!(json["tokenUsage"]["output"], 3);
    assert!(json.get("partialStorage").is_none());
    assert!(json.get("storageMessage").is_none());
}

#[test]
fn test_done_partial_wire_shape() {
    let json = serde_json::to_value(StreamChunk::done_partial(
        TokenUsage::default(),
        "2 of 3 tool outputs saved",
    ))
    .unwrap();
    assert_eq!(json["partialStorage"], true);
    assert_eq!(json["storageMessage"], "2 of 3 tool outputs saved");
}

#[test]
fn test_error_wire_shape() {
    let json = serde_json::to_value(StreamChunk::error("Playbook not found: pb-9")).unwrap();
    assert_eq!(json["type"], "error");
    assert_eq!(json["done"], true);
    assert_eq!(json["error"], "Playbook not found: pb-9");
}

// ============================================================================
// Document-edit event shapes
// ============================================================================

#[test]
fn test_document_stream_event_tags() {
    use docstream_engine::DocumentStreamEvent as E;
    use docstream_engine::{OperationType, TargetPosition};

    let start = serde_json::to_value(E::start("op-1", TargetPosition::End, OperationType::Insert))
        .unwrap();
    assert_eq!(start["type"], "document_stream_start");
    assert_eq!(start["operationId"], "op-1");
    assert_eq!(start["targetPosition"], "end");
    assert_eq!(start["operationType"], "insert");

    let token = serde_json::to_value(E::token("op-1", "word", 4)).unwrap();
    assert_eq!(token["type"], "document_stream_token");
    assert_eq!(token["token"], "word");
    assert_eq!(token["index"], 4);

    let end = serde_json::to_value(E::completed("op-1", 5)).unwrap();
    assert_eq!(end["type"], "document_stream_end");
    assert_eq!(end["cancelled"], false);
    assert_eq!(end["totalTokens"], 5);
    assert!(end.get("errorCode").is_none());
    assert!(end.get("errorMessage").is_none());
}

#[test]
fn test_error_codes_are_stable_strings() {
    let end = serde_json::to_value(DocumentStreamEvent::failed(
        "op-1",
        0,
        StreamErrorCode::NoDocument,
        "No working document",
    ))
    .unwrap();
    assert_eq!(end["errorCode"], "NO_DOCUMENT");

    let end = serde_json::to_value(DocumentStreamEvent::failed(
        "op-1",
        2,
        StreamErrorCode::LlmStreamFailed,
        "stream failed",
    ))
    .unwrap();
    assert_eq!(end["errorCode"], "LLM_STREAM_FAILED");
}

// ============================================================================
// Terminal exclusivity (invariant: cancelled and errored never combine)
// ============================================================================

#[test]
fn test_cancelled_terminal_never_carries_error_code() {
    let json = serde_json::to_value(DocumentStreamEvent::cancelled("op-1", 2)).unwrap();
    assert_eq!(json["cancelled"], true);
    assert!(json.get("errorCode").is_none());
    assert!(json.get("errorMessage").is_none());
}

#[test]
fn test_failed_terminal_is_never_cancelled() {
    let json = serde_json::to_value(DocumentStreamEvent::failed(
        "op-1",
        1,
        StreamErrorCode::LlmStreamFailed,
        "failed",
    ))
    .unwrap();
    assert_eq!(json["cancelled"], false);
}

#[test]
fn test_round_trip_preserves_events() {
    let events = vec![
        StreamChunk::metadata("an-1", "doc"),
        StreamChunk::chunk("text"),
        StreamChunk::done_partial(TokenUsage::new(1, 2), "1 of 2 tool outputs saved"),
    ];
    for event in events {
        let json = serde_json::to_string(&event).unwrap();
        let parsed: StreamChunk = serde_json::from_str(&json).unwrap();
        assert_eq!(event, parsed);
    }
}
