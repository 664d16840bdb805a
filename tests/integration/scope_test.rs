//! Scope Resolution Integration Tests
//!
//! Verifies knowledge partitioning, tolerant resolution, and system prompt
//! composition across the resolver and prompt services.

use std::sync::Arc;

use docstream_engine::services::records::InMemoryRecords;
use docstream_engine::{compose_system_prompt, ScopeResolver};
use docstream_engine::models::{Action, KnowledgeItem, Playbook, Skill, ToolRecord};

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn records_with_mixed_knowledge() -> InMemoryRecords {
    InMemoryRecords::new()
        .with_action(Action::new("act-1", "Review", "You review legal documents."))
        .with_skill(Skill::new("sk-1", "Tone", "Keep a neutral tone."))
        .with_skill(Skill::new("sk-2", "Citations", "Cite clause numbers."))
        .with_knowledge(KnowledgeItem::rag_index("kn-r1", "Case law", "index-1"))
        .with_knowledge(KnowledgeItem::rag_index("kn-r2", "Regulations", "index-2"))
        .with_knowledge(KnowledgeItem::inline("kn-i1", "Glossary", "Indemnity: a promise."))
        .with_knowledge(KnowledgeItem::inline("kn-i2", "House style", "Short sentences."))
        .with_knowledge(KnowledgeItem::document_reference("kn-d1", "Template", "doc-9"))
        .with_tool(ToolRecord::new(
            "tl-1",
            "Summary",
            "document-summary",
            serde_json::json!({}),
        ))
}

// ============================================================================
// Knowledge partitioning (N rag, M inline, K document-reference)
// ============================================================================

#[tokio::test]
async fn test_knowledge_partition_counts() {
    let resolver = ScopeResolver::new(Arc::new(records_with_mixed_knowledge()));
    let scope = resolver
        .resolve_scopes(
            &[],
            &ids(&["kn-r1", "kn-r2", "kn-i1", "kn-i2", "kn-d1"]),
            &[],
        )
        .await;

    // Exactly N = 2 entries in the RAG-source list.
    assert_eq!(scope.rag_source_ids(), vec!["index-1", "index-2"]);
    // Exactly M = 2 inline bodies in the prompt block.
    let prompt = compose_system_prompt(None, &scope);
    assert!(prompt.contains("Indemnity: a promise."));
    assert!(prompt.contains("Short sentences."));
    assert_eq!(prompt.matches("### ").count(), 2);
    // K = 1 document reference retained in the scope, excluded from both.
    assert_eq!(scope.document_references().len(), 1);
    assert!(!prompt.contains("Template"));
    assert!(!prompt.contains("doc-9"));
}

#[tokio::test]
async fn test_partitions_are_disjoint_and_exhaustive() {
    let resolver = ScopeResolver::new(Arc::new(records_with_mixed_knowledge()));
    let scope = resolver
        .resolve_scopes(
            &[],
            &ids(&["kn-r1", "kn-i1", "kn-d1"]),
            &[],
        )
        .await;

    let partitioned = scope.rag_source_ids().len()
        + scope.inline_items().len()
        + scope.document_references().len();
    assert_eq!(partitioned, scope.knowledge.len());
}

// ============================================================================
// Prompt composition
// ============================================================================

#[tokio::test]
async fn test_prompt_sections_in_stable_resolution_order() {
    let resolver = ScopeResolver::new(Arc::new(records_with_mixed_knowledge()));
    let scope = resolver
        .resolve_scopes(&ids(&["sk-1", "sk-2"]), &ids(&["kn-i2", "kn-i1"]), &[])
        .await;

    let action = Action::new("act-1", "Review", "You review legal documents.");
    let prompt = compose_system_prompt(Some(&action), &scope);

    assert!(prompt.starts_with("You review legal documents."));
    let instructions_at = prompt.find("## Specialized Instructions").unwrap();
    let materials_at = prompt.find("## Reference Materials").unwrap();
    assert!(instructions_at < materials_at);

    // Skills in resolution order.
    assert!(prompt.find("### Tone").unwrap() < prompt.find("### Citations").unwrap());
    // Inline knowledge in resolution order.
    assert!(prompt.find("### House style").unwrap() < prompt.find("### Glossary").unwrap());
}

#[tokio::test]
async fn test_deleted_records_do_not_break_resolution() {
    let resolver = ScopeResolver::new(Arc::new(records_with_mixed_knowledge()));
    let scope = resolver
        .resolve_scopes(
            &ids(&["sk-1", "sk-deleted"]),
            &ids(&["kn-i1", "kn-deleted"]),
            &ids(&["tl-1", "tl-deleted"]),
        )
        .await;

    assert_eq!(scope.skills.len(), 1);
    assert_eq!(scope.knowledge.len(), 1);
    assert_eq!(scope.tools.len(), 1);
}

#[tokio::test]
async fn test_playbook_scope_resolution_end_to_end() {
    let records = records_with_mixed_knowledge().with_playbook(Playbook {
        id: "pb-1".to_string(),
        name: "Contract review".to_string(),
        action_id: "act-1".to_string(),
        skill_ids: ids(&["sk-1"]),
        knowledge_ids: ids(&["kn-i1", "kn-r1"]),
        tool_ids: ids(&["tl-1"]),
    });
    let resolver = ScopeResolver::new(Arc::new(records));

    let scope = resolver.resolve_playbook_scopes("pb-1").await;
    assert_eq!(scope.skills.len(), 1);
    assert_eq!(scope.knowledge.len(), 2);
    assert_eq!(scope.tools.len(), 1);
    assert_eq!(scope.rag_source_ids(), vec!["index-1"]);

    let action = resolver.get_action("act-1").await.unwrap();
    let prompt = compose_system_prompt(Some(&action), &scope);
    assert!(prompt.contains("You review legal documents."));
    assert!(prompt.contains("Keep a neutral tone."));
    assert!(prompt.contains("Indemnity: a promise."));
}
