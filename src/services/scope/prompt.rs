//! System Prompt Composition
//!
//! Formats a resolved scope into system prompt sections: skill fragments
//! under "Specialized Instructions", inline knowledge under "Reference
//! Materials", both in stable resolution order. `rag-index` and
//! `document-reference` items never enter the prompt.

use crate::models::Action;
use crate::services::scope::ResolvedScope;

/// Compose the system prompt for a run: the action's base prompt followed
/// by the scope-derived sections. An empty scope yields the base prompt
/// unchanged, so a degraded resolution still produces a usable prompt.
pub fn compose_system_prompt(action: Option<&Action>, scope: &ResolvedScope) -> String {
    let mut prompt = action.map(|a| a.system_prompt.clone()).unwrap_or_default();

    let skills: Vec<_> = scope
        .skills
        .iter()
        .filter(|s| !s.prompt_fragment.trim().is_empty())
        .collect();
    if !skills.is_empty() {
        prompt.push_str("\n\n## Specialized Instructions\n");
        for skill in skills {
            prompt.push_str(&format!("\n### {}\n{}\n", skill.name, skill.prompt_fragment));
        }
    }

    let inline: Vec<_> = scope
        .inline_items()
        .into_iter()
        .filter(|k| k.content.as_deref().is_some_and(|c| !c.trim().is_empty()))
        .collect();
    if !inline.is_empty() {
        prompt.push_str("\n\n## Reference Materials\n");
        for item in inline {
            let body = item.content.as_deref().unwrap_or_default();
            prompt.push_str(&format!("\n### {}\n{}\n", item.name, body));
        }
    }

    prompt
}
