//! Prompt assembly (§4.7): fixed system instructions plus a user prompt that
//! numbers the distiller's candidates so the model can cite them by index.

use common::model::DistilledContext;

pub const SYSTEM_PROMPT: &str = "You are an assistant that answers questions strictly from the \
provided evidence context. If the evidence does not contain the exact information the question \
asks for, respond with exactly: \"The requested information was not found in the available \
documents.\" and nothing else in the Summary section. Respect every qualifier in the question \
(dates, durations, categories, conditions) and report only values that satisfy it. Always \
include numeric values verbatim as they appear in the evidence. Enumerate distinct obligations \
or items separately rather than merging them. Cite every factual claim with a bracketed number \
like [3] referring to the context block index it came from.";

/// Renders the distilled context as the numbered block list the system
/// prompt's citation instruction refers to. Candidate N (1-indexed) is the
/// only thing `[N]` may resolve to; the preamble, relationships, and entity
/// descriptions are context but are not individually citable.
pub fn render_context(context: &DistilledContext) -> String {
    let mut sections = Vec::new();

    if let Some(preamble) = &context.community_preamble {
        sections.push(preamble.clone());
    }

    if !context.candidates.is_empty() {
        let numbered: Vec<String> = context
            .candidates
            .iter()
            .enumerate()
            .map(|(i, c)| format!("[{}] {}", i + 1, c.text))
            .collect();
        sections.push(numbered.join("\n"));
    }

    if !context.relationships.is_empty() {
        let rels: Vec<String> = context
            .relationships
            .iter()
            .map(|r| format!("- {} {} {}", r.src, r.predicate, r.dst))
            .collect();
        sections.push(format!("## Known Relationships\n{}", rels.join("\n")));
    }

    if !context.entity_descriptions.is_empty() {
        let descs: Vec<String> = context
            .entity_descriptions
            .iter()
            .map(|(name, desc)| format!("- {}: {}", name, desc))
            .collect();
        sections.push(format!("## Entity Descriptions\n{}", descs.join("\n")));
    }

    sections.join("\n\n")
}

pub fn render_user_prompt(query_text: &str, context: &DistilledContext) -> String {
    format!(
        "Question: {query_text}\n\nEvidence Context:\n{}\n\nRespond in Markdown with exactly two \
sections: `## Summary` (2-3 short paragraphs, or just the refusal sentence) and `## Key Points` \
(a bulleted list of distinct items, each citing its source with `[N]`).",
        render_context(context)
    )
}
