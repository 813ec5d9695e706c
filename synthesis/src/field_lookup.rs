//! Field-lookup classification and the structural-refusal post-check
//! (§4.7, §8 property 7). This is a safety net behind the prompt-level
//! refusal instruction, not the primary mechanism — it only fires when the
//! question has the shape of a single specific-field question and no
//! surviving candidate mentions the field at all.

use regex::Regex;

/// Words that add no retrievability to a field name — stripped from the
/// extracted phrase so a generic qualifier doesn't cause a false refusal
/// (e.g. "invoice total amount" -> "invoice total").
const GENERIC_SUFFIXES: &[&str] = &["amount", "value", "figure"];

const STOPWORDS: &[&str] = &["a", "an", "the", "of", "for", "to", "in", "on", "is", "was", "and"];

fn field_lookup_pattern() -> Regex {
    Regex::new(r"(?i)^what\s+(?:is|was)\s+the\s+(.+?)\s*\??$").expect("field-lookup regex is statically valid")
}

/// If `query_text` has the shape of a specific-field lookup, returns the
/// significant words extracted from the field phrase (lowercased, stripped
/// of stopwords and generic suffixes). Returns `None` for queries that
/// aren't field lookups at all.
pub fn classify_field_tokens(query_text: &str) -> Option<Vec<String>> {
    let pattern = field_lookup_pattern();
    let captures = pattern.captures(query_text.trim())?;
    let phrase = captures[1].to_lowercase();

    let mut words: Vec<String> = phrase
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(&w.as_str()))
        .collect();

    if words.len() > 1 {
        words.retain(|w| !GENERIC_SUFFIXES.contains(&w.as_str()));
    }
    if words.is_empty() {
        return None;
    }
    Some(words)
}

fn normalize(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `true` if none of `field_tokens` appears in any candidate text, under
/// case-and-whitespace normalization — the trigger for structural refusal.
pub fn no_candidate_mentions_field(field_tokens: &[String], candidate_texts: &[&str]) -> bool {
    let normalized: Vec<String> = candidate_texts.iter().map(|t| normalize(t)).collect();
    !field_tokens
        .iter()
        .any(|token| normalized.iter().any(|text| text.contains(token.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tokens_and_strips_generic_suffix() {
        let tokens = classify_field_tokens("What is the invoice total amount?").unwrap();
        assert!(tokens.contains(&"invoice".to_string()));
        assert!(tokens.contains(&"total".to_string()));
        assert!(!tokens.contains(&"amount".to_string()));
    }

    #[test]
    fn non_field_lookup_query_is_not_classified() {
        assert!(classify_field_tokens("Summarize the termination clauses across all contracts").is_none());
    }

    #[test]
    fn present_field_is_detected_as_mentioned() {
        let tokens = classify_field_tokens("What is the invoice total amount?").unwrap();
        let texts = ["Invoice total: $5,170.00 due upon receipt."];
        assert!(!no_candidate_mentions_field(&tokens, &texts));
    }

    #[test]
    fn absent_field_triggers_structural_refusal() {
        let tokens = classify_field_tokens("What is the SWIFT code?").unwrap();
        let texts = ["Invoice total: $5,170.00 due upon receipt."];
        assert!(no_candidate_mentions_field(&tokens, &texts));
    }
}
