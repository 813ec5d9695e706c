//! R3 coverage gap-fill (§4.6): when the query matches a "summarize each
//! document" pattern, detect documents absent from the candidate set and
//! insert each missing document's lead chunk before distillation. The
//! trigger mechanism is a regex whitelist, the pragmatic choice spec.md
//! itself suggests (§9 Open Question) — kept behind a trait so a
//! classifier-driven implementation could replace it without touching R3.

use regex::RegexSet;

use common::model::Candidate;

/// Detects whether a query is asking for per-document coverage.
pub trait GapFillMatcher: Send + Sync {
    fn matches(&self, query_text: &str) -> bool;
}

/// Whitelist of canonical "summarize each document" phrasings.
pub struct RegexGapFillMatcher {
    set: RegexSet,
}

impl Default for RegexGapFillMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl RegexGapFillMatcher {
    pub fn new() -> Self {
        let patterns = [
            r"(?i)\beach (document|contract|file|report)\b",
            r"(?i)\bevery (document|contract|file|report)\b",
            r"(?i)\bsummarize all\b",
            r"(?i)\bacross (all|the) (documents|contracts|files|reports)\b",
            r"(?i)\bacross all\b",
            r"(?i)\bper (document|contract)\b",
        ];
        Self {
            set: RegexSet::new(patterns).expect("gap-fill regex set is statically valid"),
        }
    }
}

impl GapFillMatcher for RegexGapFillMatcher {
    fn matches(&self, query_text: &str) -> bool {
        self.set.is_match(query_text)
    }
}

/// Returns the `doc_id`s present among `candidates`.
pub fn covered_doc_ids(candidates: &[Candidate]) -> std::collections::HashSet<String> {
    candidates.iter().map(|c| c.doc_id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_canonical_phrasings() {
        let matcher = RegexGapFillMatcher::new();
        assert!(matcher.matches("Summarize the termination clauses across all contracts"));
        assert!(matcher.matches("Give me an overview of each document"));
        assert!(!matcher.matches("What is the invoice total amount?"));
    }
}
