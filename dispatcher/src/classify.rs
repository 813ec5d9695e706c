//! Route classifier (§4.8 step 2): deterministic and rule-based, checked in
//! the order the spec lists. An LLM-assisted fallback is intentionally not
//! implemented here — the rule set covers the shapes the spec names, and a
//! classifier call would add an I/O suspension point to every dispatch, which
//! the rule-based path avoids entirely.

use common::model::Route;
use routes::local::extract_name_candidates;

const GLOBAL_PHRASES: &[&str] = &["each document", "summarize all", "across"];
const DRIFT_RELATION_WORDS: &[&str] = &["between", "connection"];
const FACTOID_PREFIXES: &[&str] = &["what is", "what's", "what was", "who is", "who was"];
const FACTOID_MAX_WORDS: usize = 12;

pub fn classify_route(query_text: &str) -> Route {
    let lower = query_text.to_lowercase();

    if GLOBAL_PHRASES.iter().any(|p| lower.contains(p)) {
        return Route::Global;
    }

    let proper_nouns = extract_name_candidates(query_text);
    if proper_nouns.len() >= 2 || DRIFT_RELATION_WORDS.iter().any(|w| lower.contains(w)) {
        return Route::Drift;
    }

    let word_count = query_text.split_whitespace().count();
    if word_count <= FACTOID_MAX_WORDS && FACTOID_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return Route::Vector;
    }

    Route::Local
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_phrase_routes_to_r3() {
        assert_eq!(
            classify_route("Summarize the termination clauses across all contracts"),
            Route::Global
        );
        assert_eq!(classify_route("Give me an overview of each document"), Route::Global);
    }

    #[test]
    fn two_proper_nouns_routes_to_r4() {
        assert_eq!(
            classify_route("Trace the relationship between Acme Corp and Globex Inc"),
            Route::Drift
        );
    }

    #[test]
    fn relation_word_alone_routes_to_r4() {
        assert_eq!(
            classify_route("What is the connection between the invoice and the contract"),
            Route::Drift
        );
    }

    #[test]
    fn short_factoid_routes_to_r1() {
        assert_eq!(classify_route("What is the invoice total amount?"), Route::Vector);
        assert_eq!(classify_route("What is the SWIFT code?"), Route::Vector);
    }

    #[test]
    fn unmatched_query_defaults_to_r2() {
        assert_eq!(classify_route("Tell me about the tenant's obligations"), Route::Local);
    }
}
