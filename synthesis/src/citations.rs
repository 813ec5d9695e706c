//! Citation binding (§4.7): scans generated text for `[N]` tokens and
//! resolves each to the candidate at that context-block index. Out-of-range
//! citations are a soft failure — dropped with a warning, the claim text is
//! left untouched (§7 `UnresolvedCitation`).

use regex::Regex;

use common::model::{Citation, DistilledContext};

fn citation_pattern() -> Regex {
    Regex::new(r"\[(\d+)\]").expect("citation regex is statically valid")
}

/// Extracts citations in first-occurrence order, deduplicated by index.
pub fn bind_citations(answer_text: &str, context: &DistilledContext) -> Vec<Citation> {
    let pattern = citation_pattern();
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    for capture in pattern.captures_iter(answer_text) {
        let Ok(n) = capture[1].parse::<usize>() else {
            continue;
        };
        if n == 0 || !seen.insert(n) {
            continue;
        }
        let Some(candidate) = context.candidates.get(n - 1) else {
            tracing::warn!(marker = n, "citation index out of range, dropping");
            continue;
        };
        out.push(Citation {
            marker: format!("[{n}]"),
            chunk_id: candidate.chunk_id.clone(),
            sent_id: None,
            doc_id: candidate.doc_id.clone(),
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::{Candidate, CandidateSource};

    fn context_with(n: usize) -> DistilledContext {
        let candidates = (0..n)
            .map(|i| {
                Candidate::new(
                    format!("c{i}"),
                    format!("d{i}"),
                    "s0",
                    "text",
                    vec![1.0],
                    CandidateSource::Vector,
                    1.0,
                    i,
                )
            })
            .collect();
        DistilledContext {
            candidates,
            ..Default::default()
        }
    }

    #[test]
    fn resolves_in_range_citations_and_dedupes() {
        let context = context_with(3);
        let out = bind_citations("Claim one [1]. Claim two [2]. Repeat [1].", &context);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].chunk_id, "c0");
        assert_eq!(out[1].chunk_id, "c1");
    }

    #[test]
    fn drops_out_of_range_citation_without_erroring() {
        let context = context_with(1);
        let out = bind_citations("Claim [1] and a bogus one [9].", &context);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].chunk_id, "c0");
    }

    #[test]
    fn no_citations_yields_empty_vec() {
        let context = context_with(2);
        let out = bind_citations("No brackets here.", &context);
        assert!(out.is_empty());
    }
}
