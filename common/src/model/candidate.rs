use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Which retriever(s) contributed a `Candidate`. A single candidate may be
/// produced by more than one retriever; cross-source dedup (§4.5 step 3)
/// unions their sources rather than picking one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Vector,
    Bm25,
    Mentions,
    Ppr,
    Community,
}

impl std::fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CandidateSource::Vector => "vector",
            CandidateSource::Bm25 => "bm25",
            CandidateSource::Mentions => "mentions",
            CandidateSource::Ppr => "ppr",
            CandidateSource::Community => "community",
        };
        f.write_str(s)
    }
}

/// A single piece of evidence produced by a retriever, owned by its
/// producer until the distiller consumes the pool and emits one owned
/// `DistilledContext`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub chunk_id: String,
    pub doc_id: String,
    pub section_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub sources: BTreeSet<CandidateSource>,
    pub base_score: f32,
    pub rank: usize,
    pub entity_anchors: Vec<String>,
}

impl Candidate {
    pub fn new(
        chunk_id: impl Into<String>,
        doc_id: impl Into<String>,
        section_id: impl Into<String>,
        text: impl Into<String>,
        embedding: Vec<f32>,
        source: CandidateSource,
        base_score: f32,
        rank: usize,
    ) -> Self {
        let mut sources = BTreeSet::new();
        sources.insert(source);
        Self {
            chunk_id: chunk_id.into(),
            doc_id: doc_id.into(),
            section_id: section_id.into(),
            text: text.into(),
            embedding,
            sources,
            base_score,
            rank,
            entity_anchors: Vec::new(),
        }
    }

    /// Text canonicalized for exact-dedup/noise-filter comparisons: trim and
    /// collapse internal whitespace (§4.5 step 1).
    pub fn canonical_text(&self) -> String {
        self.text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
