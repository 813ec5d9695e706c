//! Optional cross-encoder rerank, folded in as an additive step between
//! unified re-rank (§4.5 step 4) and token-budget truncation (step 5). When
//! no `CrossEncoderReranker` is configured, distillation behaves exactly as
//! §4.5 describes; this is never required for the documented default
//! behavior.

/// A local cross-encoder scoring (query, document) pairs, grounded on the
/// teacher's `fastembed`-backed `RerankerPool`/`RerankerLease`
/// (`reranking/mod.rs`). Kept as a trait so the distiller never depends on a
/// concrete model backend.
pub trait CrossEncoderReranker: Send + Sync {
    /// Returns one relevance score per document, same order as input.
    fn score(&self, query: &str, documents: &[String]) -> Vec<f32>;
}

/// Blends a cross-encoder score into an already-computed `final` score using
/// the same weight-and-normalize shape the unified re-rank step uses, so the
/// presence of a reranker never changes the documented default behavior when
/// absent.
pub fn blend_cross_encoder_score(final_score: f32, cross_encoder_score: f32, blend_weight: f32) -> f32 {
    (1.0 - blend_weight) * final_score + blend_weight * cross_encoder_score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_blend_weight_preserves_original_score() {
        assert_eq!(blend_cross_encoder_score(0.42, 0.99, 0.0), 0.42);
    }

    #[test]
    fn full_blend_weight_uses_cross_encoder_score() {
        assert_eq!(blend_cross_encoder_score(0.42, 0.99, 1.0), 0.99);
    }
}
