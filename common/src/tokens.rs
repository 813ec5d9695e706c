//! Shared token counting. §4.5 leaves the exact tokenizer as an
//! implementation choice but requires it be consistent between the
//! distiller and the synthesizer — both call this one function.

/// Average characters per token for the chosen fixed-ratio estimator,
/// generalized from the teacher's `estimate_tokens` heuristic.
const AVG_CHARS_PER_TOKEN: usize = 4;

/// Estimates the token count of `text`. Deterministic and pure so that
/// distillation stays reproducible (§8 property 4).
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.chars().count().div_ceil(AVG_CHARS_PER_TOKEN).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_tokens() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn short_text_is_at_least_one_token() {
        assert_eq!(estimate_tokens("hi"), 1);
    }

    #[test]
    fn estimate_scales_with_length() {
        let short = estimate_tokens("hello");
        let long = estimate_tokens(&"hello ".repeat(100));
        assert!(long > short * 50);
    }
}
