//! Synthesizer (§4.7): prompt assembly, the single LLM call, citation
//! binding, and the structural-refusal safety net.

pub mod citations;
pub mod field_lookup;
pub mod prompt;

use common::model::{Citation, DistilledContext, REFUSAL_SENTENCE};
use llm_client::{CompletionRequest, LlmClient};

/// Output token ceiling for the synthesis call. Generous enough for a
/// multi-paragraph Summary plus a Key Points list without truncating
/// mid-citation.
pub const MAX_OUTPUT_TOKENS: u32 = 1024;

#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub answer_text: String,
    pub citations: Vec<Citation>,
    pub refused: bool,
}

pub struct Synthesizer<'a> {
    llm: &'a dyn LlmClient,
}

impl<'a> Synthesizer<'a> {
    pub fn new(llm: &'a dyn LlmClient) -> Self {
        Self { llm }
    }

    /// Runs the full synthesis step: NoEvidence short-circuit is the
    /// caller's job (the dispatcher checks `DistilledContext::is_empty`
    /// before ever reaching here, per §7).
    pub async fn synthesize(
        &self,
        query_text: &str,
        context: &DistilledContext,
    ) -> Result<SynthesisOutput, common::EngineError> {
        let user_prompt = prompt::render_user_prompt(query_text, context);
        let request = CompletionRequest {
            system_prompt: prompt::SYSTEM_PROMPT,
            user_prompt: &user_prompt,
            max_output_tokens: MAX_OUTPUT_TOKENS,
            temperature: 0.0,
            stop: None,
        };
        let response = self.llm.complete(request).await?;

        let mut answer_text = response.text;
        let mut citations = citations::bind_citations(&answer_text, context);
        let mut refused = is_refusal(&answer_text);

        if !refused {
            if let Some(field_tokens) = field_lookup::classify_field_tokens(query_text) {
                let candidate_texts: Vec<&str> = context.candidates.iter().map(|c| c.text.as_str()).collect();
                if field_lookup::no_candidate_mentions_field(&field_tokens, &candidate_texts) {
                    tracing::info!(query = query_text, "structural refusal: field token not present in any candidate");
                    answer_text = REFUSAL_SENTENCE.to_string();
                    citations = Vec::new();
                    refused = true;
                }
            }
        }

        Ok(SynthesisOutput {
            answer_text,
            citations,
            refused,
        })
    }
}

fn is_refusal(answer_text: &str) -> bool {
    answer_text.trim() == REFUSAL_SENTENCE || answer_text.contains(REFUSAL_SENTENCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::{Candidate, CandidateSource};
    use llm_client::StubLlmClient;

    fn context_with_candidate(text: &str) -> DistilledContext {
        DistilledContext {
            candidates: vec![Candidate::new("c1", "d1", "s1", text, vec![1.0], CandidateSource::Vector, 1.0, 0)],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn model_refusal_is_passed_through_with_no_citations() {
        let llm = StubLlmClient::with_scripted_responses(vec![format!(
            "## Summary\n{REFUSAL_SENTENCE}\n\n## Key Points\n- none"
        )]);
        let synthesizer = Synthesizer::new(&llm);
        let context = context_with_candidate("Invoice total: $5,170.00 due upon receipt.");
        let out = synthesizer
            .synthesize("What is the SWIFT code?", &context)
            .await
            .unwrap();
        assert!(out.refused);
        assert_eq!(out.answer_text.matches(REFUSAL_SENTENCE).count(), 1);
    }

    #[tokio::test]
    async fn structural_refusal_overrides_a_confabulated_answer() {
        let llm = StubLlmClient::with_scripted_responses(vec![
            "## Summary\nThe SWIFT code is ABCDEF12 [1].\n\n## Key Points\n- ABCDEF12 [1]".to_string(),
        ]);
        let synthesizer = Synthesizer::new(&llm);
        let context = context_with_candidate("Invoice total: $5,170.00 due upon receipt.");
        let out = synthesizer
            .synthesize("What is the SWIFT code?", &context)
            .await
            .unwrap();
        assert!(out.refused);
        assert_eq!(out.answer_text, REFUSAL_SENTENCE);
        assert!(out.citations.is_empty());
    }

    #[tokio::test]
    async fn present_field_answer_keeps_citations() {
        let llm = StubLlmClient::with_scripted_responses(vec![
            "## Summary\nThe invoice total is $5,170.00 [1].\n\n## Key Points\n- $5,170.00 [1]".to_string(),
        ]);
        let synthesizer = Synthesizer::new(&llm);
        let context = context_with_candidate("Invoice total: $5,170.00 due upon receipt.");
        let out = synthesizer
            .synthesize("What is the invoice total amount?", &context)
            .await
            .unwrap();
        assert!(!out.refused);
        assert_eq!(out.citations.len(), 1);
        assert_eq!(out.citations[0].chunk_id, "c1");
    }
}
