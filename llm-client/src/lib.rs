//! Stateless single-shot LLM client (§4.3). Two calling patterns share this
//! one surface: the synthesizer's long-context structured-markdown call, and
//! the dispatcher's small deterministic classification call.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tokio_retry::{strategy::FixedInterval, Retry};

use common::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Other,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub stop: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub finish_reason: FinishReason,
}

/// Single-shot completion: no partial/streaming results (§1 Non-goals), one
/// retry on transient failure.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<CompletionResponse, EngineError>;
}

/// Production client over `async-openai`'s chat-completions API, the crate
/// the whole teacher corpus standardizes on for LLM access.
pub struct OpenAiLlmClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiLlmClient {
    pub fn new(api_key: &str, base_url: &str, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }

    async fn complete_once(&self, request: &CompletionRequest<'_>) -> Result<CompletionResponse, EngineError> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system_prompt)
            .build()
            .map_err(|e| EngineError::LLMUnavailable(e.to_string()))?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(request.user_prompt)
            .build()
            .map_err(|e| EngineError::LLMUnavailable(e.to_string()))?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(vec![system.into(), user.into()])
            .max_tokens(request.max_output_tokens)
            .temperature(request.temperature);
        if let Some(stop) = request.stop {
            builder.stop(stop);
        }
        let req = builder
            .build()
            .map_err(|e| EngineError::LLMUnavailable(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(req)
            .await
            .map_err(|e| EngineError::LLMUnavailable(e.to_string()))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::LLMUnavailable("no completion choices returned".into()))?;

        let finish_reason = match choice.finish_reason {
            Some(async_openai::types::FinishReason::Stop) => FinishReason::Stop,
            Some(async_openai::types::FinishReason::Length) => FinishReason::Length,
            _ => FinishReason::Other,
        };

        Ok(CompletionResponse {
            text: choice.message.content.unwrap_or_default(),
            finish_reason,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiLlmClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<CompletionResponse, EngineError> {
        let strategy = FixedInterval::from_millis(50).take(1);
        Retry::spawn(strategy, || async { self.complete_once(&request).await })
            .await
            .map_err(|_| EngineError::LLMUnavailable("completion request failed after retry".into()))
    }
}

/// Deterministic test double: returns a scripted response per call, so the
/// synthesizer and dispatcher classifier can be unit-tested without network
/// access.
pub struct StubLlmClient {
    responses: std::sync::Mutex<std::collections::VecDeque<String>>,
    default_response: String,
}

impl StubLlmClient {
    pub fn new(default_response: impl Into<String>) -> Self {
        Self {
            responses: std::sync::Mutex::new(std::collections::VecDeque::new()),
            default_response: default_response.into(),
        }
    }

    pub fn with_scripted_responses(responses: Vec<String>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into_iter().collect()),
            default_response: String::new(),
        }
    }
}

#[async_trait]
impl LlmClient for StubLlmClient {
    async fn complete(&self, _request: CompletionRequest<'_>) -> Result<CompletionResponse, EngineError> {
        let mut queue = self.responses.lock().expect("stub llm client lock poisoned");
        let text = queue.pop_front().unwrap_or_else(|| self.default_response.clone());
        Ok(CompletionResponse {
            text,
            finish_reason: FinishReason::Stop,
        })
    }
}
