use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

/// Error taxonomy for the query-time retrieval-and-synthesis engine.
///
/// Variants map onto the surfacing rules of each stage: retrievers fail soft
/// and downgrade `GraphUnavailable` into an empty candidate set, the
/// dispatcher fails hard on `ValidationError`, `Timeout`, `EmbeddingUnavailable`
/// and `LLMUnavailable`. `NoEvidence` and `StructuralRefusal` are handled
/// in-process as refusals rather than propagated as request failures.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("embedding client unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("graph store transient failure: {0}")]
    GraphTransient(String),

    #[error("graph store unavailable: {0}")]
    GraphUnavailable(String),

    #[error("llm client unavailable: {0}")]
    LLMUnavailable(String),

    #[error("query deadline exceeded")]
    Timeout,

    #[error("no evidence survived distillation")]
    NoEvidence,

    #[error("structural refusal: {0}")]
    StructuralRefusal(String),

    #[error("database error: {0}")]
    Database(#[from] surrealdb::Error),

    #[error("openai error: {0}")]
    OpenAI(#[from] OpenAIError),

    #[error("task join error: {0}")]
    Join(#[from] JoinError),

    #[error("http client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// True for the errors §7 classifies as retriable exactly once.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::GraphTransient(_))
    }
}
