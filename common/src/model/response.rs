use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::query::{ResponseType, Route};

/// Canonical refusal sentence, byte-for-byte (§6).
pub const REFUSAL_SENTENCE: &str =
    "The requested information was not found in the available documents.";

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query_text: String,
    pub group_id: String,
    #[serde(default)]
    pub route_override: Option<Route>,
    #[serde(default)]
    pub response_type: Option<ResponseType>,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    #[serde(default)]
    pub token_budget: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub marker: String,
    pub chunk_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_id: Option<String>,
    pub doc_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvidenceNode {
    pub entity_id: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer_text: String,
    pub citations: Vec<Citation>,
    pub route_taken: Option<Route>,
    pub refused: bool,
    pub evidence_nodes: Vec<EvidenceNode>,
    pub timings: HashMap<String, u64>,
    pub error: Option<String>,
}

impl QueryResponse {
    pub fn refusal(timings: HashMap<String, u64>) -> Self {
        Self {
            answer_text: REFUSAL_SENTENCE.to_string(),
            citations: Vec::new(),
            route_taken: None,
            refused: true,
            evidence_nodes: Vec::new(),
            timings,
            error: None,
        }
    }

    pub fn timeout(timings: HashMap<String, u64>) -> Self {
        Self {
            answer_text: String::new(),
            citations: Vec::new(),
            route_taken: None,
            refused: false,
            evidence_nodes: Vec::new(),
            timings,
            error: Some("timeout".to_string()),
        }
    }

    pub fn failure(error: impl Into<String>, timings: HashMap<String, u64>) -> Self {
        Self {
            answer_text: String::new(),
            citations: Vec::new(),
            route_taken: None,
            refused: false,
            evidence_nodes: Vec::new(),
            timings,
            error: Some(error.into()),
        }
    }
}
