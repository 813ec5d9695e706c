use serde::{Deserialize, Serialize};

/// One of four end-to-end pipelines chosen per query by the dispatcher
/// (§4.6). `Local` is the default route when no rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Vector,
    Local,
    Global,
    Drift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    Summary,
    Detailed,
}

/// The query-scoped entity threaded through a single request. Created
/// within a query and discarded after the response is returned.
#[derive(Debug, Clone)]
pub struct Query {
    pub query_text: String,
    pub group_id: String,
    pub query_embedding: Vec<f32>,
    pub route_override: Option<Route>,
    pub deadline_ms: u64,
    pub token_budget: usize,
    pub response_type: ResponseType,
}

impl Query {
    pub fn validate(&self) -> Result<(), String> {
        if self.query_text.trim().is_empty() {
            return Err("query_text must be non-empty".to_string());
        }
        if self.token_budget == 0 {
            return Err("token_budget must be positive".to_string());
        }
        if self.deadline_ms == 0 {
            return Err("deadline_ms must be positive".to_string());
        }
        Ok(())
    }
}
