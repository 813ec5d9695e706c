use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Tunables for the five/six candidate retrievers (§4.4).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RetrievalTuning {
    pub hybrid_k_vector: usize,
    pub hybrid_k_bm25: usize,
    pub hybrid_k_out: usize,
    pub rrf_c: f32,
    pub max_per_doc: usize,
    pub min_docs: usize,
    pub community_min_score: f32,
    pub community_top_k: usize,
    pub hub_top_k_per_community: usize,
    pub ppr_damping: f32,
    pub ppr_sim_weight: f32,
    pub ppr_hub_weight: f32,
    pub mentions_max_chunks_per_entity: usize,
    pub mentions_max_per_section: usize,
    pub mentions_max_per_doc: usize,
    pub beam_max_hops: usize,
    pub beam_width: usize,
}

impl Default for RetrievalTuning {
    fn default() -> Self {
        Self {
            hybrid_k_vector: 30,
            hybrid_k_bm25: 30,
            hybrid_k_out: 20,
            rrf_c: 60.0,
            max_per_doc: 2,
            min_docs: 3,
            community_min_score: 0.05,
            community_top_k: 3,
            hub_top_k_per_community: 5,
            ppr_damping: 0.5,
            ppr_sim_weight: 0.3,
            ppr_hub_weight: 0.2,
            mentions_max_chunks_per_entity: 3,
            mentions_max_per_section: 3,
            mentions_max_per_doc: 6,
            beam_max_hops: 3,
            beam_width: 10,
        }
    }
}

/// Tunables for the context distiller (§4.5).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DistillTuning {
    pub rerank_weight: f32,
    pub base_score_weight: f32,
    pub community_preamble_budget: usize,
    pub max_relationships: usize,
    pub max_entity_descriptions: usize,
    pub noise_min_len: usize,
    pub noise_label_max_len: usize,
    pub noise_heading_max_len: usize,
}

impl Default for DistillTuning {
    fn default() -> Self {
        Self {
            rerank_weight: 0.7,
            base_score_weight: 0.3,
            community_preamble_budget: 2_000,
            max_relationships: 20,
            max_entity_descriptions: 20,
            noise_min_len: 20,
            noise_label_max_len: 40,
            noise_heading_max_len: 50,
        }
    }
}

/// Process-wide engine configuration: connections, client endpoints, and the
/// default tunables every query-scoped request may override.
#[derive(Clone, Debug, Deserialize)]
pub struct EngineConfig {
    pub openai_api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_deadline_ms")]
    pub default_deadline_ms: u64,
    #[serde(default = "default_token_budget")]
    pub default_token_budget: usize,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default)]
    pub retrieval: RetrievalTuning,
    #[serde(default)]
    pub distill: DistillTuning,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_deadline_ms() -> u64 {
    60_000
}

fn default_token_budget() -> usize {
    32_000
}

fn default_max_concurrency() -> usize {
    16
}

fn default_embedding_dim() -> usize {
    1536
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

pub fn get_config() -> Result<EngineConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
