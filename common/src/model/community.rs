use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::StoredObject;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Community {
    pub community_id: String,
    pub title: String,
    pub summary: String,
    pub summary_embedding: Vec<f32>,
    pub member_entity_ids: Vec<String>,
    pub embedding_text_hash: String,
}

impl Community {
    pub fn hash_summary(summary: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(summary.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// `embedding_text_hash` must equal the hash of the text that produced
    /// `summary_embedding` (stale-embedding guard, §4.4.2 / property 6).
    pub fn is_stale(&self) -> bool {
        Self::hash_summary(&self.summary) != self.embedding_text_hash
    }
}

impl StoredObject for Community {
    fn table_name() -> &'static str {
        "community"
    }

    fn id(&self) -> &str {
        &self.community_id
    }
}
