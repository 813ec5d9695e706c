use serde::{Deserialize, Serialize};

use super::StoredObject;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub entity_id: String,
    pub name: String,
    pub description: String,
    pub embedding: Vec<f32>,
    pub degree: u32,
    pub community_id: String,
}

impl Entity {
    /// `name` canonicalized: whitespace collapsed, case preserved.
    pub fn canonicalize_name(raw: &str) -> String {
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Filters out artifacts: names that look like chunk IDs, bare
    /// punctuation, or single characters (§4.4.3).
    pub fn looks_like_artifact(name: &str) -> bool {
        let trimmed = name.trim();
        if trimmed.chars().count() <= 1 {
            return true;
        }
        if trimmed.chars().all(|c| !c.is_alphanumeric()) {
            return true;
        }
        if trimmed.starts_with("chunk_") || trimmed.starts_with("sent_") {
            return true;
        }
        false
    }
}

impl StoredObject for Entity {
    fn table_name() -> &'static str {
        "entity"
    }

    fn id(&self) -> &str {
        &self.entity_id
    }
}
