use serde::{Deserialize, Serialize};

use super::StoredObject;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sentence {
    pub sent_id: String,
    pub chunk_id: String,
    pub offset: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl StoredObject for Sentence {
    fn table_name() -> &'static str {
        "sentence"
    }

    fn id(&self) -> &str {
        &self.sent_id
    }
}
