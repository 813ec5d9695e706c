use serde::{Deserialize, Serialize};

use super::StoredObject;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextChunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub section_id: String,
    pub text: String,
    pub page: Option<u32>,
    pub token_count: usize,
    pub embedding: Vec<f32>,
    pub prev_chunk_id: Option<String>,
    pub next_chunk_id: Option<String>,
    pub mentions: Vec<String>,
}

impl TextChunk {
    /// `embedding.dim` equal to model-declared dimension; `text` non-empty.
    pub fn validate(&self, expected_dim: usize) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err(format!("chunk {} has empty text", self.chunk_id));
        }
        if self.embedding.len() != expected_dim {
            return Err(format!(
                "chunk {} embedding dim {} != expected {}",
                self.chunk_id,
                self.embedding.len(),
                expected_dim
            ));
        }
        Ok(())
    }
}

impl StoredObject for TextChunk {
    fn table_name() -> &'static str {
        "text_chunk"
    }

    fn id(&self) -> &str {
        &self.chunk_id
    }
}
