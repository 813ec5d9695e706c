use serde::{Deserialize, Serialize};

use super::StoredObject;

/// A section of a `Document`, identified by a stable opaque id and its
/// position in the document's monotonic section ordering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    pub section_id: String,
    pub index: usize,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub doc_id: String,
    pub title: String,
    pub section_index: Vec<Section>,
}

impl StoredObject for Document {
    fn table_name() -> &'static str {
        "document"
    }

    fn id(&self) -> &str {
        &self.doc_id
    }
}
