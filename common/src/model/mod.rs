pub mod candidate;
pub mod community;
pub mod distilled;
pub mod document;
pub mod entity;
pub mod query;
pub mod relationship;
pub mod response;
pub mod sentence;
pub mod text_chunk;

pub use candidate::{Candidate, CandidateSource};
pub use community::Community;
pub use distilled::DistilledContext;
pub use document::Document;
pub use entity::Entity;
pub use query::{Query, ResponseType, Route};
pub use relationship::Relationship;
pub use response::{Citation, EvidenceNode, QueryRequest, QueryResponse, REFUSAL_SENTENCE};
pub use sentence::Sentence;
pub use text_chunk::TextChunk;

use serde::{Deserialize, Serialize};

/// Graph-backed read-only record. All entities in §3 other than `Query`,
/// `Candidate`, `DistilledContext` and `Response` are `StoredObject`s:
/// immutable inputs produced by the (out-of-scope) ingestion subsystem.
pub trait StoredObject: Serialize + for<'de> Deserialize<'de> {
    fn table_name() -> &'static str;
    fn id(&self) -> &str;
}
