//! Candidate retrievers (§4.4) and the context distiller (§4.5).
//!
//! Each retriever owns the candidates it produces; the distiller consumes a
//! pool from one or more retrievers and emits a single owned
//! `DistilledContext`. Retrievers never talk to each other directly — route
//! orchestrators (the `routes` crate) compose them.

pub mod beam;
pub mod community;
pub mod distill;
pub mod hub_entities;
pub mod hybrid;
pub mod mentions;
pub mod ppr;
pub mod util;

pub use beam::SemanticBeamWalker;
pub use community::CommunityMatcher;
pub use distill::{CommunitySummary, DistillInput};
pub use hub_entities::HubEntityExtractor;
pub use hybrid::HybridRetriever;
pub use mentions::MentionsExpander;
pub use ppr::PprTracer;
