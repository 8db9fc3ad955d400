//! Domain models.
//!
//! The entity/relation types in this module are the single source of truth
//! for graph payloads: everything that reaches a repository — whether it
//! came from an API request or from untrusted model output — has passed
//! through [`Entity::validated`] or the relation type gate first.

mod entity;
mod ingestion;
mod relation;

pub use entity::{
    ContentBlock, ContentFormat, EmbeddingVector, Entity, MediaAttachment, Metadata, Observation,
    SystemLabel,
};
pub use ingestion::{EntryIngestionRequest, EntryIngestionResponse, IngestionStatus};
pub use relation::Relation;
