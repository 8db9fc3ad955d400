//! Graph storage: the Neo4j store adapter, repositories, and an in-memory
//! backend.
//!
//! # Layout
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`neo4j`] | Connection lifecycle for the Bolt driver |
//! | [`codec`] | Entity ⇄ node-property serialization contract |
//! | [`traits`] | [`EntityStore`] / [`RelationStore`] backend seams |
//! | [`entity_repository`] | Entity node upsert/fetch/list/search/delete |
//! | [`relation_repository`] | Typed edge creation with the regex gate |
//! | [`memory`] | Non-persistent backend for tests and development |
//!
//! # Serialization contract
//!
//! The store's property model is scalars and primitive arrays, so the
//! nested fields `content`, `attachments`, `embedding`, `metadata`, and
//! `observations` are stored as JSON-encoded strings and decoded on read.
//! A corrupt property decodes to its empty default with a warning — it
//! never fails the read. See [`codec`].

pub mod codec;
pub mod entity_repository;
pub mod memory;
pub mod neo4j;
pub mod relation_repository;
pub mod traits;

pub use entity_repository::Neo4jEntityRepository;
pub use memory::InMemoryGraphStore;
pub use neo4j::Neo4jStore;
pub use relation_repository::Neo4jRelationRepository;
pub use traits::{EntityStore, RelationStore, StoreHealth};
