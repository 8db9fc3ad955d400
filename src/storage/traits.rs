//! Backend traits for entity and relation persistence.
//!
//! Repositories are consumed through these seams so services and tests can
//! run against either the Bolt-backed implementations or the in-memory
//! backend.
//!
//! # Implementor Notes
//!
//! - Methods take `&self` so backends can be shared via `Arc<dyn …>`;
//!   use interior mutability for mutable state.
//! - All backends go through [`crate::storage::codec`] so the
//!   JSON-in-property contract holds everywhere.
//! - `upsert` must keep graph-level labels monotonic: labels applied by an
//!   earlier upsert are never removed by a later one.

use crate::models::{Entity, Relation};
use crate::Result;
use async_trait::async_trait;

/// Persistence operations for entity nodes.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Inserts or fully replaces the node with the entity's id, applies its
    /// system labels as graph labels, and returns the stored entity by
    /// re-reading the node.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or the write fails.
    async fn upsert(&self, entity: &Entity) -> Result<Entity>;

    /// Upserts a batch of entities atomically with the same semantics as
    /// [`EntityStore::upsert`].
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or the batch fails.
    async fn bulk_create(&self, entities: &[Entity]) -> Result<Vec<Entity>>;

    /// Reads a node by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or the read fails.
    async fn get(&self, id: &str) -> Result<Option<Entity>>;

    /// Paginated scan.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or the read fails.
    async fn list(&self, limit: usize, skip: usize) -> Result<Vec<Entity>>;

    /// Case-insensitive substring match over `name` and `summary`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or the read fails.
    async fn search(&self, text: &str, limit: usize) -> Result<Vec<Entity>>;

    /// Detach-deletes the node and all incident edges; returns whether a
    /// node was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or the write fails.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Persistence operations for typed edges.
#[async_trait]
pub trait RelationStore: Send + Sync {
    /// Creates one edge after validating its type against `^[A-Z0-9_]+$`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for a bad edge type (without
    /// touching the store), [`crate::Error::NotFound`] when an endpoint
    /// does not exist, or an operation error otherwise.
    async fn create(&self, relation: &Relation) -> Result<Relation>;

    /// Best-effort batch create: individual failures are logged and
    /// skipped; returns the successfully created edges.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store is unavailable.
    async fn bulk_create(&self, relations: &[Relation]) -> Result<Vec<Relation>>;

    /// Lists outbound edges of an entity, materializing the edge label as
    /// the relation type.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or the read fails.
    async fn list_for_entity(&self, id: &str) -> Result<Vec<Relation>>;
}

/// Liveness probe for a storage backend.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    /// Returns true when the backend can answer a trivial query.
    async fn verify_connectivity(&self) -> bool;
}
