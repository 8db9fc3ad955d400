//! High-level operations for working with entity nodes.

use crate::models::{Entity, Relation};
use crate::storage::{EntityStore, RelationStore};
use crate::Result;
use std::sync::Arc;

/// Thin façade over the entity and relation repositories.
pub struct EntityService {
    entities: Arc<dyn EntityStore>,
    relations: Arc<dyn RelationStore>,
}

impl EntityService {
    /// Creates the service over the repositories.
    #[must_use]
    pub fn new(entities: Arc<dyn EntityStore>, relations: Arc<dyn RelationStore>) -> Self {
        Self {
            entities,
            relations,
        }
    }

    /// Reads an entity by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn get(&self, id: &str) -> Result<Option<Entity>> {
        self.entities.get(id).await
    }

    /// Paginated entity scan.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn list(&self, limit: usize, skip: usize) -> Result<Vec<Entity>> {
        self.entities.list(limit, skip).await
    }

    /// Outbound relations of an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn relations_for(&self, id: &str) -> Result<Vec<Relation>> {
        self.relations.list_for_entity(id).await
    }

    /// Detach-deletes an entity; returns whether a node was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.entities.delete(id).await
    }
}
