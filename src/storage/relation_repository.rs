//! Typed edge persistence against Neo4j.
//!
//! Edge types cannot be parameterized by the Bolt protocol, so the
//! validated type token is interpolated into the query text. This is the
//! only string-built query in the crate; [`crate::models::Relation::edge_type`]
//! is the gate in front of it.

use crate::models::Relation;
use crate::storage::neo4j::Neo4jStore;
use crate::storage::traits::RelationStore;
use crate::{Error, Result};
use async_trait::async_trait;
use neo4rs::query;
use std::sync::Arc;

/// Relation repository over the Bolt driver.
pub struct Neo4jRelationRepository {
    store: Arc<Neo4jStore>,
}

impl Neo4jRelationRepository {
    /// Creates a repository over the shared store.
    #[must_use]
    pub fn new(store: Arc<Neo4jStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RelationStore for Neo4jRelationRepository {
    async fn create(&self, relation: &Relation) -> Result<Relation> {
        // The gate runs before the store is touched; a bad type never
        // reaches the driver.
        let edge_type = relation.edge_type()?;
        let graph = self.store.graph().await?;

        let cypher = format!(
            "MATCH (source:Entity {{id: $source_id}}) \
             MATCH (target:Entity {{id: $target_id}}) \
             MERGE (source)-[r:{edge_type}]->(target) \
             RETURN source.id AS source, target.id AS target"
        );
        let q = query(&cypher)
            .param("source_id", relation.source.clone())
            .param("target_id", relation.target.clone());

        let mut stream = graph.execute(q).await.map_err(|e| Error::OperationFailed {
            operation: "create_relation".to_string(),
            cause: e.to_string(),
        })?;
        let row = stream.next().await.map_err(|e| Error::OperationFailed {
            operation: "create_relation".to_string(),
            cause: e.to_string(),
        })?;

        // No row means a MATCH came back empty: an endpoint is unknown.
        if row.is_none() {
            return Err(Error::NotFound(format!(
                "relation endpoints not found: {} -> {}",
                relation.source, relation.target
            )));
        }

        Ok(Relation::new(
            relation.source.clone(),
            relation.target.clone(),
            edge_type,
        ))
    }

    async fn bulk_create(&self, relations: &[Relation]) -> Result<Vec<Relation>> {
        let mut created = Vec::with_capacity(relations.len());
        for relation in relations {
            match self.create(relation).await {
                Ok(stored) => created.push(stored),
                Err(Error::StoreUnavailable(cause)) => {
                    return Err(Error::StoreUnavailable(cause));
                }
                Err(e) => {
                    tracing::warn!(
                        source = %relation.source,
                        target = %relation.target,
                        error = %e,
                        "Failed to persist relation; skipping"
                    );
                }
            }
        }
        Ok(created)
    }

    async fn list_for_entity(&self, id: &str) -> Result<Vec<Relation>> {
        let graph = self.store.graph().await?;
        let q = query(
            "MATCH (source:Entity {id: $id})-[r]->(target:Entity) \
             RETURN source.id AS source, type(r) AS relation_type, target.id AS target",
        )
        .param("id", id.to_string());

        let mut stream = graph.execute(q).await.map_err(|e| Error::OperationFailed {
            operation: "list_relations".to_string(),
            cause: e.to_string(),
        })?;

        let mut relations = Vec::new();
        while let Some(row) = stream.next().await.map_err(|e| Error::OperationFailed {
            operation: "list_relations".to_string(),
            cause: e.to_string(),
        })? {
            let get = |key: &str| -> Result<String> {
                row.get::<String>(key).map_err(|e| Error::OperationFailed {
                    operation: "list_relations".to_string(),
                    cause: format!("missing '{key}' column: {e}"),
                })
            };
            relations.push(Relation::new(
                get("source")?,
                get("target")?,
                get("relation_type")?,
            ));
        }
        Ok(relations)
    }
}
