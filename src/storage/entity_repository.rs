//! Entity node persistence against Neo4j.
//!
//! Upserts match on `id` and fully replace scalar properties, then apply
//! each system label as a first-class graph label through a fixed block of
//! predicate-gated `FOREACH` statements enumerating the closed vocabulary.
//! Graph-level labels are never removed by an upsert, so the label set of a
//! node grows monotonically.

use crate::models::{Entity, SystemLabel};
use crate::storage::codec::{self, EntityProps};
use crate::storage::neo4j::Neo4jStore;
use crate::storage::traits::EntityStore;
use crate::{Error, Result};
use async_trait::async_trait;
use neo4rs::{Node, Query, query};
use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};

const SET_CLAUSE: &str = "SET e.external_id = $external_id, e.name = $name, \
     e.summary = $summary, e.labels = $labels, e.system_labels = $system_labels, \
     e.content = $content, e.attachments = $attachments, e.embedding = $embedding, \
     e.metadata = $metadata, e.observations = $observations, \
     e.created_at = $created_at, e.updated_at = $updated_at";

/// One gated `SET e:<LABEL>` per token of the closed vocabulary.
///
/// The label names come from the [`SystemLabel`] enum, never from input, so
/// nothing externally controlled is ever spliced into the query text.
static LABEL_CLAUSES: LazyLock<String> = LazyLock::new(|| {
    let mut clauses = String::new();
    for label in SystemLabel::all() {
        let token = label.as_str();
        let _ = writeln!(
            clauses,
            "FOREACH (_ IN CASE WHEN '{token}' IN $system_labels THEN [1] ELSE [] END | SET e:{token})"
        );
    }
    clauses
});

static UPSERT_QUERY: LazyLock<String> = LazyLock::new(|| {
    format!(
        "MERGE (e:Entity {{id: $id}})\n{SET_CLAUSE}\n{}RETURN e",
        *LABEL_CLAUSES
    )
});

static UPSERT_NO_RETURN_QUERY: LazyLock<String> = LazyLock::new(|| {
    format!(
        "MERGE (e:Entity {{id: $id}})\n{SET_CLAUSE}\n{}",
        *LABEL_CLAUSES
    )
});

/// Entity repository over the Bolt driver.
pub struct Neo4jEntityRepository {
    store: Arc<Neo4jStore>,
}

impl Neo4jEntityRepository {
    /// Creates a repository over the shared store.
    #[must_use]
    pub fn new(store: Arc<Neo4jStore>) -> Self {
        Self { store }
    }

    fn upsert_params(text: &str, props: &EntityProps) -> Query {
        query(text)
            .param("id", props.id.clone())
            .param("external_id", props.external_id.clone())
            .param("name", props.name.clone())
            .param("summary", props.summary.clone())
            .param("labels", props.labels.clone())
            .param("system_labels", props.system_labels.clone())
            .param("content", props.content.clone())
            .param("attachments", props.attachments.clone())
            .param("embedding", props.embedding.clone())
            .param("metadata", props.metadata.clone())
            .param("observations", props.observations.clone())
            .param("created_at", props.created_at.clone())
            .param("updated_at", props.updated_at.clone())
    }

    fn node_to_entity(node: &Node) -> Result<Entity> {
        let props = EntityProps {
            id: node.get::<String>("id").map_err(|e| Error::OperationFailed {
                operation: "decode_entity".to_string(),
                cause: format!("node missing 'id': {e}"),
            })?,
            external_id: node.get::<String>("external_id").ok(),
            name: node.get::<String>("name").ok(),
            summary: node.get::<String>("summary").ok(),
            labels: node.get::<Vec<String>>("labels").unwrap_or_default(),
            system_labels: node.get::<Vec<String>>("system_labels").unwrap_or_default(),
            content: node.get::<String>("content").ok(),
            attachments: node.get::<String>("attachments").ok(),
            embedding: node.get::<String>("embedding").ok(),
            metadata: node.get::<String>("metadata").ok(),
            observations: node.get::<String>("observations").ok(),
            created_at: node.get::<String>("created_at").unwrap_or_default(),
            updated_at: node.get::<String>("updated_at").unwrap_or_default(),
        };
        codec::props_to_entity(props)
    }

    async fn collect_entities(
        &self,
        q: Query,
        operation: &'static str,
    ) -> Result<Vec<Entity>> {
        let graph = self.store.graph().await?;
        let mut stream = graph.execute(q).await.map_err(op_err(operation))?;
        let mut entities = Vec::new();
        while let Some(row) = stream.next().await.map_err(op_err(operation))? {
            let node: Node = row.get("e").map_err(|e| Error::OperationFailed {
                operation: operation.to_string(),
                cause: format!("missing 'e' column: {e}"),
            })?;
            entities.push(Self::node_to_entity(&node)?);
        }
        Ok(entities)
    }
}

#[async_trait]
impl EntityStore for Neo4jEntityRepository {
    async fn upsert(&self, entity: &Entity) -> Result<Entity> {
        let props = codec::entity_to_props(entity)?;
        let graph = self.store.graph().await?;
        let mut stream = graph
            .execute(Self::upsert_params(&UPSERT_QUERY, &props))
            .await
            .map_err(op_err("upsert_entity"))?;
        let row = stream
            .next()
            .await
            .map_err(op_err("upsert_entity"))?
            .ok_or_else(|| Error::OperationFailed {
                operation: "upsert_entity".to_string(),
                cause: "no node returned".to_string(),
            })?;
        let node: Node = row.get("e").map_err(|e| Error::OperationFailed {
            operation: "upsert_entity".to_string(),
            cause: format!("missing 'e' column: {e}"),
        })?;
        Self::node_to_entity(&node)
    }

    async fn bulk_create(&self, entities: &[Entity]) -> Result<Vec<Entity>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let props: Vec<EntityProps> = entities
            .iter()
            .map(codec::entity_to_props)
            .collect::<Result<_>>()?;

        let graph = self.store.graph().await?;
        let mut txn = graph
            .start_txn()
            .await
            .map_err(op_err("bulk_create_entities"))?;
        for prop in &props {
            txn.run(Self::upsert_params(&UPSERT_NO_RETURN_QUERY, prop))
                .await
                .map_err(op_err("bulk_create_entities"))?;
        }
        txn.commit().await.map_err(op_err("bulk_create_entities"))?;

        // Re-read the stored nodes, matching upsert semantics.
        let mut stored = Vec::with_capacity(props.len());
        for prop in &props {
            let entity = self.get(&prop.id).await?.ok_or_else(|| Error::OperationFailed {
                operation: "bulk_create_entities".to_string(),
                cause: format!("entity {} missing after commit", prop.id),
            })?;
            stored.push(entity);
        }
        Ok(stored)
    }

    async fn get(&self, id: &str) -> Result<Option<Entity>> {
        let graph = self.store.graph().await?;
        let q = query("MATCH (e:Entity {id: $id}) RETURN e").param("id", id.to_string());
        let mut stream = graph.execute(q).await.map_err(op_err("get_entity"))?;
        match stream.next().await.map_err(op_err("get_entity"))? {
            Some(row) => {
                let node: Node = row.get("e").map_err(|e| Error::OperationFailed {
                    operation: "get_entity".to_string(),
                    cause: format!("missing 'e' column: {e}"),
                })?;
                Ok(Some(Self::node_to_entity(&node)?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, limit: usize, skip: usize) -> Result<Vec<Entity>> {
        let q = query("MATCH (e:Entity) RETURN e ORDER BY e.created_at, e.id SKIP $skip LIMIT $limit")
            .param("skip", to_i64(skip))
            .param("limit", to_i64(limit));
        self.collect_entities(q, "list_entities").await
    }

    async fn search(&self, text: &str, limit: usize) -> Result<Vec<Entity>> {
        let q = query(
            "MATCH (e:Entity) \
             WHERE toLower(e.name) CONTAINS toLower($q) \
                OR toLower(e.summary) CONTAINS toLower($q) \
             RETURN e LIMIT $limit",
        )
        .param("q", text.to_string())
        .param("limit", to_i64(limit));
        self.collect_entities(q, "search_entities").await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let graph = self.store.graph().await?;
        let q = query("MATCH (e:Entity {id: $id}) DETACH DELETE e RETURN count(e) AS deleted")
            .param("id", id.to_string());
        let mut stream = graph.execute(q).await.map_err(op_err("delete_entity"))?;
        let deleted = match stream.next().await.map_err(op_err("delete_entity"))? {
            Some(row) => row.get::<i64>("deleted").unwrap_or(0) > 0,
            None => false,
        };
        Ok(deleted)
    }
}

fn op_err(operation: &'static str) -> impl FnOnce(neo4rs::Error) -> Error {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_clauses_cover_closed_vocabulary() {
        for label in SystemLabel::all() {
            assert!(
                LABEL_CLAUSES.contains(&format!("SET e:{}", label.as_str())),
                "missing clause for {label}"
            );
        }
        // One gate per vocabulary token, nothing more.
        assert_eq!(
            LABEL_CLAUSES.matches("FOREACH").count(),
            SystemLabel::all().len()
        );
    }

    #[test]
    fn test_upsert_query_shape() {
        assert!(UPSERT_QUERY.starts_with("MERGE (e:Entity {id: $id})"));
        assert!(UPSERT_QUERY.ends_with("RETURN e"));
        assert!(UPSERT_QUERY.contains("e.observations = $observations"));
        assert!(!UPSERT_NO_RETURN_QUERY.contains("RETURN"));
    }
}
