//! In-memory graph store for testing and development.
//!
//! Implements the same backend traits as the Bolt repositories, through the
//! same property codec, so code exercised against it sees the identical
//! serialization contract: nested fields round-trip through JSON strings
//! and graph-level labels grow monotonically across upserts.

use crate::models::{Entity, Relation};
use crate::storage::codec::{self, EntityProps};
use crate::storage::traits::{EntityStore, RelationStore, StoreHealth};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

/// A stored node: its flat properties plus the graph-level label set.
#[derive(Debug, Clone)]
struct StoredNode {
    props: EntityProps,
    /// Monotonic: labels are added by upserts, never removed.
    graph_labels: BTreeSet<String>,
}

/// A stored edge with its validated type token.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredEdge {
    source: String,
    target: String,
    edge_type: String,
}

/// Non-persistent graph store.
///
/// Uses `RwLock` for thread-safe access with reader-writer semantics.
/// Data is not persisted between runs.
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    nodes: RwLock<HashMap<String, StoredNode>>,
    edges: RwLock<Vec<StoredEdge>>,
}

impl InMemoryGraphStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored nodes.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.nodes.read().map(|n| n.len()).unwrap_or(0)
    }

    /// Returns the number of stored edges.
    #[must_use]
    pub fn relation_count(&self) -> usize {
        self.edges.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns the graph-level labels of a node, sorted, if it exists.
    #[must_use]
    pub fn graph_labels(&self, id: &str) -> Option<Vec<String>> {
        self.nodes
            .read()
            .ok()?
            .get(id)
            .map(|node| node.graph_labels.iter().cloned().collect())
    }

    fn write_nodes(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, StoredNode>>> {
        self.nodes.write().map_err(|_| poisoned("nodes"))
    }

    fn read_nodes(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, StoredNode>>> {
        self.nodes.read().map_err(|_| poisoned("nodes"))
    }

    fn upsert_props(nodes: &mut HashMap<String, StoredNode>, props: EntityProps) {
        let labels: BTreeSet<String> = props
            .system_labels
            .iter()
            .cloned()
            .chain(std::iter::once("Entity".to_string()))
            .collect();
        match nodes.get_mut(&props.id) {
            Some(existing) => {
                // Full property replacement; label set only grows.
                existing.props = props;
                existing.graph_labels.extend(labels);
            }
            None => {
                nodes.insert(
                    props.id.clone(),
                    StoredNode {
                        props,
                        graph_labels: labels,
                    },
                );
            }
        }
    }
}

#[async_trait]
impl EntityStore for InMemoryGraphStore {
    async fn upsert(&self, entity: &Entity) -> Result<Entity> {
        let props = codec::entity_to_props(entity)?;
        let id = props.id.clone();
        {
            let mut nodes = self.write_nodes()?;
            Self::upsert_props(&mut nodes, props);
        }
        self.get(&id).await?.ok_or_else(|| Error::OperationFailed {
            operation: "upsert_entity".to_string(),
            cause: format!("entity {id} missing after upsert"),
        })
    }

    async fn bulk_create(&self, entities: &[Entity]) -> Result<Vec<Entity>> {
        // Serialize everything first so the batch applies atomically.
        let props: Vec<EntityProps> = entities
            .iter()
            .map(codec::entity_to_props)
            .collect::<Result<_>>()?;

        let ids: Vec<String> = props.iter().map(|p| p.id.clone()).collect();
        {
            let mut nodes = self.write_nodes()?;
            for prop in props {
                Self::upsert_props(&mut nodes, prop);
            }
        }

        let mut stored = Vec::with_capacity(ids.len());
        for id in ids {
            let entity = self.get(&id).await?.ok_or_else(|| Error::OperationFailed {
                operation: "bulk_create_entities".to_string(),
                cause: format!("entity {id} missing after upsert"),
            })?;
            stored.push(entity);
        }
        Ok(stored)
    }

    async fn get(&self, id: &str) -> Result<Option<Entity>> {
        let nodes = self.read_nodes()?;
        nodes
            .get(id)
            .map(|node| codec::props_to_entity(node.props.clone()))
            .transpose()
    }

    async fn list(&self, limit: usize, skip: usize) -> Result<Vec<Entity>> {
        let nodes = self.read_nodes()?;
        let mut props: Vec<&EntityProps> = nodes.values().map(|n| &n.props).collect();
        props.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        props
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|p| codec::props_to_entity(p.clone()))
            .collect()
    }

    async fn search(&self, text: &str, limit: usize) -> Result<Vec<Entity>> {
        let needle = text.to_lowercase();
        let nodes = self.read_nodes()?;
        let mut matches: Vec<&EntityProps> = nodes
            .values()
            .map(|n| &n.props)
            .filter(|p| {
                let name_hit = p
                    .name
                    .as_ref()
                    .is_some_and(|n| n.to_lowercase().contains(&needle));
                let summary_hit = p
                    .summary
                    .as_ref()
                    .is_some_and(|s| s.to_lowercase().contains(&needle));
                name_hit || summary_hit
            })
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches
            .into_iter()
            .take(limit)
            .map(|p| codec::props_to_entity(p.clone()))
            .collect()
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let removed = {
            let mut nodes = self.write_nodes()?;
            nodes.remove(id).is_some()
        };
        if removed {
            // Detach-delete: drop every incident edge.
            let mut edges = self.edges.write().map_err(|_| poisoned("edges"))?;
            edges.retain(|edge| edge.source != id && edge.target != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl RelationStore for InMemoryGraphStore {
    async fn create(&self, relation: &Relation) -> Result<Relation> {
        let edge_type = relation.edge_type()?;

        {
            let nodes = self.read_nodes()?;
            for endpoint in [&relation.source, &relation.target] {
                if !nodes.contains_key(endpoint.as_str()) {
                    return Err(Error::NotFound(format!(
                        "relation endpoints not found: {} -> {}",
                        relation.source, relation.target
                    )));
                }
            }
        }

        let edge = StoredEdge {
            source: relation.source.clone(),
            target: relation.target.clone(),
            edge_type: edge_type.clone(),
        };
        let mut edges = self.edges.write().map_err(|_| poisoned("edges"))?;
        // MERGE semantics: an identical edge is not duplicated.
        if !edges.contains(&edge) {
            edges.push(edge);
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
        let edges = self.edges.read().map_err(|_| poisoned("edges"))?;
        Ok(edges
            .iter()
            .filter(|edge| edge.source == id)
            .map(|edge| Relation::new(edge.source.clone(), edge.target.clone(), edge.edge_type.clone()))
            .collect())
    }
}

#[async_trait]
impl StoreHealth for InMemoryGraphStore {
    async fn verify_connectivity(&self) -> bool {
        true
    }
}

fn poisoned(what: &str) -> Error {
    Error::OperationFailed {
        operation: "memory_store".to_string(),
        cause: format!("{what} lock poisoned"),
    }
}
