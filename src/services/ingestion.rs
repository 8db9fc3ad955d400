//! Entry ingestion.
//!
//! Builds the `ENTRY` entity, persists it, schedules extraction, and
//! writes the extracted subgraph back to the store. The entry node is
//! always persisted before any provider runs, and the 202 response goes
//! out before any provider call in deferred mode.

use crate::llm::ExtractionResult;
use crate::models::{
    ContentBlock, Entity, EntryIngestionRequest, EntryIngestionResponse, IngestionStatus,
    Relation, SystemLabel,
};
use crate::pipeline::{DispatchMode, ExtractionDispatcher, ExtractionPipeline, ExtractionSink};
use crate::storage::{EntityStore, RelationStore};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Persists an extraction result: bulk-upserts the derived entities, then
/// resolves relation endpoints from entity names to stored ids and
/// bulk-creates the edges.
pub struct ExtractionPersister {
    entities: Arc<dyn EntityStore>,
    relations: Arc<dyn RelationStore>,
}

impl ExtractionPersister {
    /// Creates a persister over the two repositories.
    #[must_use]
    pub fn new(entities: Arc<dyn EntityStore>, relations: Arc<dyn RelationStore>) -> Self {
        Self {
            entities,
            relations,
        }
    }

    /// Writes the extracted subgraph.
    ///
    /// Endpoint convention: an endpoint matching the `name` of an entity
    /// in this result is rewritten to that entity's stored id; anything
    /// else (the entry's id, or an id already known to the store) is kept
    /// verbatim. Edges whose endpoints still do not resolve are logged and
    /// skipped by the relation repository.
    ///
    /// # Errors
    ///
    /// Returns an error when the entity batch or the store itself fails.
    pub async fn persist(&self, result: ExtractionResult) -> Result<()> {
        if result.is_empty() {
            tracing::warn!("Extraction returned no result; skipping persistence");
            return Ok(());
        }

        let saved = if result.entities.is_empty() {
            Vec::new()
        } else {
            self.entities.bulk_create(&result.entities).await?
        };

        if result.relations.is_empty() {
            return Ok(());
        }

        let name_to_id: HashMap<&str, String> = saved
            .iter()
            .filter_map(|entity| entity.name.as_deref().map(|name| (name, entity.id_str())))
            .collect();
        let resolve = |endpoint: &str| -> String {
            name_to_id
                .get(endpoint)
                .cloned()
                .unwrap_or_else(|| endpoint.to_string())
        };

        let mapped: Vec<Relation> = result
            .relations
            .iter()
            .map(|relation| {
                Relation::new(
                    resolve(&relation.source),
                    resolve(&relation.target),
                    relation.relation_type.clone(),
                )
            })
            .collect();

        let created = self.relations.bulk_create(&mapped).await?;
        tracing::info!(
            entities = saved.len(),
            relations = created.len(),
            "Persisted extraction result"
        );
        Ok(())
    }
}

#[async_trait]
impl ExtractionSink for ExtractionPersister {
    async fn on_extraction_complete(&self, result: ExtractionResult) -> Result<()> {
        self.persist(result).await
    }
}

/// Ingests raw text entries and kicks off extraction.
pub struct EntryIngestionService {
    entities: Arc<dyn EntityStore>,
    pipeline: Arc<ExtractionPipeline>,
    dispatcher: ExtractionDispatcher,
    persister: Arc<ExtractionPersister>,
    /// With fallback disabled there is no safety net for background
    /// failures, so extraction runs inline and surfaces its error.
    require_sync: bool,
}

impl EntryIngestionService {
    /// Creates the service over the repositories and pipeline.
    #[must_use]
    pub fn new(
        entities: Arc<dyn EntityStore>,
        relations: Arc<dyn RelationStore>,
        pipeline: Arc<ExtractionPipeline>,
        allow_fallback: bool,
    ) -> Self {
        let persister = Arc::new(ExtractionPersister::new(Arc::clone(&entities), relations));
        Self {
            entities,
            dispatcher: ExtractionDispatcher::new(Arc::clone(&pipeline)),
            pipeline,
            persister,
            require_sync: !allow_fallback,
        }
    }

    /// Ingests one entry: builds and upserts the `ENTRY` node, then either
    /// runs extraction inline (returning `processed`) or defers it past
    /// the response (returning `queued`).
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad request, a store error when
    /// the entry cannot be persisted, or the provider error when inline
    /// extraction fails.
    pub async fn ingest_entry(
        &self,
        request: EntryIngestionRequest,
        force_sync: bool,
    ) -> Result<EntryIngestionResponse> {
        let entry = Self::build_entry_entity(&request)?;
        let saved = self.entities.upsert(&entry).await?;

        let mut metadata = request.metadata.clone();
        metadata.insert("text".to_string(), serde_json::json!(request.text));
        metadata.insert("source".to_string(), serde_json::json!(request.source));

        let status = if force_sync || self.require_sync {
            tracing::info!(entry_id = %saved.id, "Running extraction synchronously");
            let result = self.pipeline.run(&saved, Some(&metadata)).await?;
            self.persister.persist(result).await?;
            IngestionStatus::Processed
        } else {
            tracing::info!(entry_id = %saved.id, "Scheduling extraction");
            self.dispatcher
                .enqueue(
                    saved.clone(),
                    DispatchMode::Deferred,
                    metadata,
                    Some(Arc::clone(&self.persister) as Arc<dyn ExtractionSink>),
                )
                .await;
            IngestionStatus::Queued
        };

        Ok(EntryIngestionResponse {
            entry_id: saved.id_str(),
            status,
        })
    }

    fn build_entry_entity(request: &EntryIngestionRequest) -> Result<Entity> {
        let mut entity = Entity::new()
            .with_name(request.title.clone().unwrap_or_else(|| "Memory Entry".to_string()))
            .with_system_labels(vec![SystemLabel::Entry])
            .with_content(ContentBlock::new(request.format, request.text.clone()))
            .with_labels(request.labels.clone())
            .with_metadata(request.metadata.clone());
        if let Some(summary) = &request.summary {
            entity = entity.with_summary(summary.clone());
        }
        entity.validated()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ExtractionConfig;
    use crate::llm::ProviderRegistry;
    use crate::storage::InMemoryGraphStore;
    use std::time::Duration;

    fn service(allow_fallback: bool) -> (Arc<InMemoryGraphStore>, EntryIngestionService) {
        let store = Arc::new(InMemoryGraphStore::new());
        let registry = Arc::new(ProviderRegistry::new(ExtractionConfig::default()));
        let pipeline = Arc::new(ExtractionPipeline::new(registry, allow_fallback));
        let service = EntryIngestionService::new(
            Arc::clone(&store) as Arc<dyn EntityStore>,
            Arc::clone(&store) as Arc<dyn RelationStore>,
            pipeline,
            allow_fallback,
        );
        (store, service)
    }

    fn request(text: &str) -> EntryIngestionRequest {
        EntryIngestionRequest::from_text(text)
    }

    #[tokio::test]
    async fn test_sync_ingestion_persists_subgraph() {
        let (store, service) = service(false);
        let response = service
            .ingest_entry(request("Brian met Yoli at Twilight Florist."), true)
            .await
            .unwrap();

        assert_eq!(response.status, IngestionStatus::Processed);
        // Entry plus three derived entities.
        assert_eq!(store.entity_count(), 4);
        assert_eq!(store.relation_count(), 3);

        let relations = store.list_for_entity(&response.entry_id).await.unwrap();
        assert_eq!(relations.len(), 3);
        for relation in &relations {
            assert_eq!(relation.relation_type, "MENTIONS");
            // Both endpoints are stored ids.
            assert!(store.get(&relation.target).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_deferred_ingestion_returns_queued_then_persists() {
        let (store, service) = service(true);
        let response = service
            .ingest_entry(request("Eric visited Poughkeepsie."), false)
            .await
            .unwrap();
        assert_eq!(response.status, IngestionStatus::Queued);

        let mut waited = Duration::ZERO;
        while store.relation_count() == 0 && waited < Duration::from_secs(2) {
            tokio::time::sleep(Duration::from_millis(20)).await;
            waited += Duration::from_millis(20);
        }
        assert!(store.entity_count() > 1, "derived entities should appear");
        assert!(store.relation_count() > 0);
    }

    #[tokio::test]
    async fn test_entry_node_carries_request_fields() {
        let (store, service) = service(false);
        let mut req = request("A quiet evening.");
        req.title = Some("Evening note".to_string());
        req.labels = vec!["Journal".to_string(), "journal".to_string()];
        req.metadata
            .insert("submitted_by".to_string(), serde_json::json!("u@example.com"));

        let response = service.ingest_entry(req, true).await.unwrap();
        let entry = store.get(&response.entry_id).await.unwrap().unwrap();

        assert_eq!(entry.name.as_deref(), Some("Evening note"));
        assert_eq!(entry.labels, vec!["Journal"]);
        assert!(entry.is_entry());
        assert_eq!(
            entry.metadata.get("submitted_by"),
            Some(&serde_json::json!("u@example.com"))
        );
        assert_eq!(entry.content.as_ref().unwrap().body, "A quiet evening.");
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let (_store, service) = service(false);
        let result = service.ingest_entry(request("   "), true).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_endpoint_resolution_maps_names_to_ids() {
        let store = Arc::new(InMemoryGraphStore::new());
        let persister = ExtractionPersister::new(
            Arc::clone(&store) as Arc<dyn EntityStore>,
            Arc::clone(&store) as Arc<dyn RelationStore>,
        );

        // The entry node already exists, as it would after upsert.
        let entry = Entity::new()
            .with_name("Test Entry")
            .with_system_labels(vec![SystemLabel::Entry])
            .with_content(ContentBlock::text("Brian works at Twilight Florist."))
            .validated()
            .unwrap();
        store.upsert(&entry).await.unwrap();

        let brian = Entity::new()
            .with_name("Brian")
            .with_system_labels(vec![SystemLabel::Person])
            .with_metadata_entry("entity_type", serde_json::json!("PERSON"))
            .validated()
            .unwrap();
        let florist = Entity::new()
            .with_name("Twilight Florist")
            .with_system_labels(vec![SystemLabel::Organization])
            .with_metadata_entry("entity_type", serde_json::json!("ORGANIZATION"))
            .validated()
            .unwrap();

        let result = ExtractionResult {
            relations: vec![
                // Entry referenced by id, target by name.
                Relation::new(entry.id_str(), "Brian", "MENTIONS"),
                // Both endpoints by name.
                Relation::new("Brian", "Twilight Florist", "WORKS_AT"),
                // Unresolvable endpoint: logged and skipped.
                Relation::new("Nobody", "Brian", "KNOWS"),
            ],
            entities: vec![brian.clone(), florist.clone()],
        };

        persister.persist(result).await.unwrap();

        let from_entry = store.list_for_entity(&entry.id_str()).await.unwrap();
        assert_eq!(from_entry.len(), 1);
        assert_eq!(from_entry[0].target, brian.id_str());

        let from_brian = store.list_for_entity(&brian.id_str()).await.unwrap();
        assert_eq!(from_brian.len(), 1);
        assert_eq!(from_brian[0].target, florist.id_str());
        assert_eq!(from_brian[0].relation_type, "WORKS_AT");

        assert_eq!(store.relation_count(), 2);
    }

    #[tokio::test]
    async fn test_reingestion_same_id_is_idempotent() {
        let store = Arc::new(InMemoryGraphStore::new());
        let persister = ExtractionPersister::new(
            Arc::clone(&store) as Arc<dyn EntityStore>,
            Arc::clone(&store) as Arc<dyn RelationStore>,
        );

        let person = Entity::new()
            .with_name("Yoli")
            .with_system_labels(vec![SystemLabel::Person])
            .with_metadata_entry("entity_type", serde_json::json!("PERSON"))
            .validated()
            .unwrap();
        let result = ExtractionResult {
            entities: vec![person],
            relations: vec![],
        };
        persister.persist(result.clone()).await.unwrap();
        persister.persist(result).await.unwrap();
        assert_eq!(store.entity_count(), 1);
    }
}
