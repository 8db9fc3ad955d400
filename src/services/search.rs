//! Search over stored entities.

use crate::models::Entity;
use crate::storage::EntityStore;
use crate::Result;
use serde::Serialize;
use std::sync::Arc;

/// Strategy tag reported by the semantic stub.
///
/// The envelope is part of the API contract: when a real nearest-neighbor
/// index lands, clients observe the strategy change without a break.
const TEXT_PROXY_STRATEGY: &str = "text-proxy";

/// A semantic search response: the strategy used plus its results.
#[derive(Debug, Clone, Serialize)]
pub struct SemanticSearchResult {
    /// Which strategy produced the results.
    pub strategy: String,
    /// Matched entities.
    pub results: Vec<Entity>,
}

/// Substring search over entity name/summary, plus the semantic stub.
pub struct SearchService {
    entities: Arc<dyn EntityStore>,
}

impl SearchService {
    /// Creates the service over the entity repository.
    #[must_use]
    pub fn new(entities: Arc<dyn EntityStore>) -> Self {
        Self { entities }
    }

    /// Case-insensitive substring match over `name` and `summary`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn text_search(&self, query: &str, limit: usize) -> Result<Vec<Entity>> {
        self.entities.search(query, limit).await
    }

    /// Semantic search stub that delegates to text search.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn semantic_search(&self, query: &str, limit: usize) -> Result<SemanticSearchResult> {
        let results = self.entities.search(query, limit).await?;
        Ok(SemanticSearchResult {
            strategy: TEXT_PROXY_STRATEGY.to_string(),
            results,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::Entity;
    use crate::storage::InMemoryGraphStore;

    #[tokio::test]
    async fn test_semantic_search_reports_strategy() {
        let store = Arc::new(InMemoryGraphStore::new());
        let florist = Entity::new()
            .with_name("Twilight Florist")
            .validated()
            .unwrap();
        store.upsert(&florist).await.unwrap();

        let service = SearchService::new(store as Arc<dyn EntityStore>);
        let semantic = service.semantic_search("twilight", 10).await.unwrap();
        assert_eq!(semantic.strategy, "text-proxy");
        assert_eq!(semantic.results.len(), 1);

        let text = service.text_search("twilight", 10).await.unwrap();
        assert_eq!(text.len(), 1);
    }
}
