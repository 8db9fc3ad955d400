//! Connection lifecycle for the Neo4j Bolt driver.
//!
//! One [`Neo4jStore`] is shared process-wide. `connect()` must be called
//! before any repository touches the store; sessions are per-query and
//! managed by the driver (commit on success, server-side rollback on
//! failure).

use crate::config::GraphStoreConfig;
use crate::storage::traits::StoreHealth;
use crate::{Error, Result};
use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph};
use tokio::sync::RwLock;

/// Shared connection handle to the graph database.
pub struct Neo4jStore {
    config: GraphStoreConfig,
    graph: RwLock<Option<Graph>>,
}

impl Neo4jStore {
    /// Creates an unconnected store handle.
    #[must_use]
    pub fn new(config: GraphStoreConfig) -> Self {
        Self {
            config,
            graph: RwLock::new(None),
        }
    }

    /// Establishes the driver connection. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] when the driver cannot be
    /// configured or the server cannot be reached.
    pub async fn connect(&self) -> Result<()> {
        let mut guard = self.graph.write().await;
        if guard.is_some() {
            return Ok(());
        }

        let config = ConfigBuilder::default()
            .uri(&self.config.uri)
            .user(&self.config.username)
            .password(&self.config.password)
            .db(self.config.database.as_str())
            .build()
            .map_err(|e| Error::StoreUnavailable(format!("driver config: {e}")))?;

        let graph = Graph::connect(config)
            .await
            .map_err(|e| Error::StoreUnavailable(format!("connect {}: {e}", self.config.uri)))?;

        tracing::info!(uri = %self.config.uri, database = %self.config.database, "Connected to graph store");
        *guard = Some(graph);
        Ok(())
    }

    /// Drops the driver connection.
    pub async fn close(&self) {
        let mut guard = self.graph.write().await;
        if guard.take().is_some() {
            tracing::info!("Closed graph store connection");
        }
    }

    /// Returns a cheap cloneable handle to the connected driver.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] when [`Neo4jStore::connect`] has
    /// not been called — repositories treat this as a fatal configuration
    /// error.
    pub async fn graph(&self) -> Result<Graph> {
        self.graph.read().await.clone().ok_or_else(|| {
            Error::StoreUnavailable("graph store not initialized; call connect() first".to_string())
        })
    }
}

#[async_trait]
impl StoreHealth for Neo4jStore {
    async fn verify_connectivity(&self) -> bool {
        let Ok(graph) = self.graph().await else {
            return false;
        };
        match graph.run(neo4rs::query("RETURN 1")).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Graph store connectivity check failed");
                false
            }
        }
    }
}
