//! # Engram
//!
//! A memory-graph ingestion and retrieval service.
//!
//! Engram stores journal-style entries as typed nodes in a Neo4j property
//! graph. A pluggable language-model extraction pipeline discovers named
//! entities and relationships referenced by each entry, persists them as
//! additional nodes and edges linked back to the source entry, and makes
//! them queryable by text (with a semantic-search stub reserved for a
//! future vector index).
//!
//! ## Architecture
//!
//! - [`storage`] — the Neo4j store adapter, entity/relation repositories,
//!   and an in-memory backend for tests and development
//! - [`models`] — validated entity, relation, and ingestion types
//! - [`llm`] — interchangeable extraction providers (local heuristic,
//!   Ollama, `OpenAI`, Anthropic) plus the provider registry
//! - [`pipeline`] — the extraction runner, observers, and the background
//!   dispatcher
//! - [`services`] — entry ingestion, entity access, and search
//! - [`api`] — the authenticated axum HTTP surface
//!
//! ## Example
//!
//! ```rust,ignore
//! use engram::config::EngramConfig;
//! use engram::storage::Neo4jStore;
//!
//! let config = EngramConfig::from_env();
//! let store = Neo4jStore::new(config.graph.clone());
//! store.connect().await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod api;
pub mod config;
pub mod llm;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::EngramConfig;
pub use llm::{ExtractionProvider, ExtractionResult, ProviderRegistry};
pub use models::{ContentBlock, ContentFormat, Entity, Relation, SystemLabel};
pub use pipeline::{ExtractionDispatcher, ExtractionPipeline};
pub use services::{EntityService, EntryIngestionService, SearchService};
pub use storage::{EntityStore, InMemoryGraphStore, Neo4jStore, RelationStore};

/// Error type for engram operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Entity/relation payloads violate model invariants, malformed requests |
/// | `ExtractionProvider` | A provider cannot produce a usable extraction for an entry |
/// | `NotFound` | A node lookup by id comes back empty |
/// | `StoreUnavailable` | The graph store is used before `connect()` or is unreachable |
/// | `OperationFailed` | A query or I/O operation against the store fails |
/// | `Unauthorized` | Missing/invalid bearer token on the HTTP surface |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - An entity violates a model invariant (ENTRY payload guard, blank
    ///   content body, empty embedding vector, out-of-range confidence)
    /// - A relation type fails the `^[A-Z0-9_]+$` gate
    /// - A request body fails validation (empty text, limit out of range)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An extraction provider failed to produce usable output.
    ///
    /// This is the only error kind the pipeline-level fallback reacts to:
    /// it means no usable extraction exists for this entry on this attempt.
    #[error("extraction provider error: {0}")]
    ExtractionProvider(String),

    /// A requested node does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The graph store is not connected or not reachable.
    ///
    /// Fatal at startup; a request-level failure afterwards.
    #[error("graph store unavailable: {0}")]
    StoreUnavailable(String),

    /// An operation against the store failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Authentication failed.
    ///
    /// Raised when the bearer token is missing, expired, or fails
    /// signature/claim validation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

/// Result type alias for engram operations.
pub type Result<T> = std::result::Result<T, Error>;
