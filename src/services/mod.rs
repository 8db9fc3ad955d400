//! Application services.

mod entity;
mod ingestion;
mod search;

pub use entity::EntityService;
pub use ingestion::{EntryIngestionService, ExtractionPersister};
pub use search::{SearchService, SemanticSearchResult};
