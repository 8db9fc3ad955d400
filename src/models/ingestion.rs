//! Ingestion request and response types.

use crate::models::{ContentFormat, Metadata};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A request to ingest one journal-style entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryIngestionRequest {
    /// Raw note or memory text.
    pub text: String,
    /// Optional display title for the entry.
    #[serde(default)]
    pub title: Option<String>,
    /// Optional summary to show in listings.
    #[serde(default)]
    pub summary: Option<String>,
    /// User-supplied free-form labels.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Originating application or integration.
    #[serde(default)]
    pub source: Option<String>,
    /// Entry text format.
    #[serde(default)]
    pub format: ContentFormat,
    /// Additional metadata supplied by clients.
    #[serde(default)]
    pub metadata: Metadata,
    /// Forces the extraction pipeline to run inline. Testing only: the
    /// deferred path is the production default.
    #[serde(default)]
    pub process_synchronously: bool,
}

impl EntryIngestionRequest {
    /// Creates a request carrying only text, with defaults everywhere else.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            title: None,
            summary: None,
            labels: Vec::new(),
            source: None,
            format: ContentFormat::default(),
            metadata: Metadata::new(),
            process_synchronously: false,
        }
    }
}

/// Whether extraction ran inline or was deferred past the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    /// Extraction was scheduled to run after the response.
    Queued,
    /// Extraction ran inline and its results are already persisted.
    Processed,
}

impl fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Processed => write!(f, "processed"),
        }
    }
}

/// The accepted-entry acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryIngestionResponse {
    /// Id of the persisted entry node.
    pub entry_id: String,
    /// Whether extraction ran inline or was deferred.
    pub status: IngestionStatus,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: EntryIngestionRequest =
            serde_json::from_str(r#"{"text": "hello"}"#).unwrap();
        assert_eq!(request.text, "hello");
        assert_eq!(request.format, ContentFormat::Markdown);
        assert!(!request.process_synchronously);
        assert!(request.labels.is_empty());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let response = EntryIngestionResponse {
            entry_id: "abc".to_string(),
            status: IngestionStatus::Queued,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "queued");
        assert_eq!(IngestionStatus::Processed.to_string(), "processed");
    }
}
