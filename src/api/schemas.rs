//! Request/response bodies for the search and listing endpoints.
//!
//! The ingestion request/response live in [`crate::models`] because the
//! ingestion service consumes them directly.

use crate::models::Entity;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Bounds applied to every search limit.
const LIMIT_RANGE: std::ops::RangeInclusive<usize> = 1..=100;

/// Body of `POST /graph/search/text`.
#[derive(Debug, Clone, Deserialize)]
pub struct TextSearchRequest {
    /// Substring to look for.
    pub query: String,
    /// Result cap, `1..=100`.
    #[serde(default = "TextSearchRequest::default_limit")]
    pub limit: usize,
}

impl TextSearchRequest {
    const fn default_limit() -> usize {
        20
    }

    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty query or an
    /// out-of-range limit.
    pub fn validate(&self) -> Result<()> {
        validate_query(&self.query, self.limit)
    }
}

/// Body of `POST /graph/search/semantic`.
#[derive(Debug, Clone, Deserialize)]
pub struct SemanticSearchRequest {
    /// Text to match against.
    pub query: String,
    /// Result cap, `1..=100`.
    #[serde(default = "SemanticSearchRequest::default_limit")]
    pub limit: usize,
}

impl SemanticSearchRequest {
    const fn default_limit() -> usize {
        10
    }

    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty query or an
    /// out-of-range limit.
    pub fn validate(&self) -> Result<()> {
        validate_query(&self.query, self.limit)
    }
}

fn validate_query(query: &str, limit: usize) -> Result<()> {
    if query.trim().is_empty() {
        return Err(Error::InvalidInput("query must not be empty".to_string()));
    }
    if !LIMIT_RANGE.contains(&limit) {
        return Err(Error::InvalidInput(format!(
            "limit {limit} outside {}..={}",
            LIMIT_RANGE.start(),
            LIMIT_RANGE.end()
        )));
    }
    Ok(())
}

/// Query parameters of `GET /graph/entities`.
#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    /// Page size.
    #[serde(default = "ListQuery::default_limit")]
    pub limit: usize,
    /// Offset into the scan.
    #[serde(default)]
    pub skip: usize,
}

impl ListQuery {
    const fn default_limit() -> usize {
        50
    }
}

/// Response of `GET /graph/entities`.
#[derive(Debug, Serialize)]
pub struct EntityListResponse {
    /// The page of entities.
    pub items: Vec<Entity>,
    /// Number of items in this page.
    pub total: usize,
}

/// Response of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Graph store status.
    pub database: &'static str,
}
