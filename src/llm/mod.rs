//! Extraction providers.
//!
//! Provides a unified interface for turning a saved `ENTRY` entity into a
//! set of derived entities and relations, backed by one of four
//! interchangeable implementations.
//!
//! # Supported Providers
//!
//! | Provider | Client | Notes |
//! |----------|--------|-------|
//! | Local heuristic | [`LocalExtractor`] | Deterministic, dependency-free |
//! | Ollama | [`OllamaProvider`] | Self-hosted; retries on timeout only |
//! | `OpenAI` | [`OpenAiProvider`] | Degrades to local on key/transport failures |
//! | Anthropic | [`AnthropicProvider`] | Degrades to local on key/transport failures |
//!
//! # Parsing contract
//!
//! Every model-backed provider expects, after cleaning, a JSON object of
//! the form:
//!
//! ```json
//! {"entities": [...], "relations": [{"source": "...", "target": "...", "relationType": "UPPER_SNAKE"}]}
//! ```
//!
//! Unknown entity or relation payloads are skipped individually with a
//! warning; an entirely empty result after filtering is an error — the
//! provider gave nothing usable.

mod anthropic;
mod local;
mod ollama;
mod openai;
pub mod registry;

pub use anthropic::AnthropicProvider;
pub use local::{ExtractionHints, LocalExtractor};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use registry::ProviderRegistry;

use crate::models::{Entity, Metadata, Relation};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

/// A provider that can transform an `ENTRY` entity into additional graph
/// nodes and edges.
///
/// Providers hold no mutable state after construction and are safe for
/// concurrent calls.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// The provider name, as used by the registry.
    fn name(&self) -> &'static str;

    /// Extracts entities and relations from the entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExtractionProvider`] when no usable extraction
    /// exists for this entry on this attempt. The local extractor never
    /// errors on missing input — it returns an empty result instead.
    async fn extract(
        &self,
        entry: &Entity,
        metadata: Option<&Metadata>,
    ) -> Result<ExtractionResult>;
}

/// The outcome of one extraction run.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    /// Derived entities.
    pub entities: Vec<Entity>,
    /// Edges among the derived entities and back to the entry.
    pub relations: Vec<Relation>,
}

impl ExtractionResult {
    /// Returns true when the run produced nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }
}

/// Resolves the text a provider should analyze.
///
/// Precedence: the entry's content body, then its summary, then the
/// request metadata's `text`, then the entry metadata's `raw_text`.
#[must_use]
pub fn source_text(entry: &Entity, metadata: Option<&Metadata>) -> Option<String> {
    if let Some(content) = &entry.content {
        if !content.body.trim().is_empty() {
            return Some(content.body.clone());
        }
    }
    if let Some(summary) = &entry.summary {
        if !summary.trim().is_empty() {
            return Some(summary.clone());
        }
    }
    if let Some(text) = metadata
        .and_then(|m| m.get("text"))
        .and_then(|v| v.as_str())
        .filter(|t| !t.trim().is_empty())
    {
        return Some(text.to_string());
    }
    entry
        .metadata
        .get("raw_text")
        .and_then(|v| v.as_str())
        .filter(|t| !t.trim().is_empty())
        .map(ToString::to_string)
}

/// Builds an HTTP client for provider requests with the configured timeout.
#[must_use]
pub fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(3))
        .build()
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Failed to build provider HTTP client; using defaults");
            reqwest::Client::new()
        })
}

/// Cleans a raw model response down to its JSON object.
///
/// Strips markdown code-fence markers and an optional `json` language
/// prefix, then clips to the first `{` … last `}` substring.
///
/// # Errors
///
/// Returns [`Error::ExtractionProvider`] when no JSON object can be
/// located.
pub fn clean_model_response(raw: &str) -> Result<String> {
    let mut cleaned = raw.trim();
    if cleaned.starts_with("```") {
        cleaned = cleaned.trim_matches('`').trim();
        if cleaned
            .get(..4)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("json"))
        {
            cleaned = cleaned[4..].trim();
        }
    }
    let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) else {
        return Err(Error::ExtractionProvider(
            "provider response did not contain a JSON object".to_string(),
        ));
    };
    if end < start {
        return Err(Error::ExtractionProvider(
            "provider response did not contain a JSON object".to_string(),
        ));
    }
    Ok(cleaned[start..=end].to_string())
}

/// Parses a cleaned model response into an [`ExtractionResult`].
///
/// Parsing is strict at the envelope level and lenient per item: an entity
/// or relation payload that fails validation is logged and skipped while
/// the rest continue.
///
/// # Errors
///
/// Returns [`Error::ExtractionProvider`] when the response is not valid
/// JSON, when `entities`/`relations` are present but not lists, or when
/// nothing usable survives filtering.
pub fn parse_extraction_payload(raw: &str) -> Result<ExtractionResult> {
    let parsed: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| Error::ExtractionProvider(format!("provider response is not valid JSON: {e}")))?;

    let entities_payload = list_field(&parsed, "entities")?;
    let relations_payload = list_field(&parsed, "relations")?;

    let mut entities = Vec::new();
    for payload in entities_payload {
        match Entity::from_payload(payload.clone()) {
            Ok(entity) => entities.push(entity),
            Err(e) => tracing::warn!(error = %e, "Skipping invalid entity payload"),
        }
    }

    let mut relations = Vec::new();
    for payload in relations_payload {
        match Relation::from_payload(payload.clone()) {
            Ok(relation) => relations.push(relation),
            Err(e) => tracing::warn!(error = %e, "Skipping invalid relation payload"),
        }
    }

    if entities.is_empty() && relations.is_empty() {
        return Err(Error::ExtractionProvider(
            "provider returned empty payload".to_string(),
        ));
    }

    Ok(ExtractionResult {
        entities,
        relations,
    })
}

fn list_field<'a>(
    parsed: &'a serde_json::Value,
    field: &str,
) -> Result<&'a [serde_json::Value]> {
    match parsed.get(field) {
        None => Ok(&[]),
        Some(serde_json::Value::Array(items)) => Ok(items),
        Some(_) => Err(Error::ExtractionProvider(format!(
            "provider response field '{field}' is not a list"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{ContentBlock, SystemLabel};
    use serde_json::json;

    #[test]
    fn test_clean_raw_json() {
        let cleaned = clean_model_response(r#"{"entities": []}"#).unwrap();
        assert_eq!(cleaned, r#"{"entities": []}"#);
    }

    #[test]
    fn test_clean_strips_fences_and_prefix() {
        let cleaned = clean_model_response("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(cleaned, r#"{"a": 1}"#);

        let cleaned = clean_model_response("Here you go: {\"a\": 1} hope it helps").unwrap();
        assert_eq!(cleaned, r#"{"a": 1}"#);
    }

    #[test]
    fn test_clean_without_braces_errors() {
        assert!(matches!(
            clean_model_response("no json here").unwrap_err(),
            Error::ExtractionProvider(_)
        ));
    }

    #[test]
    fn test_parse_skips_invalid_items() {
        let raw = json!({
            "entities": [
                {"name": "Brian", "system_labels": ["PERSON"], "labels": ["extracted"]},
                {"system_labels": ["WIZARD"]},
                "not even an object"
            ],
            "relations": [
                {"source": "entry-1", "target": "Brian", "relationType": "MENTIONS"},
                {"source": "entry-1"}
            ]
        })
        .to_string();

        let result = parse_extraction_payload(&raw).unwrap();
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.relations.len(), 1);
        assert_eq!(result.entities[0].name.as_deref(), Some("Brian"));
    }

    #[test]
    fn test_parse_empty_after_filtering_errors() {
        let raw = json!({"entities": [], "relations": []}).to_string();
        assert!(matches!(
            parse_extraction_payload(&raw).unwrap_err(),
            Error::ExtractionProvider(_)
        ));

        let raw = json!({"entities": [{"system_labels": ["WIZARD"]}]}).to_string();
        assert!(parse_extraction_payload(&raw).is_err());
    }

    #[test]
    fn test_parse_rejects_non_list_fields() {
        let raw = json!({"entities": "oops"}).to_string();
        assert!(parse_extraction_payload(&raw).is_err());
    }

    #[test]
    fn test_source_text_precedence() {
        let entry = Entity::new()
            .with_system_labels(vec![SystemLabel::Entry])
            .with_content(ContentBlock::text("body text"))
            .with_summary("summary text")
            .validated()
            .unwrap();
        assert_eq!(source_text(&entry, None).unwrap(), "body text");

        let entry = Entity::new()
            .with_summary("summary text")
            .validated()
            .unwrap();
        assert_eq!(source_text(&entry, None).unwrap(), "summary text");

        let mut metadata = Metadata::new();
        metadata.insert("text".to_string(), json!("metadata text"));
        let entry = Entity::new().with_name("x").validated().unwrap();
        assert_eq!(
            source_text(&entry, Some(&metadata)).unwrap(),
            "metadata text"
        );

        let entry = Entity::new()
            .with_metadata_entry("raw_text", json!("raw text"))
            .validated()
            .unwrap();
        assert_eq!(source_text(&entry, None).unwrap(), "raw text");

        let entry = Entity::new().with_name("empty").validated().unwrap();
        assert!(source_text(&entry, None).is_none());
    }
}
