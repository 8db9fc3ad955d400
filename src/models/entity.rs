//! The polymorphic entity node and its nested value types.
//!
//! A single concrete [`Entity`] struct models every node in the graph. What
//! kind of node it is — a journal entry, a person, a location — is carried
//! by [`SystemLabel`] tokens from a closed vocabulary, applied both as an
//! attribute and as first-class graph labels at the store.
//!
//! # System Labels
//!
//! | Label | Meaning |
//! |-------|---------|
//! | `ENTRY` | A user-authored memory carrying the full original text |
//! | `ENTITY` | Present on every node; the canonical identity label |
//! | `PERSON` | Named individual |
//! | `LOCATION` | Place |
//! | `ORGANIZATION` | Company, team, group |
//! | `OBJECT` | Physical or digital thing |
//! | `EVENT` | Something that happened |
//! | `CONCEPT` | Abstract idea |
//! | `OBSERVATION` | A recorded observation node |
//!
//! # Example
//!
//! ```rust
//! use engram::models::{ContentBlock, Entity, SystemLabel};
//!
//! let entry = Entity::new()
//!     .with_name("Memory Entry")
//!     .with_system_labels(vec![SystemLabel::Entry])
//!     .with_content(ContentBlock::markdown("Brian met Yoli at Twilight Florist."))
//!     .validated()
//!     .unwrap();
//!
//! // ENTITY is always present, prepended when omitted.
//! assert_eq!(
//!     entry.system_labels,
//!     vec![SystemLabel::Entity, SystemLabel::Entry]
//! );
//! ```

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Free-form key/value metadata attached to entities and nested values.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Reserved label tokens from the closed system vocabulary.
///
/// The set is closed on purpose: repositories enumerate it when applying
/// graph-level labels, so an unknown token can never reach a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SystemLabel {
    /// A user-authored memory entry; the root of an extraction subgraph.
    Entry,
    /// The canonical identity label, present on every node.
    Entity,
    /// Named individual.
    Person,
    /// Place.
    Location,
    /// Company, team, or group.
    Organization,
    /// Physical or digital thing.
    Object,
    /// Something that happened.
    Event,
    /// Abstract idea.
    Concept,
    /// A recorded observation node.
    Observation,
}

impl SystemLabel {
    /// Returns every label in the closed vocabulary.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Entry,
            Self::Entity,
            Self::Person,
            Self::Location,
            Self::Organization,
            Self::Object,
            Self::Event,
            Self::Concept,
            Self::Observation,
        ]
    }

    /// Returns the label as its wire/storage token.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "ENTRY",
            Self::Entity => "ENTITY",
            Self::Person => "PERSON",
            Self::Location => "LOCATION",
            Self::Organization => "ORGANIZATION",
            Self::Object => "OBJECT",
            Self::Event => "EVENT",
            Self::Concept => "CONCEPT",
            Self::Observation => "OBSERVATION",
        }
    }

    /// Parses a label token, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ENTRY" => Some(Self::Entry),
            "ENTITY" => Some(Self::Entity),
            "PERSON" => Some(Self::Person),
            "LOCATION" => Some(Self::Location),
            "ORGANIZATION" => Some(Self::Organization),
            "OBJECT" => Some(Self::Object),
            "EVENT" => Some(Self::Event),
            "CONCEPT" => Some(Self::Concept),
            "OBSERVATION" => Some(Self::Observation),
            _ => None,
        }
    }
}

impl fmt::Display for SystemLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SystemLabel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown system label: {s}"))
    }
}

/// Format of an entry's content body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    /// Plain text.
    Text,
    /// Markdown.
    #[default]
    Markdown,
    /// HTML.
    Html,
    /// JSON.
    Json,
    /// Anything else.
    Other,
}

impl ContentFormat {
    /// Returns the format as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Json => "json",
            Self::Other => "other",
        }
    }
}

/// The full original body of an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Body format.
    #[serde(default)]
    pub format: ContentFormat,
    /// The content itself. Must be non-empty.
    pub body: String,
    /// Free-form metadata about the content.
    #[serde(default)]
    pub metadata: Metadata,
}

impl ContentBlock {
    /// Creates a content block with an explicit format.
    #[must_use]
    pub fn new(format: ContentFormat, body: impl Into<String>) -> Self {
        Self {
            format,
            body: body.into(),
            metadata: Metadata::new(),
        }
    }

    /// Creates a plain-text content block.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(ContentFormat::Text, body)
    }

    /// Creates a markdown content block.
    #[must_use]
    pub fn markdown(body: impl Into<String>) -> Self {
        Self::new(ContentFormat::Markdown, body)
    }
}

/// A media file referenced by an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    /// Where the media lives.
    pub uri: String,
    /// MIME type, e.g. `image/jpeg`.
    pub media_type: String,
    /// Optional display title.
    #[serde(default)]
    pub title: Option<String>,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

/// A dense vector representation of the entity, tagged with its model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    /// The embedding model that produced the vector.
    pub model: String,
    /// The vector itself. Must be non-empty.
    pub vector: Vec<f32>,
    /// When the vector was computed.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

/// A discrete observation recorded against an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Unique observation id.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// What was observed. Must be non-empty.
    pub text: String,
    /// Where the observation came from.
    #[serde(default)]
    pub source: Option<String>,
    /// When the observation was recorded.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Confidence in `[0, 1]`, when known.
    #[serde(default)]
    pub confidence: Option<f32>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Observation {
    /// Creates an observation with the given text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            source: None,
            created_at: Utc::now(),
            confidence: None,
            metadata: Metadata::new(),
        }
    }

    /// Sets the observation source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata_entry(
        mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// The single polymorphic node type of the graph.
///
/// Construct with [`Entity::new`] and the `with_*` builders, then call
/// [`Entity::validated`] — that is the constructor of record, and the only
/// way to obtain an entity that satisfies the model invariants:
///
/// 1. An `ENTRY` must be able to reconstruct its memory: at least one of
///    `content`, `attachments`, `metadata` is non-empty.
/// 2. `ENTITY` is always present in `system_labels`.
/// 3. `labels` contains no case-insensitive duplicates and no blanks.
/// 4. `embedding.vector`, when present, is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique stable identifier.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Opaque foreign key to a source system.
    #[serde(default)]
    pub external_id: Option<String>,
    /// Short canonical label.
    #[serde(default)]
    pub name: Option<String>,
    /// One-to-two-sentence description.
    #[serde(default)]
    pub summary: Option<String>,
    /// Free-form tags, deduplicated case-insensitively, order preserved.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Reserved labels from the closed vocabulary; `ENTITY` always present.
    #[serde(default)]
    pub system_labels: Vec<SystemLabel>,
    /// The entry body, for `ENTRY` nodes.
    #[serde(default)]
    pub content: Option<ContentBlock>,
    /// Attached media.
    #[serde(default)]
    pub attachments: Vec<MediaAttachment>,
    /// Optional embedding vector.
    #[serde(default)]
    pub embedding: Option<EmbeddingVector>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// Recorded observations.
    #[serde(default)]
    pub observations: Vec<Observation>,
    /// Creation timestamp.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

impl Entity {
    /// Creates an empty entity carrying only the canonical `ENTITY` label.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            external_id: None,
            name: None,
            summary: None,
            labels: Vec::new(),
            system_labels: vec![SystemLabel::Entity],
            content: None,
            attachments: Vec::new(),
            embedding: None,
            metadata: Metadata::new(),
            observations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the entity id.
    #[must_use]
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Sets the canonical name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the summary.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Sets the external id.
    #[must_use]
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Replaces the free-form labels.
    #[must_use]
    pub fn with_labels(mut self, labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Appends a free-form label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Replaces the system labels.
    #[must_use]
    pub fn with_system_labels(mut self, labels: Vec<SystemLabel>) -> Self {
        self.system_labels = labels;
        self
    }

    /// Appends a system label.
    #[must_use]
    pub fn with_system_label(mut self, label: SystemLabel) -> Self {
        self.system_labels.push(label);
        self
    }

    /// Sets the content block.
    #[must_use]
    pub fn with_content(mut self, content: ContentBlock) -> Self {
        self.content = Some(content);
        self
    }

    /// Appends a media attachment.
    #[must_use]
    pub fn with_attachment(mut self, attachment: MediaAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Sets the embedding vector.
    #[must_use]
    pub fn with_embedding(mut self, embedding: EmbeddingVector) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Replaces the metadata map.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata_entry(
        mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Appends an observation.
    #[must_use]
    pub fn with_observation(mut self, observation: Observation) -> Self {
        self.observations.push(observation);
        self
    }

    /// Normalizes the entity and checks every model invariant.
    ///
    /// This is the constructor of record: label lists are normalized in
    /// place (trimmed, blanks dropped, case-insensitive dedup with original
    /// order preserved; `ENTITY` prepended to `system_labels` when absent)
    /// and the payload invariants are enforced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when:
    /// - the entity is an `ENTRY` with no content, attachments, or metadata
    /// - a content block has a blank body
    /// - the embedding vector is empty
    /// - an observation has blank text or a confidence outside `[0, 1]`
    pub fn validated(mut self) -> Result<Self> {
        self.labels = normalize_labels(&self.labels);
        self.system_labels = normalize_system_labels(&self.system_labels);

        if let Some(content) = &self.content {
            if content.body.trim().is_empty() {
                return Err(Error::InvalidInput(
                    "content block body must not be empty".to_string(),
                ));
            }
        }

        if let Some(embedding) = &self.embedding {
            if embedding.vector.is_empty() {
                return Err(Error::InvalidInput(
                    "embedding vector must not be empty".to_string(),
                ));
            }
        }

        for observation in &self.observations {
            if observation.text.trim().is_empty() {
                return Err(Error::InvalidInput(
                    "observation text must not be empty".to_string(),
                ));
            }
            if let Some(confidence) = observation.confidence {
                if !(0.0..=1.0).contains(&confidence) {
                    return Err(Error::InvalidInput(format!(
                        "observation confidence {confidence} outside [0, 1]"
                    )));
                }
            }
        }

        if self.is_entry()
            && self.content.is_none()
            && self.attachments.is_empty()
            && self.metadata.is_empty()
        {
            return Err(Error::InvalidInput(
                "an ENTRY must carry content, attachments, or metadata".to_string(),
            ));
        }

        Ok(self)
    }

    /// Deserializes and validates an untrusted payload (e.g. model output).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the payload does not
    /// deserialize or violates a model invariant.
    pub fn from_payload(value: serde_json::Value) -> Result<Self> {
        let entity: Self = serde_json::from_value(value)
            .map_err(|e| Error::InvalidInput(format!("entity payload: {e}")))?;
        entity.validated()
    }

    /// Returns true if this entity carries the `ENTRY` label.
    #[must_use]
    pub fn is_entry(&self) -> bool {
        self.system_labels.contains(&SystemLabel::Entry)
    }

    /// The entity id as its canonical string form.
    #[must_use]
    pub fn id_str(&self) -> String {
        self.id.to_string()
    }
}

/// Trims, drops blanks, and deduplicates case-insensitively, keeping the
/// first occurrence and the original order.
fn normalize_labels(labels: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for label in labels {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            out.push(trimmed.to_string());
        }
    }
    out
}

/// Deduplicates preserving insertion order, prepending `ENTITY` when absent.
fn normalize_system_labels(labels: &[SystemLabel]) -> Vec<SystemLabel> {
    let mut seen: HashSet<SystemLabel> = HashSet::new();
    let mut out = Vec::new();
    for label in labels {
        if seen.insert(*label) {
            out.push(*label);
        }
    }
    if !out.contains(&SystemLabel::Entity) {
        out.insert(0, SystemLabel::Entity);
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_system_label_round_trip() {
        for label in SystemLabel::all() {
            assert_eq!(SystemLabel::parse(label.as_str()), Some(*label));
        }
        assert_eq!(SystemLabel::parse("person"), Some(SystemLabel::Person));
        assert_eq!(SystemLabel::parse("UNKNOWN"), None);
    }

    #[test]
    fn test_entity_label_always_present() {
        let entity = Entity::new()
            .with_system_labels(vec![SystemLabel::Person])
            .with_name("Brian")
            .validated()
            .unwrap();
        assert_eq!(
            entity.system_labels,
            vec![SystemLabel::Entity, SystemLabel::Person]
        );
    }

    #[test]
    fn test_system_labels_deduplicated_in_order() {
        let entity = Entity::new()
            .with_system_labels(vec![
                SystemLabel::Entry,
                SystemLabel::Entity,
                SystemLabel::Entry,
            ])
            .with_content(ContentBlock::text("hello"))
            .validated()
            .unwrap();
        assert_eq!(
            entity.system_labels,
            vec![SystemLabel::Entry, SystemLabel::Entity]
        );
    }

    #[test]
    fn test_labels_normalized() {
        let entity = Entity::new()
            .with_labels(vec!["Generated", "  ", "generated", "extracted", ""])
            .with_name("x")
            .validated()
            .unwrap();
        assert_eq!(entity.labels, vec!["Generated", "extracted"]);
    }

    #[test]
    fn test_entry_payload_guard() {
        let err = Entity::new()
            .with_system_labels(vec![SystemLabel::Entry])
            .validated()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        // Metadata alone satisfies the guard.
        let ok = Entity::new()
            .with_system_labels(vec![SystemLabel::Entry])
            .with_metadata_entry("raw_text", json!("hello"))
            .validated();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_blank_content_body_rejected() {
        let err = Entity::new()
            .with_content(ContentBlock::text("   "))
            .validated()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_empty_embedding_rejected() {
        let err = Entity::new()
            .with_embedding(EmbeddingVector {
                model: "test-embedder".to_string(),
                vector: vec![],
                created_at: Utc::now(),
                metadata: Metadata::new(),
            })
            .validated()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_observation_confidence_range() {
        let mut observation = Observation::new("seen at the shop");
        observation.confidence = Some(1.5);
        let err = Entity::new()
            .with_observation(observation)
            .validated()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_from_payload_generates_id_and_normalizes() {
        let payload = json!({
            "name": "Twilight Florist",
            "system_labels": ["ORGANIZATION"],
            "labels": ["extracted", "Extracted", "workplace"],
            "summary": "A florist shop.",
            "metadata": {"source_entry_id": "abc"}
        });
        let entity = Entity::from_payload(payload).unwrap();
        assert_eq!(entity.name.as_deref(), Some("Twilight Florist"));
        assert_eq!(
            entity.system_labels,
            vec![SystemLabel::Entity, SystemLabel::Organization]
        );
        assert_eq!(entity.labels, vec!["extracted", "workplace"]);
    }

    #[test]
    fn test_from_payload_rejects_garbage() {
        assert!(Entity::from_payload(json!("not an object")).is_err());
        assert!(Entity::from_payload(json!({"system_labels": ["WIZARD"]})).is_err());
    }

    #[test]
    fn test_serde_uses_uppercase_tokens() {
        let entity = Entity::new()
            .with_system_labels(vec![SystemLabel::Entry])
            .with_content(ContentBlock::markdown("body"))
            .validated()
            .unwrap();
        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(value["system_labels"], json!(["ENTITY", "ENTRY"]));
        assert_eq!(value["content"]["format"], json!("markdown"));
    }
}
