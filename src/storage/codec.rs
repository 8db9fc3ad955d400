//! The entity ⇄ node-property serialization contract.
//!
//! Node properties in the graph are limited to scalars and primitive
//! arrays, so nested structured fields travel as JSON-encoded strings and
//! timestamps as RFC 3339 strings. [`EntityProps`] is the flat property
//! shape every backend stores; both directions of the conversion live here
//! so Neo4j and the in-memory backend cannot drift apart.

use crate::models::{
    ContentBlock, EmbeddingVector, Entity, MediaAttachment, Metadata, Observation, SystemLabel,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The flat property form of an entity node.
///
/// `content`, `attachments`, `embedding`, `metadata`, and `observations`
/// hold JSON-encoded strings; `labels` and `system_labels` are string
/// arrays (system labels are *also* applied as graph-level labels by the
/// repositories).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityProps {
    /// Entity id in canonical string form.
    pub id: String,
    /// Opaque foreign key, when present.
    pub external_id: Option<String>,
    /// Canonical name.
    pub name: Option<String>,
    /// Short description.
    pub summary: Option<String>,
    /// Free-form labels.
    pub labels: Vec<String>,
    /// System label tokens.
    pub system_labels: Vec<String>,
    /// JSON-encoded [`ContentBlock`].
    pub content: Option<String>,
    /// JSON-encoded attachment list.
    pub attachments: Option<String>,
    /// JSON-encoded [`EmbeddingVector`].
    pub embedding: Option<String>,
    /// JSON-encoded metadata map.
    pub metadata: Option<String>,
    /// JSON-encoded observation list.
    pub observations: Option<String>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 update timestamp.
    pub updated_at: String,
}

/// Serializes an entity into its flat property form.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if a nested field cannot be
/// JSON-encoded (practically unreachable for well-formed entities).
pub fn entity_to_props(entity: &Entity) -> Result<EntityProps> {
    Ok(EntityProps {
        id: entity.id_str(),
        external_id: entity.external_id.clone(),
        name: entity.name.clone(),
        summary: entity.summary.clone(),
        labels: entity.labels.clone(),
        system_labels: entity
            .system_labels
            .iter()
            .map(|label| label.as_str().to_string())
            .collect(),
        content: entity
            .content
            .as_ref()
            .map(|c| encode_field("content", c))
            .transpose()?,
        attachments: Some(encode_field("attachments", &entity.attachments)?),
        embedding: entity
            .embedding
            .as_ref()
            .map(|e| encode_field("embedding", e))
            .transpose()?,
        metadata: Some(encode_field("metadata", &entity.metadata)?),
        observations: Some(encode_field("observations", &entity.observations)?),
        created_at: entity.created_at.to_rfc3339(),
        updated_at: entity.updated_at.to_rfc3339(),
    })
}

/// Decodes the flat property form back into an entity.
///
/// Decoding is deliberately lenient everywhere except the id: a JSON field
/// that fails to parse is logged and dropped to its empty default, and an
/// unknown system-label token is logged and skipped. Corrupt storage must
/// not poison retrieval.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] only when the required `id` property
/// is not a valid UUID.
pub fn props_to_entity(props: EntityProps) -> Result<Entity> {
    let id = Uuid::parse_str(&props.id).map_err(|e| Error::OperationFailed {
        operation: "decode_entity".to_string(),
        cause: format!("node id '{}' is not a UUID: {e}", props.id),
    })?;

    let system_labels = props
        .system_labels
        .iter()
        .filter_map(|token| {
            let parsed = SystemLabel::parse(token);
            if parsed.is_none() {
                tracing::warn!(id = %props.id, token, "Skipping unknown system label token");
            }
            parsed
        })
        .collect();

    Ok(Entity {
        id,
        external_id: props.external_id,
        name: props.name,
        summary: props.summary,
        labels: props.labels,
        system_labels,
        content: decode_optional::<ContentBlock>(props.content.as_deref(), "content", &props.id),
        attachments: decode_or_default::<Vec<MediaAttachment>>(
            props.attachments.as_deref(),
            "attachments",
            &props.id,
        ),
        embedding: decode_optional::<EmbeddingVector>(
            props.embedding.as_deref(),
            "embedding",
            &props.id,
        ),
        metadata: decode_or_default::<Metadata>(props.metadata.as_deref(), "metadata", &props.id),
        observations: decode_or_default::<Vec<Observation>>(
            props.observations.as_deref(),
            "observations",
            &props.id,
        ),
        created_at: decode_timestamp(&props.created_at, "created_at", &props.id),
        updated_at: decode_timestamp(&props.updated_at, "updated_at", &props.id),
    })
}

fn encode_field<T: serde::Serialize>(field: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::OperationFailed {
        operation: "serialize_entity".to_string(),
        cause: format!("field '{field}': {e}"),
    })
}

fn decode_optional<T: serde::de::DeserializeOwned>(
    raw: Option<&str>,
    field: &str,
    id: &str,
) -> Option<T> {
    let raw = raw?;
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(id, field, error = %e, "Failed to decode JSON field; dropping");
            None
        }
    }
}

fn decode_or_default<T: serde::de::DeserializeOwned + Default>(
    raw: Option<&str>,
    field: &str,
    id: &str,
) -> T {
    decode_optional(raw, field, id).unwrap_or_default()
}

fn decode_timestamp(raw: &str, field: &str, id: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).map_or_else(
        |e| {
            tracing::warn!(id, field, error = %e, "Failed to parse timestamp; using now");
            Utc::now()
        },
        |dt| dt.with_timezone(&Utc),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::ContentBlock;
    use serde_json::json;

    fn sample_entity() -> Entity {
        Entity::new()
            .with_name("Twilight Florist")
            .with_system_labels(vec![SystemLabel::Organization])
            .with_labels(vec!["extracted", "workplace"])
            .with_content(ContentBlock::markdown("A florist shop in town."))
            .with_metadata_entry("source_entry_id", json!("abc-123"))
            .with_observation(Observation::new("Mentioned alongside entry abc-123"))
            .validated()
            .unwrap()
    }

    #[test]
    fn test_round_trip_preserves_nested_fields() {
        let entity = sample_entity();
        let props = entity_to_props(&entity).unwrap();
        let decoded = props_to_entity(props).unwrap();

        assert_eq!(decoded.id, entity.id);
        assert_eq!(decoded.content, entity.content);
        assert_eq!(decoded.metadata, entity.metadata);
        assert_eq!(decoded.observations, entity.observations);
        assert_eq!(decoded.labels, entity.labels);
        assert_eq!(decoded.system_labels, entity.system_labels);
        assert_eq!(
            decoded.created_at.timestamp_millis(),
            entity.created_at.timestamp_millis()
        );
    }

    #[test]
    fn test_nested_fields_stored_as_json_strings() {
        let props = entity_to_props(&sample_entity()).unwrap();
        let content = props.content.unwrap();
        assert!(content.starts_with('{'), "content not JSON: {content}");
        assert_eq!(props.attachments.as_deref(), Some("[]"));
        assert!(props.embedding.is_none());
        assert_eq!(props.system_labels, vec!["ENTITY", "ORGANIZATION"]);
    }

    #[test]
    fn test_corrupt_json_degrades_to_default() {
        let mut props = entity_to_props(&sample_entity()).unwrap();
        props.metadata = Some("{not json".to_string());
        props.observations = Some("[broken".to_string());
        props.content = Some("garbage".to_string());

        let decoded = props_to_entity(props).unwrap();
        assert!(decoded.metadata.is_empty());
        assert!(decoded.observations.is_empty());
        assert!(decoded.content.is_none());
    }

    #[test]
    fn test_unknown_system_label_skipped() {
        let mut props = entity_to_props(&sample_entity()).unwrap();
        props.system_labels.push("WIZARD".to_string());
        let decoded = props_to_entity(props).unwrap();
        assert_eq!(
            decoded.system_labels,
            vec![SystemLabel::Entity, SystemLabel::Organization]
        );
    }

    #[test]
    fn test_invalid_id_is_an_error() {
        let mut props = entity_to_props(&sample_entity()).unwrap();
        props.id = "not-a-uuid".to_string();
        assert!(props_to_entity(props).is_err());
    }
}
