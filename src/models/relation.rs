//! Directed, typed edges between entities.

use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Edge type names must be upper snake case.
///
/// The validated token is interpolated into the Cypher text (edge types
/// cannot be parameterized), so this pattern is the sole defense against
/// query injection. Do not relax it.
static EDGE_TYPE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a literal, checked by tests
    let pattern = Regex::new(r"^[A-Z0-9_]+$").unwrap();
    pattern
});

/// A directed edge between two stored entities.
///
/// `source` and `target` are entity id strings; during extraction
/// persistence they may temporarily hold entity *names*, which the
/// ingestion service resolves to ids before the edge reaches a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Source endpoint (entity id, or a name pending resolution).
    pub source: String,
    /// Target endpoint (entity id, or a name pending resolution).
    pub target: String,
    /// Edge type name; uppercased and validated before it reaches a query.
    #[serde(rename = "relationType")]
    pub relation_type: String,
}

impl Relation {
    /// Creates a relation between two endpoints.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation_type: relation_type.into(),
        }
    }

    /// Returns the uppercased edge type after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the uppercased type does not
    /// match `^[A-Z0-9_]+$`.
    pub fn edge_type(&self) -> Result<String> {
        let token = self.relation_type.to_uppercase();
        if EDGE_TYPE_PATTERN.is_match(&token) {
            Ok(token)
        } else {
            Err(Error::InvalidInput(format!(
                "invalid relation type '{}'",
                self.relation_type
            )))
        }
    }

    /// Deserializes and shallow-validates an untrusted payload.
    ///
    /// The edge type gate itself runs again at the repository; this check
    /// rejects payloads that could never become a valid edge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the payload does not
    /// deserialize or an endpoint is blank.
    pub fn from_payload(value: serde_json::Value) -> Result<Self> {
        let relation: Self = serde_json::from_value(value)
            .map_err(|e| Error::InvalidInput(format!("relation payload: {e}")))?;
        if relation.source.trim().is_empty() || relation.target.trim().is_empty() {
            return Err(Error::InvalidInput(
                "relation endpoints must not be empty".to_string(),
            ));
        }
        Ok(relation)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_edge_type_uppercases() {
        let relation = Relation::new("a", "b", "mentions");
        assert_eq!(relation.edge_type().unwrap(), "MENTIONS");
    }

    #[test]
    fn test_edge_type_rejects_injection() {
        for bad in ["FOO; DELETE ALL", "bad-type", "", "MENTIONS]->(x) SET"] {
            let relation = Relation::new("a", "b", bad);
            assert!(relation.edge_type().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_edge_type_accepts_upper_snake() {
        for good in ["MENTIONS", "WORKED_AT", "MET_AT_2024"] {
            let relation = Relation::new("a", "b", good);
            assert_eq!(relation.edge_type().unwrap(), good);
        }
    }

    #[test]
    fn test_from_payload_uses_wire_field_name() {
        let relation = Relation::from_payload(json!({
            "source": "entry-id",
            "target": "Brian",
            "relationType": "MENTIONS"
        }))
        .unwrap();
        assert_eq!(relation.relation_type, "MENTIONS");

        assert!(Relation::from_payload(json!({"source": "", "target": "b", "relationType": "X"}))
            .is_err());
        assert!(Relation::from_payload(json!({"source": "a"})).is_err());
    }
}
