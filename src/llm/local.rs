//! Deterministic local extractor.
//!
//! A rudimentary extractor that derives entities and relations from
//! capitalized tokens plus a small seeded hint set. Serves as the
//! dependency-free stand-in for real model providers and as the backstop
//! for every fallback path: it may return an empty result but never errors
//! on missing input.

use super::{ExtractionProvider, ExtractionResult, source_text};
use crate::models::{Entity, Metadata, Observation, Relation, SystemLabel};
use crate::Result;
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Capitalized single words or pairs ("Brian", "Twilight Florist").
static CANDIDATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a literal, checked by tests
    let pattern = Regex::new(r"\b([A-Z][a-z]+(?:\s[A-Z][a-z]+)?)\b").unwrap();
    pattern
});

/// Pronouns, months, and other tokens that are never entities.
static STOPWORDS: &[&str] = &[
    "he", "she", "it", "we", "i", "my", "me", "you", "they", "december", "october", "mid",
    "first",
];

/// Seed names that bias candidate discovery and classification.
///
/// The defaults mirror the corpus the heuristic was originally tuned on;
/// deployments can supply their own seeds.
#[derive(Debug, Clone)]
pub struct ExtractionHints {
    /// Names always treated as people when present in the text.
    pub people: Vec<String>,
    /// Names classified as locations.
    pub locations: Vec<String>,
    /// Names classified as organizations.
    pub organizations: Vec<String>,
    /// Names classified as events.
    pub events: Vec<String>,
}

impl Default for ExtractionHints {
    fn default() -> Self {
        Self {
            people: to_strings(&["Brian", "Yoli", "Eric", "Darren"]),
            locations: to_strings(&["Hopewell Junction", "Poughkeepsie"]),
            organizations: to_strings(&["Twilight Florist"]),
            events: to_strings(&["date", "meeting", "first date"]),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

/// The deterministic, dependency-free extraction provider.
#[derive(Debug, Clone, Default)]
pub struct LocalExtractor {
    hints: ExtractionHints,
}

impl LocalExtractor {
    /// Creates an extractor with the default hint set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an extractor with custom seed hints.
    #[must_use]
    pub fn with_hints(hints: ExtractionHints) -> Self {
        Self { hints }
    }

    /// Finds candidate names: capitalized words/pairs minus stopwords, plus
    /// any seeded person present in the text. Sorted for determinism.
    fn extract_named_entities(&self, text: &str) -> Vec<String> {
        let mut candidates: BTreeSet<String> = BTreeSet::new();
        for capture in CANDIDATE_PATTERN.captures_iter(text) {
            let normalized = capture[1].trim().to_string();
            if STOPWORDS.contains(&normalized.to_lowercase().as_str()) {
                continue;
            }
            candidates.insert(normalized);
        }
        for person in &self.hints.people {
            if text.contains(person.as_str()) {
                candidates.insert(person.clone());
            }
        }
        candidates.into_iter().collect()
    }

    /// Classification priority: location, organization, event, person.
    fn infer_system_label(&self, name: &str) -> SystemLabel {
        let lower = name.to_lowercase();
        if self.hints.locations.iter().any(|h| h == name)
            || lower.ends_with("junction")
            || lower.ends_with("poughkeepsie")
        {
            SystemLabel::Location
        } else if self.hints.organizations.iter().any(|h| h == name)
            || name.contains("Florist")
        {
            SystemLabel::Organization
        } else if self.hints.events.iter().any(|h| h == name) || lower.contains("date") {
            SystemLabel::Event
        } else {
            SystemLabel::Person
        }
    }

    fn build_entity(&self, name: &str, entry: &Entity) -> Result<Entity> {
        let system_label = self.infer_system_label(name);
        let mut labels = vec!["generated".to_string(), "extracted".to_string()];
        match system_label {
            SystemLabel::Location => labels.push("location".to_string()),
            SystemLabel::Organization => labels.push("organization".to_string()),
            _ => {}
        }

        let observation = Observation::new(format!("Mentioned alongside entry {}", entry.id))
            .with_metadata_entry("source_entry_id", serde_json::json!(entry.id_str()));

        Entity::new()
            .with_name(name)
            .with_system_labels(vec![system_label])
            .with_labels(labels)
            .with_observation(observation)
            .with_metadata_entry("generated_by", serde_json::json!("local-extractor"))
            .with_metadata_entry("entity_type", serde_json::json!(system_label.as_str()))
            .validated()
    }
}

#[async_trait]
impl ExtractionProvider for LocalExtractor {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn extract(
        &self,
        entry: &Entity,
        metadata: Option<&Metadata>,
    ) -> Result<ExtractionResult> {
        let Some(text) = source_text(entry, metadata) else {
            tracing::info!(entry_id = %entry.id, "Local extractor received entry without content; returning empty result");
            return Ok(ExtractionResult::default());
        };

        let names = self.extract_named_entities(&text);
        let entities: Vec<Entity> = names
            .iter()
            .map(|name| self.build_entity(name, entry))
            .collect::<Result<_>>()?;

        let relations = entities
            .iter()
            .map(|entity| Relation::new(entry.id_str(), entity.id_str(), "MENTIONS"))
            .collect();

        Ok(ExtractionResult {
            entities,
            relations,
        })
    }
}
