//! Ollama (self-hosted) extraction provider.
//!
//! Prompts a local model over `/api/generate` and parses strict JSON out of
//! the response. Retries only on timeout; any other transport or status
//! failure fails the attempt immediately.

use super::{
    ExtractionProvider, ExtractionResult, build_http_client, clean_model_response,
    parse_extraction_payload, source_text,
};
use crate::config::{ExtractionConfig, OllamaSettings};
use crate::models::{Entity, Metadata};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama extraction provider.
pub struct OllamaProvider {
    /// API endpoint.
    base_url: String,
    /// Model to use.
    model: String,
    /// Retry attempts, applied on timeout only.
    max_retries: u32,
    /// Keep-alive hint for the server.
    keep_alive: String,
    /// Token budget used to clip input and size the context window.
    context_window_tokens: usize,
    /// Rough token-to-char conversion of the budget.
    max_chars: usize,
    /// HTTP client.
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Creates a provider from the extraction configuration.
    #[must_use]
    pub fn new(config: &ExtractionConfig) -> Self {
        Self::with_settings(&config.ollama, config.context_window_tokens)
    }

    /// Creates a provider from explicit settings.
    #[must_use]
    pub fn with_settings(settings: &OllamaSettings, context_window_tokens: usize) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            max_retries: settings.max_retries.max(1),
            keep_alive: settings.keep_alive.clone(),
            context_window_tokens,
            max_chars: context_window_tokens.saturating_mul(4),
            client: build_http_client(Duration::from_secs(settings.timeout_seconds)),
        }
    }

    /// Clips the text to the char budget, reporting whether it was cut.
    fn clip<'a>(&self, text: &'a str) -> (String, bool) {
        if text.chars().count() <= self.max_chars {
            (text.to_string(), false)
        } else {
            (text.chars().take(self.max_chars).collect(), true)
        }
    }

    fn build_prompt(&self, entry: &Entity, text: &str, truncated: bool) -> String {
        let entry_id = entry.id_str();
        let entry_labels: Vec<&str> = entry
            .system_labels
            .iter()
            .map(crate::models::SystemLabel::as_str)
            .collect();
        let context_notice = if truncated {
            format!(
                "The provided text has been truncated to {} tokens maximum.",
                self.context_window_tokens
            )
        } else {
            format!("You may use up to {} tokens.", self.context_window_tokens)
        };

        format!(
            r#"You are the engram knowledge-graph extraction agent.
Your job is to perform high-quality named-entity and relationship extraction
from an unstructured journal entry and output ONLY JSON that conforms to the schema below.

ENTRY_ID: {entry_id}
ENTRY_LABELS: {entry_labels:?}

{context_notice}

RAW_ENTRY_TEXT:
"""{text}"""

Requirements:
1. Identify distinct entities for people, locations, organizations, objects, events, and key concepts.
   - Ignore pronouns, stop words, months, or vague references ("he", "she", "it", "my", "december", etc.).
2. Only the ENTRY node stores the full text; extracted entities must be concise (no long-form body).
3. Each entity JSON object MUST include:
   - "name": short canonical name. Do NOT include an "id" field.
   - "system_labels": choose from ["PERSON","LOCATION","ORGANIZATION","OBJECT","EVENT","CONCEPT"].
   - "labels": include "extracted" plus any helpful tags (e.g. "relationship", "workplace").
   - "summary": 1-2 sentence description referencing facts from the entry.
   - "metadata": include at least {{"source_entry_id": "{entry_id}", "entity_type": "<type>"}}.
4. Build "relations" that reflect the real relationships in the text.
   - Use uppercase snake_case relationType values like MENTIONED, WORKED_AT, MET_AT, LOCATED_IN.
   - When linking from the ENTRY to an extracted entity: set "source" to "{entry_id}" and "target" to that entity's exact "name".
   - When linking between extracted entities: set both "source" and "target" to the exact "name" strings of the entities you output.
5. Output JSON ONLY in the form:
   {{
     "entities": [{{...}}, {{...}}],
     "relations": [{{...}}, {{...}}]
   }}
   No explanations, code fences, or additional text."#
        )
    }

    async fn perform_request(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let url = format!("{}/api/generate", self.base_url);
        let mut last_timeout = String::new();

        for attempt in 1..=self.max_retries {
            match self.client.post(&url).json(request).send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        tracing::error!(
                            provider = "ollama",
                            model = %self.model,
                            status = %status,
                            body = %body,
                            "Extraction API returned error status"
                        );
                        return Err(Error::ExtractionProvider(format!(
                            "ollama returned status {status}: {body}"
                        )));
                    }
                    return response.json::<GenerateResponse>().await.map_err(|e| {
                        Error::ExtractionProvider(format!("ollama response body: {e}"))
                    });
                }
                Err(e) if e.is_timeout() => {
                    tracing::warn!(
                        provider = "ollama",
                        model = %self.model,
                        attempt,
                        max_retries = self.max_retries,
                        "Extraction request timed out"
                    );
                    last_timeout = e.to_string();
                }
                Err(e) => {
                    tracing::error!(
                        provider = "ollama",
                        model = %self.model,
                        error = %e,
                        is_connect = e.is_connect(),
                        "Extraction request failed"
                    );
                    return Err(Error::ExtractionProvider(format!("ollama request: {e}")));
                }
            }
        }

        Err(Error::ExtractionProvider(format!(
            "ollama request timed out after {} attempts: {last_timeout}",
            self.max_retries
        )))
    }
}

#[async_trait]
impl ExtractionProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn extract(
        &self,
        entry: &Entity,
        metadata: Option<&Metadata>,
    ) -> Result<ExtractionResult> {
        let text = source_text(entry, metadata).ok_or_else(|| {
            Error::ExtractionProvider(
                "ENTRY entity does not contain textual content to analyze".to_string(),
            )
        })?;
        let (clipped, truncated) = self.clip(&text);

        let request = GenerateRequest {
            model: self.model.clone(),
            stream: false,
            prompt: self.build_prompt(entry, &clipped, truncated),
            keep_alive: self.keep_alive.clone(),
            options: GenerateOptions {
                num_ctx: self.context_window_tokens.min(128_000),
            },
        };

        let response = self.perform_request(&request).await?;
        let cleaned = clean_model_response(&response.response)?;
        parse_extraction_payload(&cleaned)
    }
}

/// Request to the generate API.
#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    stream: bool,
    prompt: String,
    keep_alive: String,
    options: GenerateOptions,
}

/// Model options for the generate API.
#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_ctx: usize,
}

/// Response from the generate API.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{ContentBlock, SystemLabel};

    fn provider(context_window_tokens: usize) -> OllamaProvider {
        OllamaProvider::with_settings(&OllamaSettings::default(), context_window_tokens)
    }

    fn entry(text: &str) -> Entity {
        Entity::new()
            .with_system_labels(vec![SystemLabel::Entry])
            .with_content(ContentBlock::text(text))
            .validated()
            .unwrap()
    }

    #[test]
    fn test_clip_respects_char_budget() {
        let provider = provider(1);
        let (clipped, truncated) = provider.clip("abcdefgh");
        assert_eq!(clipped, "abcd");
        assert!(truncated);

        let (clipped, truncated) = provider.clip("ab");
        assert_eq!(clipped, "ab");
        assert!(!truncated);
    }

    #[test]
    fn test_prompt_carries_contract() {
        let provider = provider(8192);
        let entry = entry("Brian met Yoli.");
        let prompt = provider.build_prompt(&entry, "Brian met Yoli.", false);

        assert!(prompt.contains(&entry.id_str()));
        assert!(prompt.contains("ONLY JSON"));
        assert!(prompt.contains("Ignore pronouns"));
        assert!(prompt.contains("uppercase snake_case"));
        assert!(prompt.contains(r#"set "source" to"#));
    }

    #[test]
    fn test_prompt_notes_truncation() {
        let provider = provider(4);
        let entry = entry("some very long text here");
        let (clipped, truncated) = provider.clip("some very long text here");
        let prompt = provider.build_prompt(&entry, &clipped, truncated);
        assert!(prompt.contains("has been truncated"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let settings = OllamaSettings {
            base_url: "http://localhost:11434/".to_string(),
            ..OllamaSettings::default()
        };
        let provider = OllamaProvider::with_settings(&settings, 1024);
        assert_eq!(provider.base_url, "http://localhost:11434");
    }
}
