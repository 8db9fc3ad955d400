//! Anthropic extraction provider.
//!
//! Same degradation policy as the `OpenAI` provider: a missing key or any
//! transport/parse failure falls back to the local extractor with a
//! warning and never propagates a network error.

use super::{
    ExtractionProvider, ExtractionResult, LocalExtractor, build_http_client,
    clean_model_response, parse_extraction_payload, source_text,
};
use crate::config::ExtractionConfig;
use crate::models::{Entity, Metadata};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Anthropic messages-API extraction provider.
pub struct AnthropicProvider {
    api_key: Option<String>,
    model: String,
    messages_url: String,
    client: reqwest::Client,
    fallback: LocalExtractor,
}

impl AnthropicProvider {
    /// Creates a provider from the extraction configuration.
    #[must_use]
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            api_key: config.anthropic.api_key.clone(),
            model: config.anthropic.model.clone(),
            messages_url: MESSAGES_URL.to_string(),
            client: build_http_client(Duration::from_secs(config.request_timeout_seconds)),
            fallback: LocalExtractor::new(),
        }
    }

    async fn request_completion(&self, api_key: &str, content: String) -> Result<String> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: 1024,
            temperature: 0.0,
            system: "You are part of the engram memory graph. \
                     Return JSON with 'entities' and 'relations' following the provided schema."
                .to_string(),
            messages: vec![MessageParam {
                role: "user".to_string(),
                content,
            }],
        };

        let response = self
            .client
            .post(&self.messages_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| provider_err(format!("request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_err(format!("status {status}: {body}")));
        }

        let envelope: MessagesResponse = response
            .json()
            .await
            .map_err(|e| provider_err(format!("response body: {e}")))?;
        envelope
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| provider_err("response carried no content".to_string()))
    }
}

fn provider_err(cause: String) -> crate::Error {
    crate::Error::ExtractionProvider(format!("anthropic {cause}"))
}

#[async_trait]
impl ExtractionProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn extract(
        &self,
        entry: &Entity,
        metadata: Option<&Metadata>,
    ) -> Result<ExtractionResult> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!("Anthropic API key missing; falling back to local extractor");
            return self.fallback.extract(entry, metadata).await;
        };

        let content = source_text(entry, metadata).unwrap_or_default();
        let raw = match self.request_completion(api_key, content).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Anthropic provider failed; falling back to local extractor");
                return self.fallback.extract(entry, metadata).await;
            }
        };

        match clean_model_response(&raw).and_then(|cleaned| parse_extraction_payload(&cleaned)) {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!(error = %e, "Unable to parse Anthropic response; falling back to local extractor");
                self.fallback.extract(entry, metadata).await
            }
        }
    }
}

/// Request to the messages API.
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<MessageParam>,
}

/// A message parameter.
#[derive(Debug, Serialize)]
struct MessageParam {
    role: String,
    content: String,
}

/// Response from the messages API.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlockParam>,
}

/// One response content block.
#[derive(Debug, Deserialize)]
struct ContentBlockParam {
    #[serde(default)]
    text: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{ContentBlock, SystemLabel};

    fn entry() -> Entity {
        Entity::new()
            .with_system_labels(vec![SystemLabel::Entry])
            .with_content(ContentBlock::text("Brian met Yoli at Twilight Florist."))
            .validated()
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_key_falls_back_to_local() {
        let keyless = AnthropicProvider {
            api_key: None,
            model: "claude-3-5-haiku-latest".to_string(),
            messages_url: MESSAGES_URL.to_string(),
            client: reqwest::Client::new(),
            fallback: LocalExtractor::new(),
        };

        let result = keyless.extract(&entry(), None).await.unwrap();
        assert!(!result.entities.is_empty());
        assert!(!result.relations.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back_to_local() {
        let broken = AnthropicProvider {
            api_key: Some("test-key".to_string()),
            model: "claude-3-5-haiku-latest".to_string(),
            messages_url: "http://127.0.0.1:9/v1/messages".to_string(),
            client: reqwest::Client::new(),
            fallback: LocalExtractor::new(),
        };

        let result = broken.extract(&entry(), None).await.unwrap();
        assert!(!result.entities.is_empty());
    }
}
