//! `OpenAI` extraction provider.
//!
//! Transport and credential problems are operational noise, not semantic
//! failures: a missing API key, a failed request, or an unparseable
//! response all degrade to the local extractor with a warning instead of
//! propagating.

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

/// `OpenAI` chat-completions extraction provider.
pub struct OpenAiProvider {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
    fallback: LocalExtractor,
}

impl OpenAiProvider {
    /// Creates a provider from the extraction configuration.
    #[must_use]
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            api_key: config.openai.api_key.clone(),
            model: config.openai.model.clone(),
            base_url: config.openai.base_url.trim_end_matches('/').to_string(),
            client: build_http_client(Duration::from_secs(config.request_timeout_seconds)),
            fallback: LocalExtractor::new(),
        }
    }

    async fn request_completion(&self, api_key: &str, content: String) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "You are an expert at extracting graph entities. \
                              Return only JSON with 'entities' and 'relations'."
                        .to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| provider_err(format!("request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_err(format!("status {status}: {body}")));
        }

        let envelope: ChatResponse = response
            .json()
            .await
            .map_err(|e| provider_err(format!("response body: {e}")))?;
        envelope
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| provider_err("response carried no choices".to_string()))
    }
}

fn provider_err(cause: String) -> crate::Error {
    crate::Error::ExtractionProvider(format!("openai {cause}"))
}

#[async_trait]
impl ExtractionProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn extract(
        &self,
        entry: &Entity,
        metadata: Option<&Metadata>,
    ) -> Result<ExtractionResult> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!("OpenAI API key missing; falling back to local extractor");
            return self.fallback.extract(entry, metadata).await;
        };

        let content = source_text(entry, metadata).unwrap_or_default();
        let raw = match self.request_completion(api_key, content).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "OpenAI provider failed; falling back to local extractor");
                return self.fallback.extract(entry, metadata).await;
            }
        };

        match clean_model_response(&raw).and_then(|cleaned| parse_extraction_payload(&cleaned)) {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!(error = %e, "Unable to parse OpenAI response; falling back to local extractor");
                self.fallback.extract(entry, metadata).await
            }
        }
    }
}

/// Request to the chat-completions API.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

/// A message in the chat.
#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Response from the chat-completions API.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

/// One completion choice.
#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
