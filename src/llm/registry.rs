//! Provider registry.
//!
//! Memoizes one provider instance per configured key and hands out shared
//! handles. Unknown keys resolve to the local extractor with a warning so a
//! configuration typo degrades instead of failing.

use super::{
    AnthropicProvider, ExtractionProvider, LocalExtractor, OllamaProvider, OpenAiProvider,
};
use crate::config::ExtractionConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

const LOCAL_KEY: &str = "local";

/// Single-instance cache of extraction providers, keyed by provider name.
pub struct ProviderRegistry {
    config: ExtractionConfig,
    instances: Mutex<HashMap<String, Arc<dyn ExtractionProvider>>>,
}

impl ProviderRegistry {
    /// Creates a registry for the given extraction configuration.
    #[must_use]
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            config,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configured primary provider, building and caching it on
    /// first use.
    #[must_use]
    pub fn primary(&self) -> Arc<dyn ExtractionProvider> {
        let key = self.config.provider.to_lowercase();
        self.get_or_build(&key)
    }

    /// Returns the cached local extractor, regardless of the primary
    /// configuration.
    #[must_use]
    pub fn fallback_local(&self) -> Arc<dyn ExtractionProvider> {
        self.get_or_build(LOCAL_KEY)
    }

    fn get_or_build(&self, key: &str) -> Arc<dyn ExtractionProvider> {
        let mut instances = self
            .instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(provider) = instances.get(key) {
            return Arc::clone(provider);
        }
        let provider = self.build_provider(key);
        instances.insert(key.to_string(), Arc::clone(&provider));
        provider
    }

    fn build_provider(&self, key: &str) -> Arc<dyn ExtractionProvider> {
        match key {
            "ollama" => Arc::new(OllamaProvider::new(&self.config)),
            "openai" => Arc::new(OpenAiProvider::new(&self.config)),
            "anthropic" => Arc::new(AnthropicProvider::new(&self.config)),
            other => {
                if other != LOCAL_KEY {
                    tracing::warn!(
                        provider = other,
                        "Unknown extraction provider; defaulting to local heuristic"
                    );
                }
                Arc::new(LocalExtractor::new())
            }
        }
    }
}
