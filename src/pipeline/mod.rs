//! Extraction pipeline.
//!
//! Orchestrates the provider call, the fallback policy, and observer
//! notifications. The pipeline-level fallback is policy, not ad-hoc: it
//! fires only on the [`Error::ExtractionProvider`] kind (the provider could
//! not produce usable output), never on other failures. Cloud providers
//! additionally self-fallback on infrastructure errors; the two layers are
//! deliberately distinct.

pub mod dispatcher;

pub use dispatcher::{DispatchMode, ExtractionDispatcher, ExtractionSink};

use crate::llm::{ExtractionResult, ProviderRegistry};
use crate::models::{Entity, Metadata};
use crate::{Error, Result};
use std::sync::Arc;

/// Reacts to extraction lifecycle events.
///
/// Observers run synchronously on the pipeline's task and must not block.
pub trait ExtractionObserver: Send + Sync {
    /// Called after a successful extraction.
    fn on_success(&self, entry: &Entity, result: &ExtractionResult);

    /// Called when extraction failed with no usable result.
    fn on_failure(&self, entry: &Entity, error: &Error);
}

/// Default observer that logs pipeline progress.
pub struct LoggingObserver;

impl ExtractionObserver for LoggingObserver {
    fn on_success(&self, entry: &Entity, result: &ExtractionResult) {
        tracing::info!(
            entry_id = %entry.id,
            entities = result.entities.len(),
            relations = result.relations.len(),
            "Extraction completed"
        );
    }

    fn on_failure(&self, entry: &Entity, error: &Error) {
        tracing::error!(entry_id = %entry.id, error = %error, "Extraction failed");
    }
}

/// Runs the configured provider with fallback policy and observers.
pub struct ExtractionPipeline {
    registry: Arc<ProviderRegistry>,
    observers: Vec<Arc<dyn ExtractionObserver>>,
    allow_fallback: bool,
}

impl ExtractionPipeline {
    /// Creates a pipeline over the registry. A [`LoggingObserver`] is
    /// always registered.
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, allow_fallback: bool) -> Self {
        Self {
            registry,
            observers: vec![Arc::new(LoggingObserver)],
            allow_fallback,
        }
    }

    /// Registers an additional observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ExtractionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Runs extraction for an entry.
    ///
    /// On an [`Error::ExtractionProvider`] failure from the primary
    /// provider, falls back to the local extractor when the policy allows
    /// it; every other failure re-raises after notifying observers.
    ///
    /// # Errors
    ///
    /// Returns the primary provider's error when fallback is disabled, or
    /// the fallback's error when it too cannot produce a result.
    pub async fn run(
        &self,
        entry: &Entity,
        metadata: Option<&Metadata>,
    ) -> Result<ExtractionResult> {
        let provider = self.registry.primary();

        match provider.extract(entry, metadata).await {
            Ok(result) => {
                self.notify_success(entry, &result);
                Ok(result)
            }
            Err(Error::ExtractionProvider(cause)) if self.allow_fallback => {
                tracing::warn!(
                    entry_id = %entry.id,
                    provider = provider.name(),
                    cause = %cause,
                    "Primary provider failed; falling back to local extractor"
                );
                let fallback = self.registry.fallback_local();
                match fallback.extract(entry, metadata).await {
                    Ok(result) => {
                        self.notify_success(entry, &result);
                        Ok(result)
                    }
                    Err(fallback_error) => {
                        self.notify_failure(entry, &fallback_error);
                        Err(fallback_error)
                    }
                }
            }
            Err(error) => {
                self.notify_failure(entry, &error);
                Err(error)
            }
        }
    }

    fn notify_success(&self, entry: &Entity, result: &ExtractionResult) {
        for observer in &self.observers {
            observer.on_success(entry, result);
        }
    }

    fn notify_failure(&self, entry: &Entity, error: &Error) {
        for observer in &self.observers {
            observer.on_failure(entry, error);
        }
    }
}
