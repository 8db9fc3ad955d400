//! Background dispatcher.
//!
//! Runs the extraction pipeline inline or defers it past the HTTP response
//! on a spawned task. The deferred path is wrapped in a catch-all: a
//! background extraction failure is logged and never reaches the host
//! process, and the completion sink is only invoked on success.

use super::ExtractionPipeline;
use crate::llm::ExtractionResult;
use crate::models::{Entity, Metadata};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Receives the result of a completed extraction (e.g. to persist it).
#[async_trait]
pub trait ExtractionSink: Send + Sync {
    /// Called with the extraction result after a successful pipeline run.
    ///
    /// # Errors
    ///
    /// Returns an error when the result cannot be processed; the dispatcher
    /// logs it and moves on.
    async fn on_extraction_complete(&self, result: ExtractionResult) -> Result<()>;
}

/// Whether to run the pipeline now or after the response is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Run on the caller's task; errors propagate to the caller.
    Inline,
    /// Run on a spawned task; errors are logged and contained.
    Deferred,
}

/// Schedules pipeline runs.
pub struct ExtractionDispatcher {
    pipeline: Arc<ExtractionPipeline>,
}

impl ExtractionDispatcher {
    /// Creates a dispatcher over the shared pipeline.
    #[must_use]
    pub fn new(pipeline: Arc<ExtractionPipeline>) -> Self {
        Self { pipeline }
    }

    /// Schedules the extraction pipeline for an entry.
    ///
    /// In [`DispatchMode::Deferred`], the call returns immediately and the
    /// pipeline runs concurrently with other requests; nothing it does can
    /// fail the caller. In [`DispatchMode::Inline`] the same guarded run
    /// executes on the caller's task (failures are still only logged —
    /// callers that need the error use [`ExtractionPipeline::run`]
    /// directly).
    pub async fn enqueue(
        &self,
        entry: Entity,
        mode: DispatchMode,
        metadata: Metadata,
        on_complete: Option<Arc<dyn ExtractionSink>>,
    ) {
        match mode {
            DispatchMode::Deferred => {
                let pipeline = Arc::clone(&self.pipeline);
                tokio::spawn(async move {
                    run_pipeline_safe(&pipeline, &entry, &metadata, on_complete).await;
                });
            }
            DispatchMode::Inline => {
                run_pipeline_safe(&self.pipeline, &entry, &metadata, on_complete).await;
            }
        }
    }
}

/// The catch-all around a pipeline run: failures are logged, never raised.
async fn run_pipeline_safe(
    pipeline: &ExtractionPipeline,
    entry: &Entity,
    metadata: &Metadata,
    on_complete: Option<Arc<dyn ExtractionSink>>,
) {
    match pipeline.run(entry, Some(metadata)).await {
        Ok(result) => {
            if let Some(sink) = on_complete {
                if let Err(e) = sink.on_extraction_complete(result).await {
                    tracing::error!(
                        entry_id = %entry.id,
                        error = %e,
                        "Failed to persist extraction result"
                    );
                }
            }
        }
        Err(e) => {
            tracing::error!(
                entry_id = %entry.id,
                error = %e,
                "Extraction pipeline failed"
            );
        }
    }
}
