//! Observability and telemetry.
//!
//! Logging goes through `tracing`; this module wires the subscriber from
//! configuration. Format is pretty for humans or JSON for shippers, and
//! the filter honors `RUST_LOG` before falling back to the configured
//! level.

use crate::config::LoggingSettings;
use crate::{Error, Result};
use std::sync::OnceLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// Structured JSON lines.
    Json,
}

impl LogFormat {
    /// Parses a format name, defaulting to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

static OBSERVABILITY_INIT: OnceLock<()> = OnceLock::new();

/// Initializes the global tracing subscriber from logging settings.
///
/// # Errors
///
/// Returns an error when observability has already been initialized or the
/// subscriber cannot be installed.
pub fn init_from_settings(settings: &LoggingSettings) -> Result<()> {
    if OBSERVABILITY_INIT.get().is_some() {
        return Err(Error::OperationFailed {
            operation: "observability_init".to_string(),
            cause: "observability already initialized".to_string(),
        });
    }

    let format = settings
        .format
        .as_deref()
        .map(LogFormat::parse)
        .unwrap_or_default();
    let filter = build_filter(settings);

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_thread_ids(true),
                )
                .with(filter)
                .try_init()
                .map_err(init_error)?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_target(true))
                .with(filter)
                .try_init()
                .map_err(init_error)?;
        }
    }

    let _ = OBSERVABILITY_INIT.set(());
    Ok(())
}

/// `RUST_LOG` wins; then the configured filter; then the configured level
/// scoped to this crate; then `info`.
fn build_filter(settings: &LoggingSettings) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    if let Some(filter) = &settings.filter {
        if let Ok(filter) = EnvFilter::try_new(filter) {
            return filter;
        }
    }
    let level = settings.level.as_deref().unwrap_or("info");
    EnvFilter::try_new(format!("engram={level},info"))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_error(e: tracing_subscriber::util::TryInitError) -> Error {
    Error::OperationFailed {
        operation: "observability_init".to_string(),
        cause: e.to_string(),
    }
}
