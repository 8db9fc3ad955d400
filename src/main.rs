//! Binary entry point for the engram service.
//!
//! Loads configuration from the environment (and a `.env` file when
//! present), connects the graph store, and serves the HTTP API.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]

use anyhow::Context;
use clap::Parser;
use engram::api::{self, AppState, TokenValidator};
use engram::config::EngramConfig;
use engram::llm::ProviderRegistry;
use engram::pipeline::ExtractionPipeline;
use engram::services::{EntityService, EntryIngestionService, SearchService};
use engram::storage::{
    EntityStore, Neo4jEntityRepository, Neo4jRelationRepository, Neo4jStore, RelationStore,
    StoreHealth,
};
use std::sync::Arc;

/// Memory-graph ingestion and retrieval service.
#[derive(Debug, Parser)]
#[command(name = "engram", version, about)]
struct Cli {
    /// Bind address, e.g. 127.0.0.1:8080.
    #[arg(long, env = "ENGRAM_BIND")]
    bind: Option<String>,

    /// Raise the default log level to debug.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = EngramConfig::from_env();
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if cli.verbose && config.logging.level.is_none() {
        config.logging.level = Some("debug".to_string());
    }

    engram::observability::init_from_settings(&config.logging)
        .context("failed to initialize logging")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        provider = %config.extraction.provider,
        "Starting engram"
    );

    let store = Arc::new(Neo4jStore::new(config.graph.clone()));
    store
        .connect()
        .await
        .context("failed to connect to the graph store")?;
    if store.verify_connectivity().await {
        tracing::info!("Graph store connection verified");
    } else {
        tracing::warn!("Graph store connection verification failed");
    }

    let entities: Arc<dyn EntityStore> =
        Arc::new(Neo4jEntityRepository::new(Arc::clone(&store)));
    let relations: Arc<dyn RelationStore> =
        Arc::new(Neo4jRelationRepository::new(Arc::clone(&store)));

    let registry = Arc::new(ProviderRegistry::new(config.extraction.clone()));
    let pipeline = Arc::new(ExtractionPipeline::new(
        registry,
        config.extraction.allow_fallback,
    ));

    let state = AppState {
        ingestion: Arc::new(EntryIngestionService::new(
            Arc::clone(&entities),
            Arc::clone(&relations),
            pipeline,
            config.extraction.allow_fallback,
        )),
        entities: Arc::new(EntityService::new(
            Arc::clone(&entities),
            Arc::clone(&relations),
        )),
        search: Arc::new(SearchService::new(Arc::clone(&entities))),
        health: Arc::clone(&store) as Arc<dyn StoreHealth>,
        auth: Arc::new(TokenValidator::new(&config.auth).context("auth configuration")?),
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    tracing::info!(bind = %config.server.bind, "Serving HTTP API");

    axum::serve(listener, api::router(state))
        .await
        .context("server error")?;

    store.close().await;
    Ok(())
}
