use std::sync::Arc;

use clap::Parser;
use embedding_store::{start_server, AppState, EmbeddingRegistry, PersistentStore, Settings};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::parse();

    info!("Starting embedding store server...");
    info!("Host: {}", settings.host);
    info!("Port: {}", settings.port);
    info!("Database path: {}", settings.db_path.display());

    let store = PersistentStore::open(&settings.db_path)?.with_metric(settings.distance);
    let registry = EmbeddingRegistry::from_settings(&settings)?;
    info!("Embedding providers: {}", registry.names().join(", "));

    let state = AppState::new(Arc::new(store), registry);
    start_server(state, &settings.host, settings.port).await?;

    Ok(())
}
