use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use seqguard::api::{start_server, AppState, ServerConfig};
use seqguard::guard::{GuardConfig, SequenceGuard};
use seqguard::metrics::SubmitMetrics;
use seqguard::storage::RocksDbStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("seqguard=info".parse()?))
        .init();

    tracing::info!("seqguard starting...");

    let data_dir = std::env::var("SEQGUARD_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let store = RocksDbStore::open(&data_dir)?;

    let guard = Arc::new(SequenceGuard::with_config(store, GuardConfig::from_env()));
    tracing::info!(
        data_dir = %data_dir,
        log_accepted = guard.config().log_accepted,
        "Sequence guard ready"
    );

    let state = Arc::new(AppState::new(guard, Arc::new(SubmitMetrics::new())));

    start_server(ServerConfig::from_env(), state, shutdown_signal()).await?;

    tracing::info!("seqguard stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
