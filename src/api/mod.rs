mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::contracts::SequenceStore;

pub use handlers::{
    parse_increment_body, AppState, IncrementResponse, LogResponse, RejectionResponse,
    ValidationError, MAX_LOG_PAGE,
};

/// Creates the API router.
pub fn create_router<S: SequenceStore + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/increment", post(handlers::increment::<S>))
        .route("/stats", get(handlers::get_stats::<S>))
        .route("/metrics", get(handlers::metrics::<S>))
        .route("/log", get(handlers::read_log::<S>))
        .with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    /// Creates a config from environment variables.
    ///
    /// Reads:
    /// - `SEQGUARD_HOST` (default: 0.0.0.0)
    /// - `SEQGUARD_PORT` (default: 8000)
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            host: std::env::var("SEQGUARD_HOST").unwrap_or(default.host),
            port: std::env::var("SEQGUARD_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(default.port),
        }
    }
}

/// Starts the HTTP server and runs until `shutdown` resolves.
pub async fn start_server<S, F>(
    config: ServerConfig,
    state: Arc<AppState<S>>,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    S: SequenceStore + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_from_env() {
        std::env::set_var("SEQGUARD_PORT", "9100");
        std::env::set_var("SEQGUARD_HOST", "127.0.0.1");
        let config = ServerConfig::from_env();
        assert_eq!(config.port, 9100);
        assert_eq!(config.host, "127.0.0.1");

        std::env::set_var("SEQGUARD_PORT", "not-a-port");
        assert_eq!(ServerConfig::from_env().port, 8000);

        std::env::remove_var("SEQGUARD_PORT");
        std::env::remove_var("SEQGUARD_HOST");
    }
}
