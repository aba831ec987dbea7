//! Main proxy server implementation

use axum::{extract::State, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::handler::Dispatcher;
use crate::backends::{BackendRegistry, RegistryError};
use crate::config::AppConfig;

/// Failures that stop the server from starting or serving
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Build the router: every method and path goes to the dispatcher
pub fn build_router(dispatcher: Dispatcher) -> Router {
    Router::new().fallback(proxy_handler).with_state(dispatcher)
}

/// Run the proxy server.
///
/// The registry is built before the listener is bound, so configuration
/// errors never reach the serving stage.
pub async fn run_server(config: &AppConfig, addr: SocketAddr) -> Result<(), ServerError> {
    let registry = BackendRegistry::from_config(config)?;

    tracing::info!(
        strategy = %registry.strategy(),
        backends = registry.len(),
        "Backend registry ready"
    );
    for (index, backend) in registry.backends().iter().enumerate() {
        tracing::info!(index, backend = %backend.url, "Registered backend");
    }

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    tracing::info!("rr-balance listening on {}", addr);

    serve(listener, registry, shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, registry: BackendRegistry, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(Dispatcher::new(Arc::new(registry)));

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)
}

/// Catch-all proxy handler
async fn proxy_handler(State(dispatcher): State<Dispatcher>, req: axum::extract::Request) -> axum::response::Response {
    dispatcher.dispatch(req).await
}

/// Wait for shutdown signal (Ctrl+C)
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
