//! Server startup and shutdown.
//!
//! Startup order matters here: the listener is bound and the router
//! installed before the database connection is attempted, and that
//! attempt runs as an independent background task. A slow or failing
//! database therefore never delays or kills the HTTP side.

use crate::config::{Config, ServerConfig};
use crate::db::{self, Connector, Database, PgConnector};
use crate::error::{AppError, AppResult};
use crate::routes::{self, Collaborators};
use crate::state::AppState;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Run the web server with the given configuration.
///
/// Binds the configured address, serves requests, and connects to
/// PostgreSQL in the background. Returns after a graceful shutdown
/// triggered by Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Fails only when the listening socket cannot be bound or the server
/// loop hits an I/O error. Database failures are logged, not returned.
pub async fn run_server(config: Config, collaborators: Collaborators) -> AppResult<()> {
    info!("Starting Blossom Honey API...");

    let listener = bind(&config.server).await?;
    let connector: Arc<dyn Connector> = Arc::new(PgConnector::new(config.database.clone()));
    let state = AppState::new(Arc::new(config), Database::new());

    serve(
        listener,
        state,
        &collaborators,
        connector,
        create_shutdown_signal(),
    )
    .await
}

/// Bind the listening socket for `server`.
pub async fn bind(server: &ServerConfig) -> AppResult<TcpListener> {
    let addr = server.bind_address();
    TcpListener::bind(&addr)
        .await
        .map_err(|source| AppError::Bind { addr, source })
}

/// Serve on an already-bound listener until `shutdown` resolves.
///
/// The database connect task is spawned only after the router is ready
/// and the "running" event has been logged; the two never wait on each
/// other.
pub async fn serve<F>(
    listener: TcpListener,
    state: AppState,
    collaborators: &Collaborators,
    connector: Arc<dyn Connector>,
    shutdown: F,
) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = routes::create_router(&state, collaborators);

    let local_addr = listener.local_addr().map_err(AppError::Server)?;
    info!(addr = %local_addr, "Server running on port {}", local_addr.port());

    let db_task = db::spawn_connect(state.database.clone(), connector);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(AppError::Server);

    // A still-pending connect attempt has nothing left to serve.
    db_task.abort();

    info!("Server shutdown complete");
    result
}

/// Create a future that resolves when a shutdown signal is received.
///
/// On Unix-like systems, this listens for both Ctrl+C (SIGINT) and SIGTERM.
/// On other platforms, it only listens for Ctrl+C.
///
/// # Panics
///
/// Panics if signal handler installation fails. Without a handler the OS
/// cannot deliver shutdown signals, so there is nothing to recover to.
async fn create_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    #[cfg(not(unix))]
    ctrl_c.await;

    info!("Shutdown signal received");
}
