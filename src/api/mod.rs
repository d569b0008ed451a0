// API module - HTTP surface over the session manager
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;

use crate::core::session::SessionManager;
use crate::domain::error::{CubeError, CubeResult};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Serve the API on `listener` until `shutdown` resolves, then tear down
/// every session the service still tracks.
pub async fn serve<F>(
    listener: TcpListener,
    sessions: SessionManager,
    request_timeout: Duration,
    shutdown: F,
) -> CubeResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    let app = create_router(AppState::new(sessions.clone()), request_timeout);

    info!("Listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| CubeError::internal(format!("server error: {}", e)))?;

    info!("Shutting down, cleaning up sessions");
    match sessions.delete_all_sessions().await {
        Ok(count) => info!("Deleted {} session(s)", count),
        Err(e) => error!("Failed to delete sessions on shutdown: {}", e),
    }
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
