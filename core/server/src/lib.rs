//! HTTP surface for docseal.
//!
//! Exposes the download, download-URL and details operations of the
//! document version service:
//!
//! | Method     | Path                                     |
//! |------------|------------------------------------------|
//! | GET, HEAD  | `/document-versions/{id}/download`       |
//! | GET        | `/document-versions/{id}/download-url`   |
//! | GET        | `/document-versions/{id}`                |
//!
//! Callers authenticate with a bearer token. Errors are JSON bodies of the
//! form `{"messages": ["..."]}`.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub use error::{ApiError, ErrorBody};
pub use state::{AppState, TokenAuthenticator};

/// Build the application router.
pub fn app(state: Arc<AppState>) -> Router {
    routes::router().with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(addr = %addr, "Document server listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Document server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
