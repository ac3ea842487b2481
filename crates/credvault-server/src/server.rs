//! Server lifecycle

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};

use credvault_core::Vault;

use crate::api::{router, AppState};

/// Headroom the request timeout leaves above the store's own bound
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

/// HTTP API server
pub struct ApiServer {
    vault: Arc<Vault>,
    addr: SocketAddr,
    request_timeout: Duration,
}

impl ApiServer {
    pub fn new(vault: Arc<Vault>, addr: SocketAddr) -> Self {
        Self {
            vault,
            addr,
            request_timeout: Duration::from_secs(30) + REQUEST_TIMEOUT_SLACK,
        }
    }

    /// Size the request timeout from the store's operation timeout
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout + REQUEST_TIMEOUT_SLACK;
        self
    }

    /// Serve until ctrl-c, then close the vault
    pub async fn run(self) -> std::io::Result<()> {
        let app = router(AppState::new(self.vault.clone()), self.request_timeout);

        let listener = TcpListener::bind(self.addr).await?;
        info!("Listening on http://{}", listener.local_addr()?);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        self.vault.close().await;
        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
