use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};
use whatsrelay_common::{Error, Result};
use whatsrelay_config::AppConfig;

use crate::bootstrap::whatsapp_state_from_config;
use crate::router::build_router;

/// HTTP server hosting the webhook endpoints.
pub struct GatewayServer {
    config: AppConfig,
}

impl GatewayServer {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn router(&self) -> Result<Router> {
        let state = whatsapp_state_from_config(&self.config)?;
        Ok(build_router(state))
    }

    /// Bind the configured address and serve until Ctrl-C / SIGTERM.
    pub async fn run(self) -> Result<()> {
        let addr = self.config.gateway.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Gateway(format!("failed to bind {addr}: {e}")))?;
        info!("whatsrelay listening on {addr}");
        self.serve(listener).await
    }

    /// Serve on `listener`, then give in-flight replies time to finish.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let state = whatsapp_state_from_config(&self.config)?;
        let app = build_router(state.clone());
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Gateway(format!("server error: {e}")))?;

        let grace = self.config.request_timeout * 2;
        if !state.drain(grace).await {
            warn!("whatsrelay stopped with replies still in flight after {grace:?}");
        }
        info!("whatsrelay stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM, Ctrl-C only: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
