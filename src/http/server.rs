//! Axum HTTP server implementation

use crate::core::service::{RegistryService, ServiceError};
use crate::http::handlers::{discovery, modules, status, AppState};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::info;

/// Build the registry router over shared handler state.
///
/// `GET` routes answer `HEAD` as well.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/.well-known/terraform.json", get(discovery::discovery))
        .route(
            "/v1/modules/:namespace/:name/:provider/versions",
            get(modules::list_versions),
        )
        .route(
            "/v1/modules/:namespace/:name/:provider/:version/download",
            get(modules::download),
        )
        .route("/is_alive", get(status::is_alive))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::new()),
        )
        .with_state(state)
}

/// Petra HTTP server
pub struct RegistryServer {
    service: Arc<RegistryService>,
    addr: SocketAddr,
}

impl RegistryServer {
    /// Create a new server instance
    pub fn new(service: Arc<RegistryService>, host: &str, port: u16) -> Result<Self, ServiceError> {
        let addr = Self::parse_address(host, port).map_err(ServiceError::Config)?;
        Ok(Self { service, addr })
    }

    /// Parse and normalize host:port into a SocketAddr
    fn parse_address(host: &str, port: u16) -> Result<SocketAddr, String> {
        let normalized_host = Self::normalize_host(host);

        // IPv6 addresses need brackets
        let addr_str = if normalized_host.contains(':') {
            format!("[{}]:{}", normalized_host, port)
        } else {
            format!("{}:{}", normalized_host, port)
        };

        addr_str.parse().map_err(|_| {
            format!(
                "Unable to parse address '{}'. Use IP addresses like '127.0.0.1', '0.0.0.0' or '::1'",
                addr_str
            )
        })
    }

    /// Normalize hostnames for SocketAddr compatibility
    fn normalize_host(host: &str) -> String {
        match host {
            "localhost" => "127.0.0.1".to_string(),
            "::1" | "[::1]" => "::1".to_string(),
            "::" | "[::]" => "::".to_string(),
            _ => host.to_string(),
        }
    }

    /// Create the Axum router with all routes
    fn create_router(&self) -> Router {
        build_router(AppState::new(self.service.protocol()))
    }

    /// Start the server and run until ctrl-c
    pub async fn serve(self) -> Result<(), ServiceError> {
        let app = self.create_router();

        info!("Starting Petra registry on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        let actual_addr = listener.local_addr()?;
        info!("Server bound to {}", actual_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }

    /// Get server address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
