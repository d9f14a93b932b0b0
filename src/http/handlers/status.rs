//! Shared handler state and liveness endpoint

use crate::core::protocol::RegistryProtocol;
use std::sync::Arc;

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub protocol: Arc<RegistryProtocol>,
}

impl AppState {
    pub fn new(protocol: Arc<RegistryProtocol>) -> Self {
        Self { protocol }
    }
}

/// GET /is_alive - Liveness probe, never touches the store
pub async fn is_alive() -> &'static str {
    "."
}
