//! Service discovery endpoint

use crate::core::protocol::DiscoveryDocument;
use crate::http::handlers::AppState;
use axum::{extract::State, Json};

/// GET /.well-known/terraform.json
pub async fn discovery(State(state): State<AppState>) -> Json<DiscoveryDocument> {
    Json(state.protocol.discovery().clone())
}
