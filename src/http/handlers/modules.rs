//! Module registry protocol endpoints

use crate::core::coordinate::{ModuleAddress, ModuleCoordinate};
use crate::http::errors::{HttpError, HttpResult};
use crate::http::handlers::AppState;
use crate::http::models::ModuleVersionsResponse;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    Json,
};
use tracing::debug;

/// Header telling Terraform where to fetch the module archive
pub const TERRAFORM_GET_HEADER: &str = "x-terraform-get";

/// GET /v1/modules/:namespace/:name/:provider/versions
pub async fn list_versions(
    State(state): State<AppState>,
    Path((namespace, name, provider)): Path<(String, String, String)>,
) -> HttpResult<Json<ModuleVersionsResponse>> {
    let address = ModuleAddress::new(&namespace, &name, &provider)?;
    let versions = state.protocol.list_versions(&address).await?;
    Ok(Json(ModuleVersionsResponse::from_versions(versions)))
}

/// GET /v1/modules/:namespace/:name/:provider/:version/download
///
/// Answers 204 with the archive locator in `X-Terraform-Get`.
pub async fn download(
    State(state): State<AppState>,
    Path((namespace, name, provider, version)): Path<(String, String, String, String)>,
) -> HttpResult<(StatusCode, HeaderMap)> {
    let coordinate = ModuleCoordinate::new(&namespace, &name, &provider, &version)?;
    let locator = state.protocol.download_locator(&coordinate).await?;

    let value = HeaderValue::from_str(&locator).map_err(|e| {
        HttpError::InternalServerError(format!("Locator is not a valid header value: {}", e))
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(TERRAFORM_GET_HEADER, value);
    debug!("Download of {} resolved", coordinate);

    Ok((StatusCode::NO_CONTENT, headers))
}
