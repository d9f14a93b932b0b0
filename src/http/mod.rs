//! HTTP surface of the registry
//!
//! Serves the Terraform module registry protocol (service discovery, version
//! listing and download resolution) with Axum.

pub mod errors;
pub mod handlers;
pub mod models;
pub mod server;

pub use errors::{HttpError, HttpResult};
pub use models::{ModuleVersions, ModuleVersionsResponse, VersionEntry};
/// Re-export commonly used types
pub use server::{build_router, RegistryServer};
