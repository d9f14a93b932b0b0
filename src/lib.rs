//! # Petra - private Terraform module registry
//!
//! Petra packages Terraform modules into versioned archives, stores them in an
//! object store and serves the module registry protocol so that `terraform
//! init` can resolve them.
//!
//! ## Architecture
//!
//! - Write path: manifest validation, deterministic `.tar.gz` archiving,
//!   storage key derivation and conditional upload ([`PublishPipeline`])
//! - Read path: service discovery, version listing and download resolution
//!   ([`RegistryProtocol`], served over HTTP by [`http::server::RegistryServer`])
//! - Storage: a narrow [`storage::ObjectStore`] contract with filesystem and S3 backends
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use petra::{PublishOptions, RegistryService, ServiceConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = RegistryService::new(ServiceConfig::default()).await?;
//!
//!     let descriptor = service
//!         .pipeline()
//!         .publish(Path::new("./modules/vpc"), PublishOptions::default())
//!         .await?;
//!     println!("Published {} at {}", descriptor.coordinate, descriptor.locator);
//!
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod http;
pub mod storage;

pub use core::coordinate::{ModuleAddress, ModuleCoordinate, StorageKey};
pub use core::manifest::{ManifestOverrides, ModuleManifest, ModuleMetadata};
pub use core::protocol::{DiscoveryDocument, RegistryProtocol};
pub use core::publish::{DownloadDescriptor, PublishOptions, PublishPipeline};
pub use core::service::{RegistryService, ServiceConfig, ServiceError};
pub use storage::{ObjectAttributes, ObjectStore, StorageConfig};

/// Version of the registry
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging (safe for testing)
pub fn init_logging() {
    // Only initialize logging once
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "petra=info".into());

        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();

        // This will fail silently if already initialized
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
