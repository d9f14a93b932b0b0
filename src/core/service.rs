//! Main Petra registry service

use crate::core::protocol::{DiscoveryDocument, RegistryProtocol};
use crate::core::publish::PublishPipeline;
use crate::storage::{create_object_store, ObjectStore, StorageConfig};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Default bound for a single object store call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Relative prefix advertised for the modules protocol
pub const MODULES_PREFIX: &str = "/v1/modules";

/// Relative prefix advertised for the providers protocol
pub const PROVIDERS_PREFIX: &str = "/v1/providers";

/// Main service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Object store backend configuration
    pub storage: StorageConfig,

    /// Upper bound applied to every object store call
    pub request_timeout: Duration,

    /// Prefix advertised as `modules.v1` in the discovery document
    pub modules_prefix: String,

    /// Prefix advertised as `providers.v1` in the discovery document
    pub providers_prefix: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            modules_prefix: MODULES_PREFIX.to_string(),
            providers_prefix: PROVIDERS_PREFIX.to_string(),
        }
    }
}

/// Main service error type
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid manifest: field `{field}` {reason}")]
    ManifestInvalid { field: &'static str, reason: String },

    #[error("Manifest not found: {}", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("Failed to parse manifest: {0}")]
    ManifestParse(String),

    #[error("Module directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Failed to archive module: {0}")]
    ArchiveIo(String),

    #[error("Invalid module coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Object already exists: {0}")]
    ObjectConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Object store call timed out after {0:?}")]
    UpstreamTimeout(Duration),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Shorthand for a missing required manifest field
    pub fn missing_field(field: &'static str) -> Self {
        ServiceError::ManifestInvalid {
            field,
            reason: "is required".to_string(),
        }
    }

    /// Whether the caller may safely retry the failed operation
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::UpstreamTimeout(_) | ServiceError::StorageUnavailable(_)
        )
    }
}

/// Run an object store call under `limit`, failing with `UpstreamTimeout` on expiry.
///
/// The inner future is dropped on expiry, which cancels the outstanding call.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::UpstreamTimeout(limit)),
    }
}

/// Main Petra service
///
/// Owns the single object store handle for the process. The handle is created
/// once and shared read-only by the publish pipeline and the protocol handler.
pub struct RegistryService {
    config: ServiceConfig,
    store: Arc<dyn ObjectStore>,
    pipeline: PublishPipeline,
    protocol: Arc<RegistryProtocol>,
}

impl RegistryService {
    /// Create the service, building the configured object store and probing it.
    ///
    /// Fails with `StorageUnavailable` when the backing store cannot be reached.
    pub async fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        crate::init_logging();

        info!("Initializing Petra registry service v{}", crate::VERSION);

        let store = create_object_store(&config.storage).await?;
        with_timeout(config.request_timeout, store.check_ready())
            .await
            .map_err(|e| match e {
                ServiceError::StorageUnavailable(_) => e,
                other => ServiceError::StorageUnavailable(other.to_string()),
            })?;

        info!(
            "Object store ready: type='{}', bucket='{}'",
            config.storage.storage_type, config.storage.bucket
        );

        Ok(Self::with_store(config, store))
    }

    /// Create the service around an already constructed object store
    pub fn with_store(config: ServiceConfig, store: Arc<dyn ObjectStore>) -> Self {
        let pipeline = PublishPipeline::new(store.clone(), config.request_timeout);
        let discovery = DiscoveryDocument::new(&config.modules_prefix, &config.providers_prefix);
        let protocol = Arc::new(RegistryProtocol::new(
            store.clone(),
            config.request_timeout,
            discovery,
        ));

        Self {
            config,
            store,
            pipeline,
            protocol,
        }
    }

    /// Get service configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Get the shared object store handle
    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    /// Get the write-path pipeline
    pub fn pipeline(&self) -> &PublishPipeline {
        &self.pipeline
    }

    /// Get the read-path protocol handler
    pub fn protocol(&self) -> Arc<RegistryProtocol> {
        self.protocol.clone()
    }
}
