//! Object store backends holding published module archives

use crate::core::manifest::ModuleMetadata;
use crate::core::service::ServiceError;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod filesystem;
#[cfg(feature = "s3")]
pub mod s3;

pub use filesystem::LocalObjectStore;
#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;

/// Content type of stored module archives
pub const ARCHIVE_CONTENT_TYPE: &str = "application/gzip";

/// Attributes of a fully written object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectAttributes {
    pub key: String,
    pub size: u64,
    pub metadata: ModuleMetadata,
    /// RFC 3339 timestamp of the last content or attribute write, when known
    pub updated_at: Option<String>,
}

/// Narrow contract the registry needs from its backing object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`.
    ///
    /// With `fail_if_exists` the write is conditional on the key being absent
    /// and fails with `ObjectConflict` otherwise. Exactly one of several
    /// concurrent conditional writes to the same key succeeds.
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        metadata: &ModuleMetadata,
        fail_if_exists: bool,
    ) -> Result<(), ServiceError>;

    /// Look up the attributes of `key`, `NotFound` when absent
    async fn get_attributes(&self, key: &str) -> Result<ObjectAttributes, ServiceError>;

    /// List every key starting with `prefix`
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, ServiceError>;

    /// Replace the metadata of an existing object without touching its content
    async fn update_attributes(
        &self,
        key: &str,
        metadata: &ModuleMetadata,
    ) -> Result<ObjectAttributes, ServiceError>;

    /// Build the externally resolvable download reference for `key`
    async fn locator_for(
        &self,
        key: &str,
        attributes: &ObjectAttributes,
    ) -> Result<String, ServiceError>;

    /// Probe the backend at startup, `StorageUnavailable` when it cannot serve
    async fn check_ready(&self) -> Result<(), ServiceError>;
}

/// How S3 download locators are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorStyle {
    /// Time-bounded presigned HTTPS URL
    Presigned,
    /// go-getter `s3::https://...` address resolved with the consumer's credentials
    GoGetter,
}

impl std::str::FromStr for LocatorStyle {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "presigned" => Ok(LocatorStyle::Presigned),
            "go-getter" | "s3" => Ok(LocatorStyle::GoGetter),
            other => Err(ServiceError::Config(format!(
                "Unknown locator style '{}' (expected 'presigned' or 'go-getter')",
                other
            ))),
        }
    }
}

/// Object store configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub storage_type: String,
    /// Root directory of the `local` backend
    pub base_path: String,
    /// Bucket name (S3) or sub-directory of `base_path` (local)
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    /// Public base URL prefixed to keys by the `local` backend
    pub base_url: Option<String>,
    pub locator_style: LocatorStyle,
    pub presign_expiry: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: "local".to_string(),
            base_path: "./registry-data".to_string(),
            bucket: String::new(),
            region: String::new(),
            endpoint: None,
            base_url: None,
            locator_style: LocatorStyle::Presigned,
            presign_expiry: Duration::from_secs(15 * 60),
        }
    }
}

/// Create the object store described by `config`
pub async fn create_object_store(
    config: &StorageConfig,
) -> Result<Arc<dyn ObjectStore>, ServiceError> {
    match config.storage_type.as_str() {
        "local" => {
            let mut root = std::path::PathBuf::from(&config.base_path);
            if !config.bucket.is_empty() {
                root.push(&config.bucket);
            }
            info!("Creating local object store at {}", root.display());
            Ok(Arc::new(LocalObjectStore::new(root, config.base_url.clone())))
        }
        #[cfg(feature = "s3")]
        "s3" => {
            if config.bucket.is_empty() {
                return Err(ServiceError::Config(
                    "S3 storage requires a bucket".to_string(),
                ));
            }
            info!(
                "Creating S3 object store: bucket='{}', region='{}', endpoint='{}'",
                config.bucket,
                config.region,
                config.endpoint.as_deref().unwrap_or("<none>"),
            );
            Ok(Arc::new(S3ObjectStore::new(config).await))
        }
        #[cfg(not(feature = "s3"))]
        "s3" => Err(ServiceError::Config(
            "S3 storage requires the 's3' feature to be enabled".to_string(),
        )),
        other => Err(ServiceError::Config(format!(
            "Unsupported storage type: {}",
            other
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_locator_style_parse() {
        assert_eq!("presigned".parse::<LocatorStyle>().unwrap(), LocatorStyle::Presigned);
        assert_eq!("go-getter".parse::<LocatorStyle>().unwrap(), LocatorStyle::GoGetter);
        assert!("ftp".parse::<LocatorStyle>().is_err());
    }

    #[tokio::test]
    async fn test_create_local_store_under_bucket() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            base_path: temp_dir.path().to_string_lossy().into_owned(),
            bucket: "modules".to_string(),
            ..Default::default()
        };

        let store = create_object_store(&config).await.unwrap();
        store.check_ready().await.unwrap();
        assert!(temp_dir.path().join("modules").is_dir());
    }

    #[tokio::test]
    async fn test_create_unknown_store() {
        let config = StorageConfig {
            storage_type: "ftp".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create_object_store(&config).await,
            Err(ServiceError::Config(_))
        ));
    }
}
