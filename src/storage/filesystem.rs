//! Filesystem object store backend

use crate::core::manifest::ModuleMetadata;
use crate::core::service::ServiceError;
use crate::storage::{ObjectAttributes, ObjectStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

/// Suffix of the JSON sidecar holding an object's attributes
const ATTRIBUTES_SUFFIX: &str = ".attrs.json";

/// Scratch directory for in-flight writes, never listed
const STAGING_DIR: &str = ".staging";

/// Staged files older than this are leftovers of interrupted writes
const STALE_STAGING_AGE: Duration = Duration::from_secs(60 * 60);

/// Attributes persisted next to each object
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAttributes {
    #[serde(flatten)]
    metadata: ModuleMetadata,
    updated_at: String,
}

/// A file under the staging directory, removed when dropped.
///
/// Once linked or renamed into place the removal is a no-op on the staged name.
struct StagedFile {
    path: PathBuf,
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Object store keeping archives as plain files under a base directory
pub struct LocalObjectStore {
    base_path: PathBuf,
    base_url: Option<String>,
}

impl LocalObjectStore {
    pub fn new(base_path: PathBuf, base_url: Option<String>) -> Self {
        Self {
            base_path,
            base_url,
        }
    }

    /// Root directory of the store
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Map a key to its file, rejecting keys that would leave the base directory
    pub fn object_path(&self, key: &str) -> Result<PathBuf, ServiceError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && !key.ends_with(ATTRIBUTES_SUFFIX)
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(part) if part != STAGING_DIR));
        if !valid {
            return Err(ServiceError::Storage(format!("Invalid object key: {}", key)));
        }
        Ok(self.base_path.join(relative))
    }

    fn attributes_path(object_path: &Path) -> PathBuf {
        let mut name = object_path.as_os_str().to_os_string();
        name.push(ATTRIBUTES_SUFFIX);
        PathBuf::from(name)
    }

    /// Write `data` to a fresh private file under the staging directory
    async fn stage(&self, data: &[u8]) -> Result<StagedFile, ServiceError> {
        let staging_dir = self.base_path.join(STAGING_DIR);
        fs::create_dir_all(&staging_dir).await?;
        let staged = StagedFile {
            path: staging_dir.join(uuid::Uuid::new_v4().to_string()),
        };
        fs::write(&staged.path, data).await?;
        Ok(staged)
    }

    fn encode_attributes(metadata: &ModuleMetadata) -> Result<Vec<u8>, ServiceError> {
        let stored = StoredAttributes {
            metadata: metadata.clone(),
            updated_at: Utc::now().to_rfc3339(),
        };
        serde_json::to_vec_pretty(&stored)
            .map_err(|e| ServiceError::Storage(format!("Failed to serialize attributes: {}", e)))
    }

    async fn write_attributes(
        &self,
        object_path: &Path,
        metadata: &ModuleMetadata,
    ) -> Result<(), ServiceError> {
        let staged = self.stage(&Self::encode_attributes(metadata)?).await?;
        fs::rename(&staged.path, Self::attributes_path(object_path)).await?;
        Ok(())
    }

    async fn read_attributes(
        &self,
        key: &str,
        object_path: &Path,
    ) -> Result<ObjectAttributes, ServiceError> {
        let file_meta = match fs::metadata(object_path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(ServiceError::NotFound(key.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ServiceError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        // Objects written by this store always have a sidecar; files placed by hand may not
        let stored = match fs::read(Self::attributes_path(object_path)).await {
            Ok(content) => Some(serde_json::from_slice::<StoredAttributes>(&content).map_err(
                |e| ServiceError::Storage(format!("Corrupt attributes for {}: {}", key, e)),
            )?),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let (metadata, updated_at) = match stored {
            Some(stored) => (stored.metadata, Some(stored.updated_at)),
            None => (
                ModuleMetadata::default(),
                file_meta
                    .modified()
                    .ok()
                    .map(|t| DateTime::<Utc>::from(t).to_rfc3339()),
            ),
        };

        Ok(ObjectAttributes {
            key: key.to_string(),
            size: file_meta.len(),
            metadata,
            updated_at,
        })
    }

    /// Remove staged files left behind by writes that never finished
    async fn sweep_staging(&self) {
        let staging_dir = self.base_path.join(STAGING_DIR);
        let Ok(mut entries) = fs::read_dir(&staging_dir).await else {
            return;
        };

        let mut removed = 0usize;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let stale = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified
                    .elapsed()
                    .map(|age| age > STALE_STAGING_AGE)
                    .unwrap_or(false),
                Err(_) => false,
            };
            if stale && fs::remove_file(entry.path()).await.is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Removed {} stale staged file(s)", removed);
        }
    }
}

fn claim_error(key: &str, err: io::Error) -> ServiceError {
    if err.kind() == ErrorKind::AlreadyExists {
        ServiceError::ObjectConflict(key.to_string())
    } else {
        err.into()
    }
}

/// Make a staged object and its sidecar visible.
///
/// Runs to completion on a blocking thread even when the caller is dropped, so
/// an interrupted put either commits both files or neither. With
/// `fail_if_exists` the sidecar is claimed first with `hard_link`, which fails
/// on an existing target, and the object follows; a failure on the object
/// releases the claimed sidecar. A visible object therefore always has its
/// attributes.
fn commit(
    key: &str,
    object: &StagedFile,
    attributes: &StagedFile,
    object_path: &Path,
    fail_if_exists: bool,
) -> Result<(), ServiceError> {
    let attributes_path = LocalObjectStore::attributes_path(object_path);

    if !fail_if_exists {
        std::fs::rename(&attributes.path, &attributes_path)?;
        std::fs::rename(&object.path, object_path)?;
        return Ok(());
    }

    std::fs::hard_link(&attributes.path, &attributes_path).map_err(|e| claim_error(key, e))?;
    if let Err(e) = std::fs::hard_link(&object.path, object_path) {
        if let Err(cleanup) = std::fs::remove_file(&attributes_path) {
            warn!(
                "Failed to release attributes of {} after aborted put: {}",
                key, cleanup
            );
        }
        return Err(claim_error(key, e));
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        metadata: &ModuleMetadata,
        fail_if_exists: bool,
    ) -> Result<(), ServiceError> {
        let object_path = self.object_path(key)?;
        if let Some(parent) = object_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write both files privately first so readers never see partial content
        let object = self.stage(data).await?;
        let attributes = self.stage(&Self::encode_attributes(metadata)?).await?;

        let owned_key = key.to_string();
        let target = object_path.clone();
        tokio::task::spawn_blocking(move || {
            commit(&owned_key, &object, &attributes, &target, fail_if_exists)
        })
        .await
        .map_err(|e| ServiceError::Storage(format!("Commit task failed: {}", e)))??;

        debug!("Stored {} ({} bytes)", key, data.len());
        Ok(())
    }

    async fn get_attributes(&self, key: &str) -> Result<ObjectAttributes, ServiceError> {
        let object_path = self.object_path(key)?;
        self.read_attributes(key, &object_path).await
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, ServiceError> {
        let (dir_part, name_part) = match prefix.rfind('/') {
            Some(idx) => (&prefix[..idx], &prefix[idx + 1..]),
            None => ("", prefix),
        };

        let dir = if dir_part.is_empty() {
            self.base_path.clone()
        } else {
            self.object_path(dir_part)?
        };

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.ends_with(ATTRIBUTES_SUFFIX) || !name.starts_with(name_part) {
                continue;
            }
            keys.push(if dir_part.is_empty() {
                name
            } else {
                format!("{}/{}", dir_part, name)
            });
        }
        keys.sort();
        Ok(keys)
    }

    async fn update_attributes(
        &self,
        key: &str,
        metadata: &ModuleMetadata,
    ) -> Result<ObjectAttributes, ServiceError> {
        let object_path = self.object_path(key)?;
        // Existence check first, the content file is never rewritten
        self.read_attributes(key, &object_path).await?;
        self.write_attributes(&object_path, metadata).await?;
        self.read_attributes(key, &object_path).await
    }

    async fn locator_for(
        &self,
        key: &str,
        _attributes: &ObjectAttributes,
    ) -> Result<String, ServiceError> {
        if let Some(base_url) = &self.base_url {
            return Ok(format!("{}/{}", base_url.trim_end_matches('/'), key));
        }
        let object_path = fs::canonicalize(self.object_path(key)?).await?;
        Ok(object_path.display().to_string())
    }

    async fn check_ready(&self) -> Result<(), ServiceError> {
        fs::create_dir_all(self.base_path.join(STAGING_DIR))
            .await
            .map_err(|e| {
                ServiceError::StorageUnavailable(format!(
                    "Cannot use {}: {}",
                    self.base_path.display(),
                    e
                ))
            })?;
        self.sweep_staging().await;
        info!("Local object store ready at {}", self.base_path.display());
        Ok(())
    }
}
