//! Write path: manifest → archive → storage key → conditional upload

use crate::core::coordinate::ModuleCoordinate;
use crate::core::manifest::{find_module_roots, load_manifest, ManifestOverrides};
use crate::core::packaging::{archive_module_with, calculate_checksum, ArchiveOptions};
use crate::core::service::{with_timeout, ServiceError};
use crate::storage::{ObjectAttributes, ObjectStore};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Options controlling a publish
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishOptions {
    /// Replace an already published version instead of failing with `ObjectConflict`
    pub force: bool,
    /// Leave `.git` and `.terraform` directories out of the archive
    pub exclude_tool_dirs: bool,
}

/// What a publisher gets back after a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadDescriptor {
    pub coordinate: ModuleCoordinate,
    pub key: String,
    pub locator: String,
    pub size: u64,
    pub sha256: String,
}

/// Publishes module directories to the object store
pub struct PublishPipeline {
    store: Arc<dyn ObjectStore>,
    timeout: Duration,
}

impl PublishPipeline {
    pub fn new(store: Arc<dyn ObjectStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Publish the module rooted at `module_dir`.
    ///
    /// Nothing reaches the store unless the manifest is valid and the whole
    /// directory was archived.
    pub async fn publish(
        &self,
        module_dir: &Path,
        options: PublishOptions,
    ) -> Result<DownloadDescriptor, ServiceError> {
        if !module_dir.is_dir() {
            return Err(ServiceError::DirectoryNotFound(module_dir.to_path_buf()));
        }

        let manifest = load_manifest(module_dir)?;

        let root = module_dir.to_path_buf();
        let archive_options = ArchiveOptions {
            exclude_tool_dirs: options.exclude_tool_dirs,
        };
        let archive =
            tokio::task::spawn_blocking(move || archive_module_with(&root, archive_options))
                .await
                .map_err(|e| ServiceError::ArchiveIo(format!("Archive task failed: {}", e)))??;

        let key = manifest.coordinate.storage_key();
        let sha256 = calculate_checksum(&archive);

        with_timeout(
            self.timeout,
            self.store
                .put(key.as_str(), &archive, &manifest.metadata, !options.force),
        )
        .await?;

        let attributes = with_timeout(self.timeout, self.store.get_attributes(key.as_str())).await?;
        let locator =
            with_timeout(self.timeout, self.store.locator_for(key.as_str(), &attributes)).await?;

        info!(
            "Published {} as {} ({} bytes, sha256 {})",
            manifest.coordinate,
            key,
            archive.len(),
            sha256
        );

        Ok(DownloadDescriptor {
            coordinate: manifest.coordinate,
            key: key.into_string(),
            locator,
            size: archive.len() as u64,
            sha256,
        })
    }

    /// Publish `dir`, or with `recursive` every module found below it.
    ///
    /// Stops at the first failure; modules published before it stay published.
    pub async fn publish_tree(
        &self,
        dir: &Path,
        recursive: bool,
        options: PublishOptions,
    ) -> Result<Vec<DownloadDescriptor>, ServiceError> {
        let roots: Vec<PathBuf> = find_module_roots(dir, recursive)?;
        if roots.is_empty() {
            info!("No modules found under {}", dir.display());
        }

        let mut published = Vec::with_capacity(roots.len());
        for root in roots {
            published.push(self.publish(&root, options).await?);
        }
        Ok(published)
    }

    /// Amend owner/team of an already published version.
    ///
    /// The coordinate comes from the manifest in `module_dir` (when given) with
    /// `overrides` applied on top. The archive content is never rewritten.
    pub async fn update_metadata(
        &self,
        module_dir: Option<&Path>,
        overrides: &ManifestOverrides,
    ) -> Result<ObjectAttributes, ServiceError> {
        let manifest = overrides.resolve(module_dir)?;
        let key = manifest.coordinate.storage_key();

        let attributes = with_timeout(
            self.timeout,
            self.store.update_attributes(key.as_str(), &manifest.metadata),
        )
        .await?;

        info!(
            "Updated metadata of {}: owner='{}', team='{}'",
            manifest.coordinate, attributes.metadata.owner, attributes.metadata.team
        );
        Ok(attributes)
    }
}
