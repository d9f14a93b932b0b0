//! Read path of the module registry protocol

use crate::core::coordinate::{ModuleAddress, ModuleCoordinate};
use crate::core::service::{with_timeout, ServiceError};
use crate::storage::ObjectStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Service discovery document served at `/.well-known/terraform.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryDocument {
    #[serde(rename = "modules.v1")]
    pub modules_v1: String,
    #[serde(rename = "providers.v1")]
    pub providers_v1: String,
}

impl DiscoveryDocument {
    pub fn new(modules_prefix: &str, providers_prefix: &str) -> Self {
        Self {
            modules_v1: with_trailing_slash(modules_prefix),
            providers_v1: with_trailing_slash(providers_prefix),
        }
    }
}

fn with_trailing_slash(prefix: &str) -> String {
    format!("{}/", prefix.trim_end_matches('/'))
}

/// Stateless protocol operations over the shared object store
pub struct RegistryProtocol {
    store: Arc<dyn ObjectStore>,
    timeout: Duration,
    discovery: DiscoveryDocument,
}

impl RegistryProtocol {
    pub fn new(store: Arc<dyn ObjectStore>, timeout: Duration, discovery: DiscoveryDocument) -> Self {
        Self {
            store,
            timeout,
            discovery,
        }
    }

    /// The fixed discovery document, no I/O involved
    pub fn discovery(&self) -> &DiscoveryDocument {
        &self.discovery
    }

    /// All published versions of a module, oldest first.
    ///
    /// An unknown module has no versions; that is not an error.
    pub async fn list_versions(&self, address: &ModuleAddress) -> Result<Vec<String>, ServiceError> {
        let prefix = address.prefix();
        let keys = with_timeout(self.timeout, self.store.list_keys(&prefix)).await?;

        let mut versions: Vec<String> = keys
            .iter()
            .filter_map(|key| {
                let version = address.version_from_key(key);
                if version.is_none() {
                    warn!("Ignoring unexpected key under {}: {}", prefix, key);
                }
                version.map(str::to_string)
            })
            .collect();

        sort_versions(&mut versions);
        debug!("{} has {} version(s)", address, versions.len());
        Ok(versions)
    }

    /// Resolve the download locator of one published version, `NotFound` when absent
    pub async fn download_locator(&self, coordinate: &ModuleCoordinate) -> Result<String, ServiceError> {
        let key = coordinate.storage_key();
        let attributes = with_timeout(self.timeout, self.store.get_attributes(key.as_str()))
            .await
            .map_err(|e| match e {
                ServiceError::NotFound(_) => {
                    ServiceError::NotFound(format!("module {} is not published", coordinate))
                }
                other => other,
            })?;

        let locator =
            with_timeout(self.timeout, self.store.locator_for(key.as_str(), &attributes)).await?;
        debug!("Resolved {} to {}", coordinate, key);
        Ok(locator)
    }
}

/// Semver order when every version parses, lexicographic otherwise; duplicates removed
fn sort_versions(versions: &mut Vec<String>) {
    let parsed: Option<Vec<semver::Version>> = versions
        .iter()
        .map(|v| semver::Version::parse(v).ok())
        .collect();

    match parsed {
        Some(mut parsed) => {
            parsed.sort();
            parsed.dedup();
            *versions = parsed.iter().map(ToString::to_string).collect();
        }
        None => {
            versions.sort();
            versions.dedup();
        }
    }
}
