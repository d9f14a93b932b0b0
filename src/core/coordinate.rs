//! Module coordinates and storage key derivation

use crate::core::service::ServiceError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix of every stored module archive
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Check that `value` can be used as one coordinate segment.
///
/// Returns the reason on failure so callers can wrap it in their own error.
pub fn validate_segment(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("must not be empty".to_string());
    }
    if value == "." || value == ".." {
        return Err(format!("'{}' is not a valid segment", value));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(format!(
            "contains invalid character '{}' (allowed: alphanumeric, '-', '_', '.')",
            c
        ));
    }
    Ok(())
}

fn check(field: &str, value: &str) -> Result<(), ServiceError> {
    validate_segment(value).map_err(|reason| {
        ServiceError::InvalidCoordinate(format!("{} '{}' {}", field, value, reason))
    })
}

/// A module without a version: `{namespace}/{name}/{provider}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleAddress {
    pub namespace: String,
    pub name: String,
    pub provider: String,
}

impl ModuleAddress {
    /// Create a validated module address
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
    ) -> Result<Self, ServiceError> {
        let address = Self {
            namespace: namespace.into(),
            name: name.into(),
            provider: provider.into(),
        };
        check("namespace", &address.namespace)?;
        check("name", &address.name)?;
        check("provider", &address.provider)?;
        Ok(address)
    }

    /// Key prefix shared by every version of this module
    pub fn prefix(&self) -> String {
        format!("{}/{}/{}/", self.namespace, self.name, self.provider)
    }

    fn file_stem(&self) -> String {
        format!("{}-{}-{}-", self.namespace, self.name, self.provider)
    }

    /// Attach a version to this address
    pub fn with_version(&self, version: impl Into<String>) -> Result<ModuleCoordinate, ServiceError> {
        let version = version.into();
        check("version", &version)?;
        Ok(ModuleCoordinate {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            provider: self.provider.clone(),
            version,
        })
    }

    /// Recover the version from a storage key of this module.
    ///
    /// Returns `None` for keys that do not follow the archive layout.
    pub fn version_from_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        let prefix = self.prefix();
        let file_name = key.strip_prefix(prefix.as_str())?;
        if file_name.contains('/') {
            return None;
        }
        let stem = self.file_stem();
        let version = file_name
            .strip_prefix(stem.as_str())?
            .strip_suffix(ARCHIVE_SUFFIX)?;
        validate_segment(version).ok()?;
        Some(version)
    }
}

impl fmt::Display for ModuleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.name, self.provider)
    }
}

/// Identity of one published module artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleCoordinate {
    pub namespace: String,
    pub name: String,
    pub provider: String,
    pub version: String,
}

impl ModuleCoordinate {
    /// Create a validated coordinate
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, ServiceError> {
        ModuleAddress::new(namespace, name, provider)?.with_version(version)
    }

    /// The module this coordinate is a version of
    pub fn address(&self) -> ModuleAddress {
        ModuleAddress {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            provider: self.provider.clone(),
        }
    }

    /// Key prefix shared by every version of this module
    pub fn module_prefix(&self) -> String {
        self.address().prefix()
    }

    /// Canonical storage key:
    /// `{namespace}/{name}/{provider}/{namespace}-{name}-{provider}-{version}.tar.gz`
    pub fn storage_key(&self) -> StorageKey {
        StorageKey(format!(
            "{ns}/{name}/{provider}/{ns}-{name}-{provider}-{version}{suffix}",
            ns = self.namespace,
            name = self.name,
            provider = self.provider,
            version = self.version,
            suffix = ARCHIVE_SUFFIX,
        ))
    }
}

impl fmt::Display for ModuleCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}@{}",
            self.namespace, self.name, self.provider, self.version
        )
    }
}

/// Object store key of a module archive
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
