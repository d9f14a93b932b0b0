//! Response models of the module registry protocol

use serde::{Deserialize, Serialize};

/// Body of `GET /v1/modules/{namespace}/{name}/{provider}/versions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleVersionsResponse {
    pub modules: Vec<ModuleVersions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleVersions {
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: String,
}

impl ModuleVersionsResponse {
    /// Wrap the versions of one module; an empty list still yields one module entry
    pub fn from_versions(versions: Vec<String>) -> Self {
        Self {
            modules: vec![ModuleVersions {
                versions: versions
                    .into_iter()
                    .map(|version| VersionEntry { version })
                    .collect(),
            }],
        }
    }

    /// Flattened version strings, as a client would read them
    pub fn versions(&self) -> Vec<&str> {
        self.modules
            .iter()
            .flat_map(|m| m.versions.iter().map(|v| v.version.as_str()))
            .collect()
    }
}
