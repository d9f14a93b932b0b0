//! Module manifest (`petra-config.yaml`) loading and validation

use crate::core::coordinate::{validate_segment, ModuleCoordinate};
use crate::core::service::ServiceError;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Well-known manifest file name at a module root
pub const MANIFEST_FILE_NAME: &str = "petra-config.yaml";

/// Ownership metadata attached to a published archive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub team: String,
}

/// Manifest as written on disk, before validation
#[derive(Debug, Clone, Default, Deserialize)]
struct RawManifest {
    #[serde(default, deserialize_with = "scalar")]
    namespace: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    name: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    provider: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    version: Option<String>,
    #[serde(default)]
    metadata: Option<ModuleMetadata>,
}

/// Accept strings and integers; floats would lose digits (`1.10` reads as `1.1`)
fn scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) if !n.is_f64() => Ok(Some(n.to_string())),
        Some(serde_yaml::Value::Number(n)) => Err(de::Error::custom(format!(
            "numeric value {} must be quoted",
            n
        ))),
        Some(other) => Err(de::Error::custom(format!(
            "expected a string, got {:?}",
            other
        ))),
    }
}

impl RawManifest {
    fn apply(&mut self, overrides: &ManifestOverrides) {
        fn pick(target: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value.as_ref().filter(|v| !v.is_empty()) {
                *target = Some(v.clone());
            }
        }

        pick(&mut self.namespace, &overrides.namespace);
        pick(&mut self.name, &overrides.name);
        pick(&mut self.provider, &overrides.provider);
        pick(&mut self.version, &overrides.version);

        let metadata = self.metadata.get_or_insert_with(ModuleMetadata::default);
        if let Some(owner) = &overrides.owner {
            metadata.owner = owner.clone();
        }
        if let Some(team) = &overrides.team {
            metadata.team = team.clone();
        }
    }

    /// Validate required fields in order: namespace, name, provider, version
    fn validate(self) -> Result<ModuleManifest, ServiceError> {
        let namespace = required("namespace", self.namespace)?;
        let name = required("name", self.name)?;
        let provider = required("provider", self.provider)?;
        let version = required("version", self.version)?;

        Ok(ModuleManifest {
            coordinate: ModuleCoordinate {
                namespace,
                name,
                provider,
                version,
            },
            metadata: self.metadata.unwrap_or_default(),
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ServiceError> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServiceError::missing_field(field))?;

    validate_segment(&value).map_err(|reason| ServiceError::ManifestInvalid { field, reason })?;
    Ok(value)
}

/// A validated module manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleManifest {
    pub coordinate: ModuleCoordinate,
    pub metadata: ModuleMetadata,
}

impl ModuleManifest {
    /// Parse and validate manifest content
    pub fn from_yaml_str(content: &str) -> Result<Self, ServiceError> {
        parse_raw(content)?.validate()
    }
}

fn parse_raw(content: &str) -> Result<RawManifest, ServiceError> {
    if content.trim().is_empty() {
        return Ok(RawManifest::default());
    }
    serde_yaml::from_str(content).map_err(|e| ServiceError::ManifestParse(e.to_string()))
}

/// Resolve the manifest file for `path`, which is either the file or a module directory
pub fn manifest_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(MANIFEST_FILE_NAME)
    } else {
        path.to_path_buf()
    }
}

fn read_raw(path: &Path) -> Result<RawManifest, ServiceError> {
    let file = manifest_path(path);
    if !file.is_file() {
        return Err(ServiceError::ManifestNotFound(file));
    }
    let content = std::fs::read_to_string(&file)?;
    parse_raw(&content)
}

/// Load and validate the manifest at `path`
pub fn load_manifest(path: &Path) -> Result<ModuleManifest, ServiceError> {
    read_raw(path)?.validate()
}

/// Optional field replacements used by the metadata update operation
#[derive(Debug, Clone, Default)]
pub struct ManifestOverrides {
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub provider: Option<String>,
    pub version: Option<String>,
    pub owner: Option<String>,
    pub team: Option<String>,
}

impl ManifestOverrides {
    /// Resolve a manifest from an optional module directory with these overrides on top
    pub fn resolve(&self, module_dir: Option<&Path>) -> Result<ModuleManifest, ServiceError> {
        let mut raw = match module_dir {
            Some(dir) => read_raw(dir)?,
            None => RawManifest::default(),
        };
        raw.apply(self);
        raw.validate()
    }
}

/// Find module roots (directories holding a manifest) under `root`, in path order
pub fn find_module_roots(root: &Path, recursive: bool) -> Result<Vec<PathBuf>, ServiceError> {
    if !root.is_dir() {
        return Err(ServiceError::DirectoryNotFound(root.to_path_buf()));
    }
    if !recursive {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut roots = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git" && e.file_name() != ".terraform")
    {
        let entry = entry.map_err(|e| ServiceError::ArchiveIo(e.to_string()))?;
        if entry.file_type().is_file() && entry.file_name() == MANIFEST_FILE_NAME {
            if let Some(parent) = entry.path().parent() {
                roots.push(parent.to_path_buf());
            }
        }
    }
    roots.sort();
    Ok(roots)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FULL: &str = r#"
namespace: main
name: rabbitmq
provider: helm
version: 0.0.1
metadata:
  owner: alice
  team: platform
"#;

    fn expect_invalid(content: &str, expected: &str) {
        match ModuleManifest::from_yaml_str(content) {
            Err(ServiceError::ManifestInvalid { field, .. }) => assert_eq!(field, expected),
            other => panic!("expected ManifestInvalid({}), got {:?}", expected, other),
        }
    }

    #[test]
    fn test_parse_full_manifest() {
        let manifest = ModuleManifest::from_yaml_str(FULL).unwrap();
        assert_eq!(
            manifest.coordinate,
            ModuleCoordinate::new("main", "rabbitmq", "helm", "0.0.1").unwrap()
        );
        assert_eq!(manifest.metadata.owner, "alice");
        assert_eq!(manifest.metadata.team, "platform");
    }

    #[test]
    fn test_each_missing_field_is_reported() {
        for field in ["namespace", "name", "provider", "version"] {
            let content: String = FULL
                .lines()
                .filter(|line| !line.starts_with(&format!("{}:", field)))
                .collect::<Vec<_>>()
                .join("\n");
            expect_invalid(&content, field);
        }
    }

    #[test]
    fn test_first_missing_field_wins() {
        expect_invalid("version: 1.0.0\n", "namespace");
        expect_invalid("namespace: a\nversion: 1.0.0\n", "name");
        expect_invalid("namespace: a\nname: b\n", "provider");
        expect_invalid("", "namespace");
    }

    #[test]
    fn test_empty_string_counts_as_missing() {
        expect_invalid("namespace: a\nname: \"\"\nprovider: c\nversion: 1.0.0\n", "name");
    }

    #[test]
    fn test_invalid_segment_reported_with_field() {
        expect_invalid("namespace: a\nname: b/c\nprovider: c\nversion: 1.0.0\n", "name");
        expect_invalid("namespace: a\nname: b\nprovider: c\nversion: ..\n", "version");
    }

    #[test]
    fn test_metadata_is_optional() {
        let manifest =
            ModuleManifest::from_yaml_str("namespace: a\nname: b\nprovider: c\nversion: 1.0.0\n")
                .unwrap();
        assert_eq!(manifest.metadata, ModuleMetadata::default());
    }

    #[test]
    fn test_numeric_scalars() {
        let manifest =
            ModuleManifest::from_yaml_str("namespace: a\nname: b\nprovider: c\nversion: 2\n")
                .unwrap();
        assert_eq!(manifest.coordinate.version, "2");

        let result =
            ModuleManifest::from_yaml_str("namespace: a\nname: b\nprovider: c\nversion: 1.10\n");
        assert!(matches!(result, Err(ServiceError::ManifestParse(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = ModuleManifest::from_yaml_str("namespace: [unclosed");
        assert!(matches!(result, Err(ServiceError::ManifestParse(_))));
    }

    #[test]
    fn test_load_manifest_from_directory() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(MANIFEST_FILE_NAME), FULL).unwrap();

        let manifest = load_manifest(temp_dir.path()).unwrap();
        assert_eq!(manifest.coordinate.name, "rabbitmq");

        let manifest = load_manifest(&temp_dir.path().join(MANIFEST_FILE_NAME)).unwrap();
        assert_eq!(manifest.coordinate.version, "0.0.1");
    }

    #[test]
    fn test_load_manifest_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_manifest(temp_dir.path());
        assert!(matches!(result, Err(ServiceError::ManifestNotFound(_))));
    }

    #[test]
    fn test_overrides_on_top_of_manifest() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(MANIFEST_FILE_NAME), FULL).unwrap();

        let overrides = ManifestOverrides {
            version: Some("0.0.2".to_string()),
            owner: Some("bob".to_string()),
            ..Default::default()
        };
        let manifest = overrides.resolve(Some(temp_dir.path())).unwrap();
        assert_eq!(manifest.coordinate.version, "0.0.2");
        assert_eq!(manifest.metadata.owner, "bob");
        assert_eq!(manifest.metadata.team, "platform");
    }

    #[test]
    fn test_overrides_without_manifest_require_identity() {
        let overrides = ManifestOverrides {
            namespace: Some("a".to_string()),
            name: Some("b".to_string()),
            provider: Some("c".to_string()),
            ..Default::default()
        };
        match overrides.resolve(None) {
            Err(ServiceError::ManifestInvalid { field, .. }) => assert_eq!(field, "version"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_find_module_roots_recursive() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for dir in ["modules/b", "modules/a", "modules/a/nested"] {
            std::fs::create_dir_all(root.join(dir)).unwrap();
            std::fs::write(root.join(dir).join(MANIFEST_FILE_NAME), FULL).unwrap();
        }
        std::fs::create_dir_all(root.join("docs")).unwrap();

        let roots = find_module_roots(root, true).unwrap();
        assert_eq!(
            roots,
            vec![
                root.join("modules/a"),
                root.join("modules/a/nested"),
                root.join("modules/b"),
            ]
        );

        assert_eq!(find_module_roots(root, false).unwrap(), vec![root.to_path_buf()]);
    }
}
