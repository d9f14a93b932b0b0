//! Update command implementation

use crate::cli::config::{create_service_config, FileConfig};
use crate::cli::error::CliResult;
use crate::cli::utils::{describe_attributes, messages};
use clap::Args;
use petra::{ManifestOverrides, RegistryService};
use std::path::PathBuf;

/// Amend owner/team of an already published version.
///
/// The coordinate comes from the module's petra-config.yaml when
/// `--module-directory` is given; individual flags override its fields.
#[derive(Debug, Args)]
pub struct UpdateArgs {
    #[arg(long, help = "Bucket the module was published to")]
    pub bucket: String,

    #[arg(long, help = "Directory holding petra-config.yaml")]
    pub module_directory: Option<PathBuf>,

    #[arg(long)]
    pub namespace: Option<String>,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub provider: Option<String>,

    #[arg(long = "version", id = "module_version")]
    pub module_version: Option<String>,

    #[arg(long)]
    pub owner: Option<String>,

    #[arg(long)]
    pub team: Option<String>,
}

impl UpdateArgs {
    fn overrides(&self) -> ManifestOverrides {
        ManifestOverrides {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            provider: self.provider.clone(),
            version: self.module_version.clone(),
            owner: self.owner.clone(),
            team: self.team.clone(),
        }
    }
}

pub async fn execute_update(file: &FileConfig, args: UpdateArgs) -> CliResult<()> {
    let config = create_service_config(file, Some(&args.bucket))?;
    let service = RegistryService::new(config).await?;

    let attributes = service
        .pipeline()
        .update_metadata(args.module_directory.as_deref(), &args.overrides())
        .await?;

    println!(
        "{}",
        messages::ok(&format!("Updated {}", describe_attributes(&attributes)))
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::cli::config::StorageSection;
    use crate::cli::error::CliError;
    use petra::ServiceError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_update_unpublished_version() {
        let storage = TempDir::new().unwrap();
        let file = FileConfig {
            storage: StorageSection {
                path: Some(storage.path().to_string_lossy().into_owned()),
                ..Default::default()
            },
            ..Default::default()
        };
        let args = UpdateArgs {
            bucket: "modules".to_string(),
            module_directory: None,
            namespace: Some("net".to_string()),
            name: Some("vpc".to_string()),
            provider: Some("aws".to_string()),
            module_version: Some("9.9.9".to_string()),
            owner: Some("alice".to_string()),
            team: None,
        };

        match execute_update(&file, args).await {
            Err(CliError::Service(ServiceError::NotFound(_))) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_overrides_from_flags() {
        let args = UpdateArgs {
            bucket: "modules".to_string(),
            module_directory: None,
            namespace: Some("net".to_string()),
            name: None,
            provider: None,
            module_version: Some("1.0.0".to_string()),
            owner: None,
            team: Some("platform".to_string()),
        };
        let overrides = args.overrides();
        assert_eq!(overrides.namespace.as_deref(), Some("net"));
        assert_eq!(overrides.version.as_deref(), Some("1.0.0"));
        assert_eq!(overrides.team.as_deref(), Some("platform"));
        assert!(overrides.owner.is_none());
    }
}
