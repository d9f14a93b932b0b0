//! Publish command implementation

use crate::cli::config::{create_service_config, FileConfig};
use crate::cli::error::CliResult;
use crate::cli::utils::{describe_publish, messages};
use clap::Args;
use petra::{PublishOptions, RegistryService};
use std::path::PathBuf;
use tracing::info;

/// Package and upload Terraform modules
#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Bucket receiving the archives
    #[arg(long, help = "Bucket to publish into")]
    pub bucket: String,

    /// Module directory holding petra-config.yaml
    #[arg(long, help = "Directory of the module to publish")]
    pub module_directory: PathBuf,

    /// Publish every module found below the directory
    #[arg(short, long, help = "Publish every module found below --module-directory")]
    pub recursive: bool,

    /// Replace a version that is already published
    #[arg(long, help = "Overwrite an already published version")]
    pub force: bool,

    /// Leave .git and .terraform directories out of the archive
    #[arg(long, help = "Do not archive .git and .terraform directories")]
    pub exclude_tool_dirs: bool,
}

pub async fn execute_publish(file: &FileConfig, args: PublishArgs, verbose: bool) -> CliResult<()> {
    let config = create_service_config(file, Some(&args.bucket))?;
    let service = RegistryService::new(config).await?;
    let options = PublishOptions {
        force: args.force,
        exclude_tool_dirs: args.exclude_tool_dirs,
    };

    info!(
        "Publishing {} to bucket '{}'",
        args.module_directory.display(),
        args.bucket
    );

    let published = service
        .pipeline()
        .publish_tree(&args.module_directory, args.recursive, options)
        .await?;

    if published.is_empty() {
        println!(
            "{}",
            messages::info(&format!(
                "No modules found under {}",
                args.module_directory.display()
            ))
        );
        return Ok(());
    }

    let total = published.len();
    for (index, descriptor) in published.iter().enumerate() {
        let line = if verbose {
            messages::progress(index + 1, total, &describe_publish(descriptor))
        } else {
            messages::ok(&describe_publish(descriptor))
        };
        println!("{}", line);
    }

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

    fn local_config(root: &std::path::Path) -> FileConfig {
        FileConfig {
            storage: StorageSection {
                storage_type: Some("local".to_string()),
                path: Some(root.to_string_lossy().into_owned()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn write_module(dir: &std::path::Path, version: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(
            dir.join("petra-config.yaml"),
            format!("namespace: net\nname: vpc\nprovider: aws\nversion: {}\n", version),
        )
        .unwrap();
        std::fs::write(dir.join("main.tf"), "resource \"null_resource\" \"x\" {}\n").unwrap();
    }

    #[tokio::test]
    async fn test_publish_then_conflict() {
        let storage = TempDir::new().unwrap();
        let modules = TempDir::new().unwrap();
        write_module(modules.path(), "1.0.0");
        let file = local_config(storage.path());

        let args = || PublishArgs {
            bucket: "modules".to_string(),
            module_directory: modules.path().to_path_buf(),
            recursive: false,
            force: false,
            exclude_tool_dirs: false,
        };

        execute_publish(&file, args(), false).await.unwrap();
        assert!(storage
            .path()
            .join("modules/net/vpc/aws/net-vpc-aws-1.0.0.tar.gz")
            .is_file());

        match execute_publish(&file, args(), false).await {
            Err(CliError::Service(ServiceError::ObjectConflict(_))) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_missing_directory() {
        let storage = TempDir::new().unwrap();
        let file = local_config(storage.path());
        let args = PublishArgs {
            bucket: "modules".to_string(),
            module_directory: storage.path().join("absent"),
            recursive: true,
            force: false,
            exclude_tool_dirs: false,
        };

        let err = execute_publish(&file, args, false).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_publish_recursive_tree() {
        let storage = TempDir::new().unwrap();
        let modules = TempDir::new().unwrap();
        write_module(&modules.path().join("a"), "1.0.0");
        write_module(&modules.path().join("b"), "1.1.0");
        let file = local_config(storage.path());

        let args = PublishArgs {
            bucket: "modules".to_string(),
            module_directory: modules.path().to_path_buf(),
            recursive: true,
            force: false,
            exclude_tool_dirs: false,
        };

        execute_publish(&file, args, true).await.unwrap();
        let prefix = storage.path().join("modules/net/vpc/aws");
        assert!(prefix.join("net-vpc-aws-1.0.0.tar.gz").is_file());
        assert!(prefix.join("net-vpc-aws-1.1.0.tar.gz").is_file());
    }
}
