//! Main CLI application structure

use clap::Parser;
use std::path::PathBuf;

use crate::cli::commands::{publish, serve, update, version, Commands};
use crate::cli::config::load_config_file;
use crate::cli::error::CliResult;
use crate::cli::utils::messages;

/// Petra CLI - publish and serve private Terraform modules
#[derive(Debug, Parser)]
#[command(name = "petra")]
#[command(version = petra::VERSION)]
#[command(about = "Petra - private Terraform module registry")]
#[command(long_about = "Petra publishes Terraform modules to an object store and serves \
                         the module registry protocol for `terraform init`.\n\n\
                         Configuration is resolved in this order (later wins):\n\
                         1. petra.toml in the current directory (or --config)\n\
                         2. Environment variables (PETRA_STORAGE_TYPE, PETRA_BUCKET, S3_REGION, ...)\n\
                         3. Command line flags\n\n\
                         Examples:\n\
                           petra publish --bucket modules --module-directory ./vpc\n\
                           petra publish --bucket modules --module-directory ./infra --recursive\n\
                           petra serve --host 0.0.0.0 --port 8080")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./petra.toml when present)
    #[arg(long, global = true, help = "Path to a petra.toml configuration file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> CliResult<()> {
        petra::init_logging();

        // Version needs neither configuration nor storage
        if let Commands::Version(args) = self.command {
            return version::execute_version(args).await;
        }

        let result = async {
            let file = load_config_file(self.config.as_deref())?;
            match self.command {
                Commands::Serve(args) => serve::execute_serve(&file, args).await,
                Commands::Publish(args) => publish::execute_publish(&file, args, self.verbose).await,
                Commands::Update(args) => update::execute_update(&file, args).await,
                Commands::Version(args) => version::execute_version(args).await,
            }
        }
        .await;

        if let Err(e) = &result {
            eprintln!("{}", messages::error(&e.to_string()));
        }
        result
    }
}
