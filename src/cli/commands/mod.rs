//! Command modules for CLI

pub mod publish;
pub mod serve;
pub mod update;
pub mod version;

use clap::Subcommand;

#[derive(Debug, Subcommand)]
#[command(about = "Petra CLI commands")]
pub enum Commands {
    /// Publish one module, or every module under a directory
    #[command(about = "Package and upload modules to the registry bucket")]
    Publish(publish::PublishArgs),

    /// Start the registry HTTP server
    #[command(about = "Serve the Terraform module registry protocol")]
    Serve(serve::ServeArgs),

    /// Amend owner/team of a published version
    #[command(about = "Update the metadata of an already published module version")]
    Update(update::UpdateArgs),

    /// Show version information
    #[command(about = "Show version information")]
    Version(version::VersionArgs),
}
