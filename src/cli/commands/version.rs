//! Version command implementation

use crate::cli::error::CliResult;
use clap::Args;

/// Display Petra version
#[derive(Debug, Args)]
pub struct VersionArgs {}

pub async fn execute_version(_args: VersionArgs) -> CliResult<()> {
    println!("petra {}", petra::VERSION);
    Ok(())
}
