//! Serve command implementation

use crate::cli::config::{create_service_config, resolve_server_address, FileConfig};
use crate::cli::error::CliResult;
use crate::cli::utils::messages;
use clap::Args;
use petra::http::server::RegistryServer;
use petra::RegistryService;
use std::sync::Arc;
use tracing::info;

/// Serve the module registry protocol over HTTP
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Host to bind the server to
    #[arg(long, help = "Host to bind the server to [default: localhost]")]
    pub host: Option<String>,

    /// Port to bind the server to
    #[arg(long, help = "Port to bind the server to [default: 8080]")]
    pub port: Option<u16>,

    /// Bucket holding the published archives
    #[arg(long, help = "Bucket to serve modules from")]
    pub bucket: Option<String>,
}

pub async fn execute_serve(file: &FileConfig, args: ServeArgs) -> CliResult<()> {
    let config = create_service_config(file, args.bucket.as_deref())?;
    let (host, port) = resolve_server_address(file, args.host, args.port);

    // Fails fast when the store cannot be reached
    let service = Arc::new(RegistryService::new(config).await?);
    let server = RegistryServer::new(service, &host, port)?;

    info!("Starting Petra registry on {}:{}", host, port);
    println!("{}", messages::info(&format!("Listening on http://{}", server.addr())));

    server.serve().await?;
    Ok(())
}
