//! Configuration resolution for the CLI
//!
//! Layers, lowest precedence first: `petra.toml` (or `--config`), environment
//! variables, command line flags.

use crate::cli::error::{CliError, CliResult};
use petra::storage::LocatorStyle;
use petra::ServiceConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Configuration file looked up in the current directory
pub const CONFIG_FILE_NAME: &str = "petra.toml";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;

/// `[storage]` table of the configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
    #[serde(rename = "type")]
    pub storage_type: Option<String>,
    pub path: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub base_url: Option<String>,
    pub locator: Option<String>,
    pub presign_expiry_secs: Option<u64>,
}

/// `[server]` table of the configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub request_timeout_secs: Option<u64>,
}

/// Parsed configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub server: ServerSection,
}

/// Load the configuration file.
///
/// An explicit path must exist; without one `petra.toml` is read from the
/// current directory when present.
pub fn load_config_file(explicit: Option<&Path>) -> CliResult<FileConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(CliError::Config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => {
            let candidate = PathBuf::from(CONFIG_FILE_NAME);
            if !candidate.is_file() {
                debug!("No {} in the current directory", CONFIG_FILE_NAME);
                return Ok(FileConfig::default());
            }
            candidate
        }
    };

    let content = std::fs::read_to_string(&path)?;
    let config = toml::from_str(&content).map_err(|e| {
        CliError::Config(format!("Failed to parse {}: {}", path.display(), e))
    })?;
    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Build the service configuration from the file, process environment and `--bucket`
pub fn create_service_config(file: &FileConfig, bucket: Option<&str>) -> CliResult<ServiceConfig> {
    build_service_config(file, |name| std::env::var(name).ok(), bucket)
}

fn build_service_config(
    file: &FileConfig,
    env: impl Fn(&str) -> Option<String>,
    bucket: Option<&str>,
) -> CliResult<ServiceConfig> {
    let mut config = ServiceConfig::default();
    let storage = &mut config.storage;
    let section = &file.storage;

    // Configuration file
    if let Some(storage_type) = &section.storage_type {
        storage.storage_type = storage_type.clone();
    }
    if let Some(path) = &section.path {
        storage.base_path = path.clone();
    }
    if let Some(value) = &section.bucket {
        storage.bucket = value.clone();
    }
    if let Some(region) = &section.region {
        storage.region = region.clone();
    }
    storage.endpoint = section.endpoint.clone();
    storage.base_url = section.base_url.clone();
    if let Some(locator) = &section.locator {
        storage.locator_style = locator.parse::<LocatorStyle>()?;
    }
    if let Some(secs) = section.presign_expiry_secs {
        storage.presign_expiry = Duration::from_secs(secs);
    }
    if let Some(secs) = file.server.request_timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }

    // Environment
    let storage = &mut config.storage;
    if let Some(storage_type) = env("PETRA_STORAGE_TYPE") {
        storage.storage_type = storage_type;
    }
    if let Some(path) = env("PETRA_STORAGE_PATH") {
        storage.base_path = path;
    }
    if let Some(value) = env("PETRA_BUCKET") {
        storage.bucket = value;
    }
    if let Some(region) = env("S3_REGION") {
        storage.region = region;
    }
    if let Some(endpoint) = env("S3_ENDPOINT") {
        storage.endpoint = Some(endpoint);
    }
    if let Some(base_url) = env("BLOB_BASE_URL") {
        storage.base_url = Some(base_url);
    }
    if let Some(secs) = env("PETRA_REQUEST_TIMEOUT_SECS") {
        let secs: u64 = secs.parse().map_err(|_| {
            CliError::Config(format!(
                "PETRA_REQUEST_TIMEOUT_SECS must be a number of seconds, got '{}'",
                secs
            ))
        })?;
        config.request_timeout = Duration::from_secs(secs);
    }

    // Flags
    if let Some(value) = bucket {
        config.storage.bucket = value.to_string();
    }

    if config.request_timeout.is_zero() {
        return Err(CliError::Config(
            "Request timeout must be greater than zero".to_string(),
        ));
    }
    if let Some(endpoint) = &config.storage.endpoint {
        validate_url("endpoint", endpoint)?;
    }
    if let Some(base_url) = &config.storage.base_url {
        validate_url("base_url", base_url)?;
    }

    Ok(config)
}

/// Host and port to bind, flags over the `[server]` table over defaults
pub fn resolve_server_address(
    file: &FileConfig,
    host: Option<String>,
    port: Option<u16>,
) -> (String, u16) {
    let host = host
        .or_else(|| file.server.host.clone())
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = port.or(file.server.port).unwrap_or(DEFAULT_PORT);
    (host, port)
}

fn validate_url(field: &str, value: &str) -> CliResult<()> {
    let url = Url::parse(value)
        .map_err(|e| CliError::Config(format!("Invalid {} '{}': {}", field, value, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(CliError::Config(format!(
            "Invalid {} '{}': expected an http(s) URL",
            field, value
        )));
    }
    Ok(())
}
