//! CLI-specific error types

use petra::ServiceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Service(#[from] ServiceError),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Service(ServiceError::ManifestInvalid { .. })
            | CliError::Service(ServiceError::ManifestNotFound(_))
            | CliError::Service(ServiceError::ManifestParse(_))
            | CliError::Service(ServiceError::DirectoryNotFound(_))
            | CliError::Service(ServiceError::InvalidCoordinate(_))
            | CliError::Service(ServiceError::Config(_)) => 2,
            CliError::Service(ServiceError::ObjectConflict(_)) => 3,
            CliError::Service(ServiceError::StorageUnavailable(_))
            | CliError::Service(ServiceError::UpstreamTimeout(_)) => 4,
            _ => 1,
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Config("x".to_string()).exit_code(), 2);
        assert_eq!(
            CliError::Service(ServiceError::ObjectConflict("k".to_string())).exit_code(),
            3
        );
        assert_eq!(
            CliError::Service(ServiceError::UpstreamTimeout(Duration::from_secs(1))).exit_code(),
            4
        );
        assert_eq!(
            CliError::Service(ServiceError::Storage("boom".to_string())).exit_code(),
            1
        );
    }
}
