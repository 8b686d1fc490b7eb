use thiserror::Error;

use crate::application::repos::RepoError;
use crate::config::LoadError;

/// Failures while bootstrapping or driving the binary.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {message}")]
    Database { message: String },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error(transparent)]
    Configuration(#[from] LoadError),
    #[error("data source error: {0}")]
    Source(#[from] RepoError),
    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

impl InfraError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
