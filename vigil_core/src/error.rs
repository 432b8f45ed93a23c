use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VigilError {
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("Unknown monitor action: {0}")]
    UnknownAction(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Export failed: {0}")]
    ExportFailed(String),

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VigilError>;
