use std::time::Duration;

use thiserror::Error;

use crate::domain::registration::DuplicateField;

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Invalid request: {0}")]
    ValidationError(String),
    #[error("{0} is already registered")]
    DuplicateError(DuplicateField),
    #[error("Checksum verification failed")]
    ChecksumMismatchError,
    #[error("Malformed callback payload: {0}")]
    DecodeError(String),
    #[error("Registration data not found for order {0}")]
    NotFoundError(String),
    #[error("{service} request failed: {message}")]
    UpstreamError {
        service: &'static str,
        message: String,
    },
    #[error("{service} did not respond within {timeout:?}")]
    TimeoutError {
        service: &'static str,
        timeout: Duration,
    },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl RegistrationError {
    pub fn upstream(service: &'static str, message: impl Into<String>) -> Self {
        Self::UpstreamError {
            service,
            message: message.into(),
        }
    }

    /// Maps a reqwest failure, keeping client-side timeouts distinct.
    pub fn from_http(service: &'static str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimeoutError { service, timeout }
        } else {
            Self::upstream(service, err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistrationError>;
