//! Context store error types

use thiserror::Error;

/// Context store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unsupported build context store: {0} (supported: s3, local)")]
    UnsupportedBackend(String),

    #[error("Invalid {backend} configuration: {message}")]
    InvalidConfig {
        backend: &'static str,
        message: String,
    },

    #[error("Invalid context key: {0:?}")]
    InvalidKey(String),

    #[error("Upload to {location} failed: {message}")]
    Upload { location: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
