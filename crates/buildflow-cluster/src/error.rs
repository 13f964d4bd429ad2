//! Cluster gateway error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClusterError {
    /// Cluster connection settings could not be loaded
    #[error("Cluster configuration error: {0}")]
    Config(String),

    #[error("Failed to apply {kind} {name}: {message}")]
    Apply {
        kind: &'static str,
        name: String,
        message: String,
    },

    #[error("Invalid {kind} manifest {name}: {source}")]
    Manifest {
        kind: &'static str,
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ClusterError>;
