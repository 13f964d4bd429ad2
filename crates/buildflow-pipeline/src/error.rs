//! Pipeline error types

use crate::stage::Stage;
use buildflow_build::{BuildError, CredentialKind};
use buildflow_cluster::ClusterError;
use buildflow_config::ConfigError;
use buildflow_store::StoreError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(#[source] BuildError),

    #[error("Invalid destination image: {0}")]
    Destination(#[source] ConfigError),

    #[error("{0}")]
    Packaging(#[source] BuildError),

    #[error("Unsupported build context store: {0} (supported: s3, local)")]
    UnsupportedBackend(String),

    #[error("Invalid {backend} context store configuration: {message}")]
    BackendConfig { backend: String, message: String },

    #[error("Failed to upload build context {key}: {source}")]
    Upload {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("{source}")]
    Credential {
        kind: CredentialKind,
        #[source]
        source: BuildError,
    },

    #[error("Failed to apply {resource}: {source}")]
    ClusterApply {
        stage: Stage,
        resource: String,
        #[source]
        source: ClusterError,
    },

    #[error("{stage} timed out after {}s", .after.as_secs_f64())]
    Timeout { stage: Stage, after: Duration },
}

impl PipelineError {
    /// Stage the error was raised in
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Validation(_) | PipelineError::Destination(_) => Stage::Validate,
            PipelineError::Packaging(_) => Stage::Package,
            PipelineError::UnsupportedBackend(_) | PipelineError::BackendConfig { .. } => {
                Stage::SelectBackend
            }
            PipelineError::Upload { .. } => Stage::Upload,
            PipelineError::Credential { .. } => Stage::ProvisionCredentials,
            PipelineError::ClusterApply { stage, .. } | PipelineError::Timeout { stage, .. } => {
                *stage
            }
        }
    }

    /// Human-readable message with remediation hints
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Validation(e) | PipelineError::Credential { source: e, .. } => {
                e.user_message()
            }
            PipelineError::UnsupportedBackend(name) => format!(
                "Unsupported build context store: {}\n\
                 \n\
                 Available stores: s3, local\n\
                 Example: buildflow deploy -m s3 -b my-bucket",
                name
            ),
            PipelineError::ClusterApply {
                source: ClusterError::Config(message),
                ..
            } => format!(
                "Cannot connect to the cluster: {}\n\
                 \n\
                 How to fix:\n\
                 1. Set KUBE_CONFIG to a valid kubeconfig file\n\
                 2. Or make sure KUBECONFIG / ~/.kube/config points at a reachable cluster",
                message
            ),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
