//! Cluster gateway
//!
//! Applies secrets and builder jobs by declared name. Applying the same
//! resource twice converges on the same state.

use crate::error::{ClusterError, Result};
use crate::manifest::{MANAGER, job_manifest, secret_manifest};
use async_trait::async_trait;
use buildflow_build::{BuildJob, SecretManifest};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::PathBuf;
use tokio::sync::OnceCell;

/// Cluster capability the pipeline depends on
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    /// Create or update a secret; returns the applied resource name
    async fn apply_secret(&self, secret: &SecretManifest) -> Result<String>;

    /// Create or update a builder job; returns the applied resource name
    async fn apply_job(&self, job: &BuildJob) -> Result<String>;
}

/// Kubernetes implementation using server-side apply
///
/// The API client is created on the first apply, so an unreadable
/// kubeconfig is reported by the first cluster call rather than at
/// construction.
pub struct KubeGateway {
    namespace: String,
    kubeconfig: Option<PathBuf>,
    client: OnceCell<Client>,
}

impl KubeGateway {
    pub fn new(namespace: impl Into<String>, kubeconfig: Option<PathBuf>) -> Self {
        Self {
            namespace: namespace.into(),
            kubeconfig,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&Client> {
        self.client.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> Result<Client> {
        let config = match &self.kubeconfig {
            Some(path) => {
                tracing::debug!("Loading kubeconfig from {}", path.display());
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    ClusterError::Config(format!(
                        "failed to read kubeconfig {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| ClusterError::Config(format!("failed to load kubeconfig: {}", e)))?
            }
            None => Config::infer()
                .await
                .map_err(|e| ClusterError::Config(format!("failed to infer config: {}", e)))?,
        };

        tracing::debug!("Connecting to cluster at {}", config.cluster_url);
        Client::try_from(config)
            .map_err(|e| ClusterError::Config(format!("failed to create client: {}", e)))
    }

    fn params() -> PatchParams {
        PatchParams::apply(MANAGER).force()
    }
}

#[async_trait]
impl ClusterGateway for KubeGateway {
    async fn apply_secret(&self, secret: &SecretManifest) -> Result<String> {
        let client = self.client().await?.clone();
        let api: Api<Secret> = Api::namespaced(client, &self.namespace);
        let manifest = secret_manifest(secret);

        api.patch(&secret.name, &Self::params(), &Patch::Apply(&manifest))
            .await
            .map_err(|e| ClusterError::Apply {
                kind: "Secret",
                name: secret.name.clone(),
                message: e.to_string(),
            })?;

        tracing::info!("Applied secret {}/{}", self.namespace, secret.name);
        Ok(secret.name.clone())
    }

    async fn apply_job(&self, job: &BuildJob) -> Result<String> {
        let manifest = job_manifest(job)?;
        let client = self.client().await?.clone();
        let api: Api<Job> = Api::namespaced(client, &self.namespace);

        api.patch(&job.name, &Self::params(), &Patch::Apply(&manifest))
            .await
            .map_err(|e| ClusterError::Apply {
                kind: "Job",
                name: job.name.clone(),
                message: e.to_string(),
            })?;

        tracing::info!("Applied job {}/{}", self.namespace, job.name);
        Ok(job.name.clone())
    }
}
