//! Build submission orchestrator
//!
//! One run: validate → package → select store → upload → provision
//! credentials → apply secrets → submit job. The first failure ends the
//! run; nothing applied or uploaded before it is rolled back.

use crate::error::{PipelineError, Result};
use crate::stage::{Stage, StageObserver, StageTimeouts};
use buildflow_build::{
    Archive, BuildError, BuildJob, ContextArchiver, ContextSource, CredentialKind,
    CredentialProvisioner, JobSpecBuilder, ProjectDir, SecretManifest,
};
use buildflow_cluster::ClusterGateway;
use buildflow_config::{BuilderSettings, ObjectStoreSettings, Settings};
use buildflow_store::{BuilderAccess, ContextLocation, ContextStore, StoreError};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Secret holding the registry auth-config document
pub const REGISTRY_AUTH_SECRET: &str = "registry-auth";
/// Prefix of builder job names; the context key follows it
pub const JOB_NAME_PREFIX: &str = "buildflow-";

/// What to build and where to stage the context
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub project_dir: PathBuf,
    /// Context store backend name
    pub backend: String,
    /// Bucket (or root directory) the context is uploaded to
    pub bucket: String,
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub key: String,
    pub location: ContextLocation,
    pub destination: String,
    /// Secrets applied during the run, in apply order
    pub secrets: Vec<String>,
    pub job_name: String,
}

/// Secret name for a credential kind, given the context store backend
pub fn secret_name(kind: CredentialKind, backend: &str) -> String {
    match kind {
        CredentialKind::RegistryAuth => REGISTRY_AUTH_SECRET.to_string(),
        CredentialKind::ObjectStoreAccess => format!("{}-secret", backend),
    }
}

/// Credentials the builder needs to reach contexts through `access`
pub fn required_credentials(access: &BuilderAccess) -> &'static [CredentialKind] {
    match access {
        BuilderAccess::ObjectStore => &CredentialKind::REQUIRED,
        BuilderAccess::HostPath(_) => &[CredentialKind::RegistryAuth],
    }
}

/// Remote resources a run has created so far
#[derive(Debug, Default)]
struct RunState {
    location: Option<ContextLocation>,
    secrets: Vec<String>,
}

/// Sequences one build submission
///
/// A pipeline holds no per-run state and can serve concurrent runs.
pub struct Pipeline {
    gateway: Arc<dyn ClusterGateway>,
    credentials: Arc<CredentialProvisioner>,
    object_store: ObjectStoreSettings,
    builder: BuilderSettings,
    destination: String,
    timeouts: StageTimeouts,
    observer: Arc<dyn StageObserver>,
}

impl Pipeline {
    /// Create a pipeline
    ///
    /// Fails if the destination image reference cannot be formed from
    /// `settings`.
    pub fn new(
        settings: &Settings,
        credentials: Arc<CredentialProvisioner>,
        gateway: Arc<dyn ClusterGateway>,
    ) -> Result<Self> {
        let destination = settings
            .registry
            .destination()
            .map_err(PipelineError::Destination)?;

        Ok(Self {
            gateway,
            credentials,
            object_store: settings.object_store.clone(),
            builder: settings.builder.clone(),
            destination,
            timeouts: StageTimeouts::default(),
            observer: Arc::new(()),
        })
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Run the pipeline once
    pub async fn run(&self, request: &DeployRequest) -> Result<DeployOutcome> {
        let mut state = RunState::default();

        match self.execute(request, &mut state).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.observer.stage_failed(e.stage(), &e);
                tracing::debug!("Pipeline failed at {}: {}", e.stage(), e);
                if e.stage().leaves_resources() {
                    report_orphans(&state);
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, request: &DeployRequest, state: &mut RunState) -> Result<DeployOutcome> {
        self.begin(Stage::Validate);
        let project = ProjectDir::open(&request.project_dir).map_err(PipelineError::Validation)?;
        self.finish(Stage::Validate, &project.root().display().to_string());

        self.begin(Stage::Package);
        let archive = self.package(&project).await?;
        self.finish(Stage::Package, &format!("{} bytes", archive.len()));

        self.begin(Stage::SelectBackend);
        let store = buildflow_store::select(&request.backend, &request.bucket, &self.object_store)
            .map_err(select_error)?;
        self.finish(Stage::SelectBackend, store.name());

        self.begin(Stage::Upload);
        let key = Uuid::new_v4().to_string();
        let location = self.upload(store.as_ref(), archive, &key, state).await?;
        self.finish(Stage::Upload, &location.to_string());

        self.begin(Stage::ProvisionCredentials);
        let access = store.builder_access();
        let secrets = self.provision(&access, store.name())?;
        let source = self.context_source(&access, store.name())?;
        self.finish(Stage::ProvisionCredentials, &format!("{} secrets", secrets.len()));

        self.begin(Stage::ApplySecrets);
        for secret in &secrets {
            let resource = format!("secret/{}", secret.name);
            let name = self
                .apply(Stage::ApplySecrets, resource, self.gateway.apply_secret(secret))
                .await?;
            state.secrets.push(name);
        }
        self.finish(Stage::ApplySecrets, &state.secrets.join(", "));

        self.begin(Stage::SubmitJob);
        let job = BuildJob {
            name: format!("{}{}", JOB_NAME_PREFIX, key),
            spec: JobSpecBuilder::new(self.builder.clone()).build(
                &self.destination,
                &location.to_string(),
                &secret_name(CredentialKind::RegistryAuth, store.name()),
                &source,
            ),
        };
        let job_name = self
            .apply(
                Stage::SubmitJob,
                format!("job/{}", job.name),
                self.gateway.apply_job(&job),
            )
            .await?;
        self.finish(Stage::SubmitJob, &job_name);

        Ok(DeployOutcome {
            key,
            location,
            destination: self.destination.clone(),
            secrets: state.secrets.clone(),
            job_name,
        })
    }

    async fn package(&self, project: &ProjectDir) -> Result<Archive> {
        let abort = Arc::new(AtomicBool::new(false));
        let archiver = ContextArchiver::with_abort(Arc::clone(&abort));
        let root = project.root().to_path_buf();

        let task = tokio::task::spawn_blocking(move || archiver.package(&root));
        match tokio::time::timeout(self.timeouts.package, task).await {
            Ok(Ok(result)) => result.map_err(PipelineError::Packaging),
            Ok(Err(join_error)) => Err(PipelineError::Packaging(BuildError::Packaging {
                path: project.root().to_path_buf(),
                source: std::io::Error::other(join_error),
            })),
            Err(_) => {
                abort.store(true, Ordering::Relaxed);
                Err(PipelineError::Timeout {
                    stage: Stage::Package,
                    after: self.timeouts.package,
                })
            }
        }
    }

    async fn upload(
        &self,
        store: &dyn ContextStore,
        archive: Archive,
        key: &str,
        state: &mut RunState,
    ) -> Result<ContextLocation> {
        // A timed-out or failed upload may still have written the object
        state.location = Some(store.location(key));

        let upload = store.upload(archive, key);
        let location = deadline(Stage::Upload, self.timeouts.upload, upload)
            .await?
            .map_err(|source| PipelineError::Upload {
                key: key.to_string(),
                source,
            })?;

        state.location = Some(location.clone());
        Ok(location)
    }

    fn provision(&self, access: &BuilderAccess, backend: &str) -> Result<Vec<SecretManifest>> {
        required_credentials(access)
            .iter()
            .map(|&kind| {
                let payload = self
                    .credentials
                    .get(kind)
                    .map_err(|source| PipelineError::Credential { kind, source })?;
                Ok(SecretManifest {
                    name: secret_name(kind, backend),
                    kind,
                    payload: payload.clone(),
                })
            })
            .collect()
    }

    fn context_source(&self, access: &BuilderAccess, backend: &str) -> Result<ContextSource> {
        match access {
            BuilderAccess::ObjectStore => {
                let region = self
                    .credentials
                    .region()
                    .map_err(|source| PipelineError::Credential {
                        kind: CredentialKind::ObjectStoreAccess,
                        source,
                    })?;
                Ok(ContextSource::ObjectStore {
                    secret: secret_name(CredentialKind::ObjectStoreAccess, backend),
                    region: region.to_string(),
                })
            }
            BuilderAccess::HostPath(root) => Ok(ContextSource::HostPath {
                path: root.to_string_lossy().into_owned(),
            }),
        }
    }

    async fn apply<F>(&self, stage: Stage, resource: String, call: F) -> Result<String>
    where
        F: Future<Output = buildflow_cluster::Result<String>>,
    {
        deadline(stage, self.timeouts.apply, call)
            .await?
            .map_err(|source| PipelineError::ClusterApply {
                stage,
                resource,
                source,
            })
    }

    fn begin(&self, stage: Stage) {
        tracing::info!("{}...", stage.description());
        self.observer.stage_started(stage);
    }

    fn finish(&self, stage: Stage, detail: &str) {
        tracing::debug!("{} done: {}", stage, detail);
        self.observer.stage_finished(stage, detail);
    }
}

/// Await `future`, failing with a timeout for `stage` after `after`
async fn deadline<F: Future>(stage: Stage, after: Duration, future: F) -> Result<F::Output> {
    tokio::time::timeout(after, future)
        .await
        .map_err(|_| PipelineError::Timeout { stage, after })
}

fn select_error(error: StoreError) -> PipelineError {
    match error {
        StoreError::UnsupportedBackend(name) => PipelineError::UnsupportedBackend(name),
        StoreError::InvalidConfig { backend, message } => PipelineError::BackendConfig {
            backend: backend.to_string(),
            message,
        },
        other => PipelineError::BackendConfig {
            backend: "unknown".to_string(),
            message: other.to_string(),
        },
    }
}

fn report_orphans(state: &RunState) {
    if let Some(location) = &state.location {
        tracing::warn!(
            "Build context may remain at {}; remove it manually if no longer needed",
            location
        );
    }
    for secret in &state.secrets {
        tracing::warn!("Secret {} was applied and is left in place", secret);
    }
}
