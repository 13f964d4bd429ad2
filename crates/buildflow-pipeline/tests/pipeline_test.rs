//! End-to-end pipeline tests against the local context store and a
//! recording cluster gateway

use async_trait::async_trait;
use buildflow_build::{BuildJob, CredentialKind, CredentialProvisioner, SecretManifest, Volume};
use buildflow_cluster::{ClusterError, ClusterGateway};
use buildflow_config::{ObjectStoreSettings, RegistrySettings, Settings};
use buildflow_pipeline::{
    DeployRequest, Pipeline, PipelineError, Stage, StageObserver, StageTimeouts,
};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

#[derive(Debug, Clone)]
enum Applied {
    Secret(SecretManifest),
    Job(BuildJob),
}

#[derive(Default)]
struct RecordingGateway {
    applied: Mutex<Vec<Applied>>,
    fail_jobs: bool,
    delay: Option<Duration>,
}

impl RecordingGateway {
    fn applied(&self) -> Vec<Applied> {
        self.applied.lock().unwrap().clone()
    }

    fn names(&self) -> Vec<String> {
        self.applied()
            .into_iter()
            .map(|a| match a {
                Applied::Secret(s) => format!("secret/{}", s.name),
                Applied::Job(j) => format!("job/{}", j.name),
            })
            .collect()
    }
}

#[async_trait]
impl ClusterGateway for RecordingGateway {
    async fn apply_secret(&self, secret: &SecretManifest) -> buildflow_cluster::Result<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.applied
            .lock()
            .unwrap()
            .push(Applied::Secret(secret.clone()));
        Ok(secret.name.clone())
    }

    async fn apply_job(&self, job: &BuildJob) -> buildflow_cluster::Result<String> {
        if self.fail_jobs {
            return Err(ClusterError::Apply {
                kind: "Job",
                name: job.name.clone(),
                message: "admission webhook denied the request".to_string(),
            });
        }
        self.applied.lock().unwrap().push(Applied::Job(job.clone()));
        Ok(job.name.clone())
    }
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl StageObserver for RecordingObserver {
    fn stage_started(&self, stage: Stage) {
        self.events.lock().unwrap().push(format!("start:{}", stage));
    }

    fn stage_failed(&self, stage: Stage, _error: &PipelineError) {
        self.events.lock().unwrap().push(format!("fail:{}", stage));
    }
}

fn settings() -> Settings {
    Settings {
        registry: RegistrySettings {
            username: Some("alice".to_string()),
            password: Some("s3cret".to_string()),
            repository: Some("web".to_string()),
            tag: Some("v1".to_string()),
            ..Default::default()
        },
        object_store: ObjectStoreSettings {
            access_key_id: Some("AKIAEXAMPLE".to_string()),
            secret_access_key: Some("wJalrXUtnFEMI".to_string()),
            region: Some("eu-central-1".to_string()),
            endpoint: None,
        },
        ..Default::default()
    }
}

fn pipeline(settings: &Settings, gateway: Arc<RecordingGateway>) -> Pipeline {
    let credentials = Arc::new(CredentialProvisioner::new(
        settings.registry.clone(),
        settings.object_store.clone(),
    ));
    Pipeline::new(settings, credentials, gateway).unwrap()
}

fn project() -> TempDir {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("Dockerfile"), "FROM alpine\nCOPY . /app\n").unwrap();
    fs::create_dir(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/index.html"), "<h1>hi</h1>").unwrap();
    dir
}

fn request(project: &Path, backend: &str, bucket: &Path) -> DeployRequest {
    DeployRequest {
        project_dir: project.to_path_buf(),
        backend: backend.to_string(),
        bucket: bucket.to_string_lossy().into_owned(),
    }
}

#[tokio::test]
async fn test_successful_run() {
    let project = project();
    let bucket = tempdir().unwrap();
    let gateway = Arc::new(RecordingGateway::default());

    let outcome = pipeline(&settings(), Arc::clone(&gateway))
        .run(&request(project.path(), "local", bucket.path()))
        .await
        .unwrap();

    assert!(bucket.path().join(&outcome.key).is_file());
    assert_eq!(outcome.location.scheme(), "tar");
    assert_eq!(outcome.location.key(), outcome.key);
    assert_eq!(outcome.destination, "alice/web:v1");
    assert_eq!(outcome.secrets, vec!["registry-auth".to_string()]);
    assert_eq!(outcome.job_name, format!("buildflow-{}", outcome.key));

    assert_eq!(
        gateway.names(),
        vec![
            "secret/registry-auth".to_string(),
            format!("job/buildflow-{}", outcome.key),
        ]
    );

    let Some(Applied::Job(job)) = gateway.applied().pop() else {
        panic!("Expected the job to be applied last");
    };
    assert_eq!(
        job.spec.container.args,
        vec![
            "--destination=alice/web:v1".to_string(),
            format!("--context={}", outcome.location),
        ]
    );
    assert!(job.spec.container.env.is_empty());
    let Some(Volume::HostPath(context)) = job.spec.volumes.last() else {
        panic!("Expected the context directory to be mounted");
    };
    let root = bucket.path().to_string_lossy();
    assert_eq!(context.path, root);
    assert!(
        outcome
            .location
            .to_string()
            .starts_with(&format!("tar://{}/", root.trim_end_matches('/')))
    );
}

#[tokio::test]
async fn test_local_backend_needs_no_object_store_credentials() {
    let mut settings = settings();
    settings.object_store = ObjectStoreSettings::default();

    let project = project();
    let bucket = tempdir().unwrap();
    let gateway = Arc::new(RecordingGateway::default());

    let outcome = pipeline(&settings, Arc::clone(&gateway))
        .run(&request(project.path(), "local", bucket.path()))
        .await
        .unwrap();

    assert_eq!(outcome.secrets, vec!["registry-auth".to_string()]);
    assert_eq!(gateway.names().len(), 2);
}

#[tokio::test]
async fn test_missing_dockerfile_fails_before_cluster_calls() {
    let project = tempdir().unwrap();
    let bucket = tempdir().unwrap();
    let gateway = Arc::new(RecordingGateway::default());

    let result = pipeline(&settings(), Arc::clone(&gateway))
        .run(&request(project.path(), "local", bucket.path()))
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.stage(), Stage::Validate);
    assert!(err.to_string().contains("Dockerfile"));
    assert!(gateway.applied().is_empty());
    assert_eq!(fs::read_dir(bucket.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_unknown_backend_uploads_nothing() {
    let project = project();
    let bucket = tempdir().unwrap();
    let gateway = Arc::new(RecordingGateway::default());

    let result = pipeline(&settings(), Arc::clone(&gateway))
        .run(&request(project.path(), "gcs", bucket.path()))
        .await;

    assert!(matches!(result, Err(PipelineError::UnsupportedBackend(name)) if name == "gcs"));
    assert!(gateway.applied().is_empty());
    assert_eq!(fs::read_dir(bucket.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_concurrent_runs_use_distinct_keys() {
    let project = project();
    let bucket = tempdir().unwrap();
    let gateway = Arc::new(RecordingGateway::default());
    let pipeline = pipeline(&settings(), Arc::clone(&gateway));
    let request = request(project.path(), "local", bucket.path());

    let (first, second) = tokio::join!(pipeline.run(&request), pipeline.run(&request));
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_ne!(first.key, second.key);
    assert_ne!(first.job_name, second.job_name);
    assert!(bucket.path().join(&first.key).is_file());
    assert!(bucket.path().join(&second.key).is_file());

    let registry_payloads: Vec<_> = gateway
        .applied()
        .into_iter()
        .filter_map(|a| match a {
            Applied::Secret(s) if s.kind == CredentialKind::RegistryAuth => Some(s.payload),
            _ => None,
        })
        .collect();
    assert_eq!(registry_payloads.len(), 2);
    assert_eq!(registry_payloads[0], registry_payloads[1]);
}

#[tokio::test]
async fn test_job_failure_leaves_context_and_secrets() {
    let project = project();
    let bucket = tempdir().unwrap();
    let gateway = Arc::new(RecordingGateway {
        fail_jobs: true,
        ..Default::default()
    });

    let result = pipeline(&settings(), Arc::clone(&gateway))
        .run(&request(project.path(), "local", bucket.path()))
        .await;

    match result {
        Err(PipelineError::ClusterApply {
            stage, resource, ..
        }) => {
            assert_eq!(stage, Stage::SubmitJob);
            assert!(resource.starts_with("job/buildflow-"));
        }
        other => panic!("Expected ClusterApply error, got {:?}", other),
    }
    assert_eq!(gateway.names(), vec!["secret/registry-auth".to_string()]);
    assert_eq!(fs::read_dir(bucket.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_missing_credentials_fail_before_secrets() {
    let mut settings = settings();
    settings.registry.password = None;

    let project = project();
    let bucket = tempdir().unwrap();
    let gateway = Arc::new(RecordingGateway::default());

    let result = pipeline(&settings, Arc::clone(&gateway))
        .run(&request(project.path(), "local", bucket.path()))
        .await;

    match result {
        Err(PipelineError::Credential { kind, source }) => {
            assert_eq!(kind, CredentialKind::RegistryAuth);
            assert!(source.to_string().contains("DOCKER_PASSWORD"));
        }
        other => panic!("Expected Credential error, got {:?}", other),
    }
    assert!(gateway.applied().is_empty());
}

#[tokio::test]
async fn test_apply_timeout_names_stage() {
    let project = project();
    let bucket = tempdir().unwrap();
    let gateway = Arc::new(RecordingGateway {
        delay: Some(Duration::from_secs(5)),
        ..Default::default()
    });
    let observer = Arc::new(RecordingObserver::default());

    let result = pipeline(&settings(), Arc::clone(&gateway))
        .with_timeouts(StageTimeouts {
            apply: Duration::from_millis(50),
            ..Default::default()
        })
        .with_observer(observer.clone())
        .run(&request(project.path(), "local", bucket.path()))
        .await;

    assert!(matches!(
        result,
        Err(PipelineError::Timeout {
            stage: Stage::ApplySecrets,
            ..
        })
    ));
    assert!(gateway.applied().is_empty());

    let events = observer.events.lock().unwrap();
    assert_eq!(events.first().map(String::as_str), Some("start:validate"));
    assert_eq!(events.last().map(String::as_str), Some("fail:apply-secrets"));
}

#[test]
fn test_invalid_destination_is_rejected() {
    let mut settings = settings();
    settings.registry.repository = None;

    let credentials = Arc::new(CredentialProvisioner::new(
        settings.registry.clone(),
        settings.object_store.clone(),
    ));
    let result = Pipeline::new(&settings, credentials, Arc::new(RecordingGateway::default()));

    assert!(matches!(result, Err(PipelineError::Destination(_))));
}
