//! Kubernetes resource rendering
//!
//! Turns the cluster-agnostic secret and job descriptions into typed
//! Kubernetes objects ready for server-side apply.

use crate::error::{ClusterError, Result};
use buildflow_build::{BuildJob, EnvSource, SecretManifest, Volume};
use k8s_openapi::ByteString;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{Value, json};
use std::collections::BTreeMap;

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGER: &str = "buildflow";

fn labels() -> BTreeMap<String, String> {
    BTreeMap::from([(MANAGED_BY_LABEL.to_string(), MANAGER.to_string())])
}

/// Render a credential secret
pub fn secret_manifest(secret: &SecretManifest) -> Secret {
    let data = secret
        .payload
        .fields()
        .iter()
        .map(|(field, value)| (field.clone(), ByteString(value.clone())))
        .collect();

    Secret {
        metadata: ObjectMeta {
            name: Some(secret.name.clone()),
            labels: Some(labels()),
            ..Default::default()
        },
        type_: Some(secret.kind.secret_type().to_string()),
        data: Some(data),
        ..Default::default()
    }
}

/// Render the builder job
pub fn job_manifest(job: &BuildJob) -> Result<Job> {
    let spec = &job.spec;
    let container = &spec.container;

    let env: Vec<Value> = container
        .env
        .iter()
        .map(|var| match &var.source {
            EnvSource::Literal(value) => json!({ "name": var.name, "value": value }),
            EnvSource::SecretKey { secret, key } => json!({
                "name": var.name,
                "valueFrom": { "secretKeyRef": { "name": secret, "key": key } }
            }),
        })
        .collect();

    let volume_mounts: Vec<Value> = container
        .volume_mounts
        .iter()
        .map(|mount| {
            json!({
                "name": mount.name,
                "mountPath": mount.mount_path,
                "readOnly": mount.read_only,
            })
        })
        .collect();

    let volumes: Vec<Value> = spec
        .volumes
        .iter()
        .map(|volume| match volume {
            Volume::Secret(secret) => {
                let items: Vec<Value> = secret
                    .items
                    .iter()
                    .map(|(key, path)| json!({ "key": key, "path": path }))
                    .collect();
                json!({
                    "name": secret.name,
                    "secret": { "secretName": secret.secret_name, "items": items }
                })
            }
            Volume::HostPath(host) => json!({
                "name": host.name,
                "hostPath": { "path": host.path, "type": "Directory" }
            }),
        })
        .collect();

    let manifest = json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": {
            "name": job.name,
            "labels": labels(),
        },
        "spec": {
            "backoffLimit": spec.backoff_limit,
            "template": {
                "metadata": { "labels": labels() },
                "spec": {
                    "restartPolicy": spec.restart_policy.as_str(),
                    "containers": [{
                        "name": container.name,
                        "image": container.image,
                        "args": container.args,
                        "env": env,
                        "volumeMounts": volume_mounts,
                    }],
                    "volumes": volumes,
                }
            }
        }
    });

    serde_json::from_value(manifest).map_err(|source| ClusterError::Manifest {
        kind: "Job",
        name: job.name.clone(),
        source,
    })
}
