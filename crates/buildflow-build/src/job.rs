//! Builder job specification
//!
//! Describes the single-container batch job that runs the remote builder.
//! The description is cluster-agnostic; `buildflow-cluster` renders it into
//! Kubernetes resources.

use crate::credentials::{ACCESS_KEY_ID_FIELD, DOCKER_CONFIG_JSON_KEY, REGION_FIELD, SECRET_ACCESS_KEY_FIELD};
use buildflow_config::BuilderSettings;
use std::collections::BTreeMap;

/// How the builder reaches the build context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextSource {
    /// Fetched from an object store with the keys held in `secret`
    ObjectStore { secret: String, region: String },
    /// Read from a host directory mounted into the builder at the same path
    HostPath { path: String },
}

/// Where an environment variable's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvSource {
    Literal(String),
    /// Resolved by the cluster from a secret key at pod start
    SecretKey { secret: String, key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub source: EnvSource,
}

impl EnvVar {
    fn literal(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            source: EnvSource::Literal(value.to_string()),
        }
    }

    fn secret_key(name: &str, secret: &str, key: &str) -> Self {
        Self {
            name: name.to_string(),
            source: EnvSource::SecretKey {
                secret: secret.to_string(),
                key: key.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
    pub read_only: bool,
}

/// Volume backed by a secret, projecting selected keys to file paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretVolume {
    pub name: String,
    pub secret_name: String,
    /// secret key -> relative file path
    pub items: BTreeMap<String, String>,
}

/// Directory on the node the pod runs on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPathVolume {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Volume {
    Secret(SecretVolume),
    HostPath(HostPathVolume),
}

/// Volume name of the host directory holding local build contexts
pub const CONTEXT_VOLUME: &str = "build-context";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub args: Vec<String>,
    pub env: Vec<EnvVar>,
    pub volume_mounts: Vec<VolumeMount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    Never,
}

impl RestartPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestartPolicy::Never => "Never",
        }
    }
}

/// Single-container, single-attempt build job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildJobSpec {
    pub container: ContainerSpec,
    pub volumes: Vec<Volume>,
    pub restart_policy: RestartPolicy,
    /// Pod retries allowed by the job controller
    pub backoff_limit: i32,
}

/// A job spec with the name it is applied under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildJob {
    pub name: String,
    pub spec: BuildJobSpec,
}

/// Constructs builder job specs
#[derive(Debug, Clone)]
pub struct JobSpecBuilder {
    settings: BuilderSettings,
}

impl JobSpecBuilder {
    pub fn new(settings: BuilderSettings) -> Self {
        Self { settings }
    }

    /// Spec for building `destination` from the archive at `context`
    ///
    /// `registry_auth` names the secret holding the auth-config document.
    pub fn build(
        &self,
        destination: &str,
        context: &str,
        registry_auth: &str,
        source: &ContextSource,
    ) -> BuildJobSpec {
        let mut volume_mounts = vec![VolumeMount {
            name: registry_auth.to_string(),
            mount_path: self.settings.registry_mount_path.clone(),
            read_only: true,
        }];
        let mut volumes = vec![Volume::Secret(SecretVolume {
            name: registry_auth.to_string(),
            secret_name: registry_auth.to_string(),
            items: BTreeMap::from([(
                DOCKER_CONFIG_JSON_KEY.to_string(),
                self.settings.registry_config_file.clone(),
            )]),
        })];

        let env = match source {
            ContextSource::ObjectStore { secret, region } => vec![
                EnvVar::literal(REGION_FIELD, region),
                EnvVar::secret_key(ACCESS_KEY_ID_FIELD, secret, ACCESS_KEY_ID_FIELD),
                EnvVar::secret_key(SECRET_ACCESS_KEY_FIELD, secret, SECRET_ACCESS_KEY_FIELD),
            ],
            ContextSource::HostPath { path } => {
                volume_mounts.push(VolumeMount {
                    name: CONTEXT_VOLUME.to_string(),
                    mount_path: path.clone(),
                    read_only: true,
                });
                volumes.push(Volume::HostPath(HostPathVolume {
                    name: CONTEXT_VOLUME.to_string(),
                    path: path.clone(),
                }));
                Vec::new()
            }
        };

        BuildJobSpec {
            container: ContainerSpec {
                name: self.settings.container_name.clone(),
                image: self.settings.image.clone(),
                args: builder_args(destination, context),
                env,
                volume_mounts,
            },
            volumes,
            restart_policy: RestartPolicy::Never,
            backoff_limit: 0,
        }
    }
}

/// Builder arguments, in the order the builder expects
pub fn builder_args(destination: &str, context: &str) -> Vec<String> {
    vec![
        format!("--destination={}", destination),
        format!("--context={}", context),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_store() -> ContextSource {
        ContextSource::ObjectStore {
            secret: "s3-secret".to_string(),
            region: "eu-west-1".to_string(),
        }
    }

    fn build(source: &ContextSource) -> BuildJobSpec {
        JobSpecBuilder::new(BuilderSettings::default()).build(
            "user/repo:tag",
            "s3://bucket/k1",
            "registry-auth",
            source,
        )
    }

    #[test]
    fn test_args_are_exact() {
        let spec = build(&object_store());

        assert_eq!(
            spec.container.args,
            vec!["--destination=user/repo:tag", "--context=s3://bucket/k1"]
        );
    }

    #[test]
    fn test_env_references_object_store_secret() {
        let spec = build(&object_store());
        let env = &spec.container.env;

        assert_eq!(env.len(), 3);
        assert_eq!(
            env[0],
            EnvVar {
                name: "AWS_REGION".to_string(),
                source: EnvSource::Literal("eu-west-1".to_string()),
            }
        );
        for (var, key) in env[1..].iter().zip(["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"]) {
            assert_eq!(var.name, key);
            assert_eq!(
                var.source,
                EnvSource::SecretKey {
                    secret: "s3-secret".to_string(),
                    key: key.to_string(),
                }
            );
        }
    }

    #[test]
    fn test_registry_auth_mount() {
        let spec = build(&object_store());

        assert_eq!(
            spec.container.volume_mounts,
            vec![VolumeMount {
                name: "registry-auth".to_string(),
                mount_path: "/kaniko/.docker".to_string(),
                read_only: true,
            }]
        );
        assert_eq!(spec.volumes.len(), 1);
        let Volume::Secret(secret) = &spec.volumes[0] else {
            panic!("Expected a secret volume, got {:?}", spec.volumes[0]);
        };
        assert_eq!(secret.secret_name, "registry-auth");
        assert_eq!(
            secret.items.get(".dockerconfigjson").map(String::as_str),
            Some("config.json")
        );
    }

    #[test]
    fn test_host_path_context() {
        let source = ContextSource::HostPath {
            path: "/srv/contexts".to_string(),
        };
        let spec = JobSpecBuilder::new(BuilderSettings::default()).build(
            "user/repo:tag",
            "tar:///srv/contexts/k1",
            "registry-auth",
            &source,
        );

        assert!(spec.container.env.is_empty());
        assert_eq!(spec.container.args[1], "--context=tar:///srv/contexts/k1");
        assert_eq!(
            spec.container.volume_mounts[1],
            VolumeMount {
                name: "build-context".to_string(),
                mount_path: "/srv/contexts".to_string(),
                read_only: true,
            }
        );
        assert_eq!(
            spec.volumes[1],
            Volume::HostPath(HostPathVolume {
                name: "build-context".to_string(),
                path: "/srv/contexts".to_string(),
            })
        );
    }

    #[test]
    fn test_single_attempt() {
        let spec = build(&object_store());

        assert_eq!(spec.restart_policy, RestartPolicy::Never);
        assert_eq!(spec.restart_policy.as_str(), "Never");
        assert_eq!(spec.backoff_limit, 0);
    }

    #[test]
    fn test_builder_settings_are_applied() {
        let settings = BuilderSettings {
            image: "registry.local/kaniko:v1.23.0".to_string(),
            ..Default::default()
        };
        let spec = JobSpecBuilder::new(settings).build(
            "user/repo:tag",
            "s3://bucket/k1",
            "registry-auth",
            &object_store(),
        );

        assert_eq!(spec.container.image, "registry.local/kaniko:v1.23.0");
        assert_eq!(spec.container.name, "kaniko-container");
    }
}
