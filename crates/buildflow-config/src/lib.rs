//! buildflow configuration
//!
//! Credentials, registry identity and builder defaults are read from
//! environment variables into typed settings. Loading never fails; missing
//! values are reported by the accessor that needs them, so a run only fails
//! for configuration it actually uses.

pub mod error;
pub mod registry;

pub use error::*;
pub use registry::{DEFAULT_TAG, DOCKER_HUB_AUTH_SERVER, auth_server_for, extract_registry, validate_tag};

use std::path::PathBuf;

/// Recognized environment variables
pub mod env {
    pub const DOCKER_USERNAME: &str = "DOCKER_USERNAME";
    pub const DOCKER_PASSWORD: &str = "DOCKER_PASSWORD";
    pub const DOCKER_SERVER: &str = "DOCKER_SERVER";
    pub const DOCKER_REPO: &str = "DOCKER_REPO";
    pub const DOCKER_TAG: &str = "DOCKER_TAG";
    pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
    pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
    pub const AWS_REGION: &str = "AWS_REGION";
    pub const AWS_ENDPOINT_URL: &str = "AWS_ENDPOINT_URL";
    pub const KUBE_CONFIG: &str = "KUBE_CONFIG";
    pub const BUILDFLOW_BUILDER_IMAGE: &str = "BUILDFLOW_BUILDER_IMAGE";
}

/// Default builder image
pub const DEFAULT_BUILDER_IMAGE: &str = "gcr.io/kaniko-project/executor:latest";

/// Container registry identity and credentials
#[derive(Debug, Clone, Default)]
pub struct RegistrySettings {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Auth-config key; inferred from the destination image when unset
    pub server: Option<String>,
    pub repository: Option<String>,
    pub tag: Option<String>,
}

impl RegistrySettings {
    pub fn username(&self) -> Result<&str> {
        require(&self.username, env::DOCKER_USERNAME)
    }

    pub fn password(&self) -> Result<&str> {
        require(&self.password, env::DOCKER_PASSWORD)
    }

    /// Destination image reference `<username>/<repository>:<tag>`
    pub fn destination(&self) -> Result<String> {
        let username = self.username()?;
        let repository = require(&self.repository, env::DOCKER_REPO)?;
        let tag = self
            .tag
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TAG);
        validate_tag(tag)?;

        Ok(format!("{}/{}:{}", username, repository, tag))
    }

    /// Registry server the auth-config document is keyed by
    pub fn auth_server(&self) -> Result<String> {
        if let Some(server) = self.server.as_deref().filter(|s| !s.is_empty()) {
            return Ok(server.to_string());
        }

        let destination = self.destination()?;
        let server = auth_server_for(&destination);
        tracing::debug!(
            "{} not set, using {} inferred from {}",
            env::DOCKER_SERVER,
            server,
            destination
        );
        Ok(server)
    }
}

/// Object store access keys and location
#[derive(Debug, Clone, Default)]
pub struct ObjectStoreSettings {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores
    pub endpoint: Option<String>,
}

impl ObjectStoreSettings {
    pub fn access_key_id(&self) -> Result<&str> {
        require(&self.access_key_id, env::AWS_ACCESS_KEY_ID)
    }

    pub fn secret_access_key(&self) -> Result<&str> {
        require(&self.secret_access_key, env::AWS_SECRET_ACCESS_KEY)
    }

    pub fn region(&self) -> Result<&str> {
        require(&self.region, env::AWS_REGION)
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref().filter(|e| !e.is_empty())
    }
}

/// Builder job constants
///
/// Defaults match the kaniko executor image layout.
#[derive(Debug, Clone)]
pub struct BuilderSettings {
    pub image: String,
    pub container_name: String,
    /// Directory the registry-auth secret is mounted at
    pub registry_mount_path: String,
    /// File name the auth-config document is projected to
    pub registry_config_file: String,
}

impl Default for BuilderSettings {
    fn default() -> Self {
        Self {
            image: DEFAULT_BUILDER_IMAGE.to_string(),
            container_name: "kaniko-container".to_string(),
            registry_mount_path: "/kaniko/.docker".to_string(),
            registry_config_file: "config.json".to_string(),
        }
    }
}

/// Complete process configuration
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub registry: RegistrySettings,
    pub object_store: ObjectStoreSettings,
    pub builder: BuilderSettings,
    /// Explicit kubeconfig path; standard inference applies when unset
    pub kubeconfig: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let mut builder = BuilderSettings::default();
        if let Some(image) = var(env::BUILDFLOW_BUILDER_IMAGE) {
            builder.image = image;
        }

        let kubeconfig = var(env::KUBE_CONFIG)
            .map(|path| expand_home(&path))
            .transpose()?;

        Ok(Self {
            registry: RegistrySettings {
                username: var(env::DOCKER_USERNAME),
                password: var(env::DOCKER_PASSWORD),
                server: var(env::DOCKER_SERVER),
                repository: var(env::DOCKER_REPO),
                tag: var(env::DOCKER_TAG),
            },
            object_store: ObjectStoreSettings {
                access_key_id: var(env::AWS_ACCESS_KEY_ID),
                secret_access_key: var(env::AWS_SECRET_ACCESS_KEY),
                region: var(env::AWS_REGION),
                endpoint: var(env::AWS_ENDPOINT_URL),
            },
            builder,
            kubeconfig,
        })
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home =
                dirs::home_dir().ok_or_else(|| ConfigError::HomeDirNotFound(path.to_string()))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

fn require<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingVar(name))
}
