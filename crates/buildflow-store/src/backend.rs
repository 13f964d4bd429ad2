//! Backend selection
//!
//! Maps a backend name plus process configuration onto a typed backend
//! configuration, and that configuration onto a store.

use crate::error::{Result, StoreError};
use crate::local::LocalStore;
use crate::s3::S3Store;
use crate::store::ContextStore;
use buildflow_config::ObjectStoreSettings;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Known context store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    S3,
    Local,
}

impl BackendKind {
    pub const ALL: [BackendKind; 2] = [BackendKind::S3, BackendKind::Local];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::S3 => "s3",
            BackendKind::Local => "local",
        }
    }

    /// URI scheme of locations produced by this backend
    pub fn scheme(&self) -> &'static str {
        match self {
            BackendKind::S3 => "s3",
            BackendKind::Local => "tar",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| StoreError::UnsupportedBackend(s.to_string()))
    }
}

/// S3 backend configuration
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores; enables path-style addressing
    pub endpoint: Option<String>,
}

/// Local directory backend configuration
#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub root: PathBuf,
}

/// Typed configuration for one backend
#[derive(Debug, Clone)]
pub enum BackendConfig {
    S3(S3Config),
    Local(LocalConfig),
}

impl BackendConfig {
    /// Build the configuration for `kind`
    ///
    /// `bucket` is the S3 bucket name, or the root directory for `local`.
    pub fn resolve(kind: BackendKind, bucket: &str, settings: &ObjectStoreSettings) -> Result<Self> {
        if bucket.is_empty() {
            return Err(StoreError::InvalidConfig {
                backend: kind.as_str(),
                message: "bucket is required (--build-context-bucket)".to_string(),
            });
        }

        match kind {
            BackendKind::S3 => {
                if bucket.contains('/') {
                    return Err(StoreError::InvalidConfig {
                        backend: "s3",
                        message: format!("invalid bucket name: {}", bucket),
                    });
                }

                let invalid = |e: buildflow_config::ConfigError| StoreError::InvalidConfig {
                    backend: "s3",
                    message: e.to_string(),
                };

                Ok(BackendConfig::S3(S3Config {
                    bucket: bucket.to_string(),
                    access_key_id: settings.access_key_id().map_err(invalid)?.to_string(),
                    secret_access_key: settings.secret_access_key().map_err(invalid)?.to_string(),
                    region: settings.region().map_err(invalid)?.to_string(),
                    endpoint: settings.endpoint().map(str::to_string),
                }))
            }
            BackendKind::Local => Ok(BackendConfig::Local(LocalConfig {
                root: PathBuf::from(bucket),
            })),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::S3(_) => BackendKind::S3,
            BackendConfig::Local(_) => BackendKind::Local,
        }
    }

    pub fn into_store(self) -> Box<dyn ContextStore> {
        match self {
            BackendConfig::S3(config) => Box::new(S3Store::new(config)),
            BackendConfig::Local(config) => Box::new(LocalStore::new(config)),
        }
    }
}

/// Select a store by backend name
///
/// Unknown names fail before any configuration is read.
pub fn select(
    name: &str,
    bucket: &str,
    settings: &ObjectStoreSettings,
) -> Result<Box<dyn ContextStore>> {
    let kind: BackendKind = name.parse()?;
    let config = BackendConfig::resolve(kind, bucket, settings)?;
    tracing::debug!("Selected {} context store for {}", kind, bucket);
    Ok(config.into_store())
}
