//! Context store trait definition

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use buildflow_build::Archive;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Context store abstraction trait
///
/// Uploading to an existing key overwrites it. Key uniqueness is the
/// caller's responsibility.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Returns the backend name (e.g., "s3", "local")
    fn name(&self) -> &str;

    /// Location an archive uploaded under `key` is reachable at
    ///
    /// Derived from configuration and key only.
    fn location(&self, key: &str) -> ContextLocation;

    /// How the builder reaches archives held by this store
    fn builder_access(&self) -> BuilderAccess;

    /// Upload `archive` under `key`
    async fn upload(&self, archive: Archive, key: &str) -> Result<ContextLocation>;
}

/// How the builder reaches an uploaded context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuilderAccess {
    /// Fetched over the network with object store credentials
    ObjectStore,
    /// Read from a host directory mounted into the builder at the same path
    HostPath(PathBuf),
}

/// `scheme://bucket/key` identifier of an uploaded build context
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextLocation {
    scheme: String,
    bucket: String,
    key: String,
}

impl ContextLocation {
    pub fn new(
        scheme: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for ContextLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
    }
}

/// Reject keys that are empty or escape their bucket
pub(crate) fn validate_key(key: &str) -> Result<()> {
    let well_formed = !key.is_empty()
        && !key.starts_with('/')
        && Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

    if well_formed {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}
