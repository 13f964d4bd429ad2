//! Local directory context store
//!
//! Writes archives under a root directory on a host the cluster's nodes
//! share (kind, minikube, single-node setups). The builder reads the archive
//! through a hostPath mount of the same directory, so no object store
//! credentials are involved.

use crate::backend::LocalConfig;
use crate::error::{Result, StoreError};
use crate::store::{BuilderAccess, ContextLocation, ContextStore, validate_key};
use async_trait::async_trait;
use buildflow_build::Archive;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Staging files are hidden and never collide with a key
const STAGING_PREFIX: &str = ".buildflow-";
const STAGING_SUFFIX: &str = ".partial";

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(config: LocalConfig) -> Self {
        let root = std::path::absolute(&config.root).unwrap_or(config.root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn bucket(&self) -> String {
        self.root
            .to_string_lossy()
            .trim_start_matches('/')
            .trim_end_matches('/')
            .to_string()
    }
}

#[async_trait]
impl ContextStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    /// `tar:///<root>/<key>`, the builder's local archive context form
    fn location(&self, key: &str) -> ContextLocation {
        ContextLocation::new("tar", format!("/{}", self.bucket()), key)
    }

    fn builder_access(&self) -> BuilderAccess {
        BuilderAccess::HostPath(self.root.clone())
    }

    async fn upload(&self, archive: Archive, key: &str) -> Result<ContextLocation> {
        validate_key(key)?;
        let location = self.location(key);
        let target = self.path_for(key);
        let size = archive.len();

        let written = tokio::task::spawn_blocking({
            let target = target.clone();
            move || write_atomic(&target, archive.as_bytes())
        })
        .await
        .map_err(std::io::Error::other)
        .and_then(|result| result);

        written.map_err(|e| StoreError::Upload {
            location: location.to_string(),
            message: e.to_string(),
        })?;

        tracing::info!(
            "Stored build context ({} bytes) at {}",
            size,
            target.display()
        );
        Ok(location)
    }
}

/// Write `data` to a unique staging file next to `target`, then rename it
/// over `target`
fn write_atomic(target: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| std::io::Error::other(format!("{} has no parent", target.display())))?;
    std::fs::create_dir_all(parent)?;

    let mut staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(STAGING_SUFFIX)
        .tempfile_in(parent)?;
    staging.write_all(data)?;
    staging.as_file().sync_all()?;
    staging.persist(target).map_err(|e| e.error)?;
    Ok(())
}
