//! Project directory validation

use crate::error::{BuildError, BuildResult};
use std::path::{Path, PathBuf};

/// Build descriptor required at the project root
pub const BUILD_DESCRIPTOR: &str = "Dockerfile";

/// A project directory known to contain a build descriptor
#[derive(Debug, Clone)]
pub struct ProjectDir {
    root: PathBuf,
}

impl ProjectDir {
    /// Validate `root` as a buildable project
    ///
    /// Only local filesystem checks happen here.
    pub fn open(root: impl Into<PathBuf>) -> BuildResult<Self> {
        let root = root.into();

        if !root.is_dir() {
            return Err(BuildError::ProjectNotFound(root));
        }

        let descriptor = root.join(BUILD_DESCRIPTOR);
        match std::fs::metadata(&descriptor) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(BuildError::DockerfileNotFound(root)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BuildError::DockerfileNotFound(root));
            }
            Err(e) => {
                return Err(BuildError::Packaging {
                    path: descriptor,
                    source: e,
                });
            }
        }

        tracing::debug!("Validated project directory: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
