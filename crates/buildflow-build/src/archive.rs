//! Build context packaging
//!
//! Packs a project directory into an in-memory tar.gz stream whose entry
//! names are relative to the project root.

use crate::error::{BuildError, BuildResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tar::Builder;
use walkdir::WalkDir;

const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024; // 500MB

/// Compressed build context held in memory for the duration of one run
#[derive(Debug, PartialEq, Eq)]
pub struct Archive {
    data: Vec<u8>,
}

impl Archive {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl From<Vec<u8>> for Archive {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

/// Packs directories into build context archives
#[derive(Debug, Default, Clone)]
pub struct ContextArchiver {
    abort: Option<Arc<AtomicBool>>,
}

impl ContextArchiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop packaging at the next entry once `abort` is set
    pub fn with_abort(abort: Arc<AtomicBool>) -> Self {
        Self { abort: Some(abort) }
    }

    /// Package the directory tree under `root` as tar.gz
    ///
    /// Entries are visited in file-name order. Symbolic links are archived as
    /// the content they point to. Any walk, stat or read failure aborts the
    /// whole archive.
    pub fn package(&self, root: &Path) -> BuildResult<Archive> {
        tracing::debug!("Creating build context from: {}", root.display());

        let mut data = Vec::new();
        let mut entries = 0usize;
        {
            let encoder = GzEncoder::new(&mut data, Compression::default());
            let mut tar = Builder::new(encoder);

            let walker = WalkDir::new(root)
                .follow_links(true)
                .sort_by_file_name()
                .min_depth(1);

            for entry in walker {
                self.check_abort()?;

                let entry = entry.map_err(|e| {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    BuildError::Packaging {
                        path,
                        source: e.into(),
                    }
                })?;
                let path = entry.path();
                let name = path
                    .strip_prefix(root)
                    .map_err(|e| BuildError::Packaging {
                        path: path.to_path_buf(),
                        source: std::io::Error::other(e),
                    })?;
                let file_type = entry.file_type();

                if file_type.is_dir() {
                    tar.append_dir(name, path).map_err(packaging(path))?;
                } else if file_type.is_file() {
                    let mut file = File::open(path).map_err(packaging(path))?;
                    tar.append_file(name, &mut file).map_err(packaging(path))?;
                } else {
                    return Err(BuildError::UnsupportedFileType(path.to_path_buf()));
                }
                entries += 1;
            }

            let encoder = tar.into_inner().map_err(packaging(root))?;
            encoder.finish().map_err(packaging(root))?;
        }

        tracing::debug!(
            "Build context created: {} entries, {} bytes",
            entries,
            data.len()
        );
        check_context_size(data.len());

        Ok(Archive { data })
    }

    fn check_abort(&self) -> BuildResult<()> {
        match &self.abort {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(BuildError::PackagingAborted),
            _ => Ok(()),
        }
    }
}

fn packaging(path: &Path) -> impl FnOnce(std::io::Error) -> BuildError + '_ {
    move |source| BuildError::Packaging {
        path: path.to_path_buf(),
        source,
    }
}

fn check_context_size(size: usize) {
    if size > MAX_CONTEXT_SIZE {
        tracing::warn!(
            "Build context is large ({}MB); uploads and builder start-up will be slow",
            size / 1024 / 1024
        );
    }
}
