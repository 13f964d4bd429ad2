use buildflow_config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Project directory not found: {0}")]
    ProjectNotFound(PathBuf),

    #[error("Dockerfile not found in project directory: {0}")]
    DockerfileNotFound(PathBuf),

    #[error("Failed to package {path}: {source}")]
    Packaging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported file type in build context: {0}")]
    UnsupportedFileType(PathBuf),

    #[error("Packaging aborted")]
    PackagingAborted,

    #[error("Unknown credential kind: {0}")]
    UnknownCredentialKind(String),

    #[error("Cannot derive {kind} credentials: {source}")]
    Credential {
        kind: &'static str,
        #[source]
        source: ConfigError,
    },

    #[error("Failed to serialize {kind} credentials: {source}")]
    Serialize {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl BuildError {
    /// Human-readable message with remediation hints
    pub fn user_message(&self) -> String {
        match self {
            BuildError::DockerfileNotFound(path) => {
                format!(
                    "Dockerfile not found: {}\n\
                     \n\
                     How to fix:\n\
                     1. Run from the directory containing the Dockerfile\n\
                     2. Or point at it explicitly: buildflow deploy --project-dir <dir>",
                    path.display()
                )
            }
            BuildError::Credential { kind, source } => {
                format!(
                    "Cannot derive {} credentials: {}\n\
                     \n\
                     Export the variable (or add it to your shell profile) and retry.",
                    kind, source
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
