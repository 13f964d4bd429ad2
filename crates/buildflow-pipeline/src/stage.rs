//! Pipeline stages, deadlines and progress reporting

use crate::error::PipelineError;
use std::fmt;
use std::time::Duration;

/// Steps of one pipeline run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Validate,
    Package,
    SelectBackend,
    Upload,
    ProvisionCredentials,
    ApplySecrets,
    SubmitJob,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Validate,
        Stage::Package,
        Stage::SelectBackend,
        Stage::Upload,
        Stage::ProvisionCredentials,
        Stage::ApplySecrets,
        Stage::SubmitJob,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            Stage::Validate => "Validating project",
            Stage::Package => "Packaging build context",
            Stage::SelectBackend => "Selecting context store",
            Stage::Upload => "Uploading build context",
            Stage::ProvisionCredentials => "Provisioning credentials",
            Stage::ApplySecrets => "Applying secrets",
            Stage::SubmitJob => "Submitting build job",
        }
    }

    /// Whether a failure at this stage can leave remote resources behind
    pub fn leaves_resources(&self) -> bool {
        *self >= Stage::Upload
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Package => "package",
            Stage::SelectBackend => "select-backend",
            Stage::Upload => "upload",
            Stage::ProvisionCredentials => "provision-credentials",
            Stage::ApplySecrets => "apply-secrets",
            Stage::SubmitJob => "submit-job",
        };
        f.write_str(name)
    }
}

/// Deadlines for the stages that do external work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    /// Directory walk and compression
    pub package: Duration,
    pub upload: Duration,
    /// Each individual secret or job apply
    pub apply: Duration,
}

impl StageTimeouts {
    pub const DEFAULT_PACKAGE: Duration = Duration::from_secs(120);
    pub const DEFAULT_UPLOAD: Duration = Duration::from_secs(300);
    pub const DEFAULT_APPLY: Duration = Duration::from_secs(30);
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            package: Self::DEFAULT_PACKAGE,
            upload: Self::DEFAULT_UPLOAD,
            apply: Self::DEFAULT_APPLY,
        }
    }
}

/// Receives stage transitions of a run
///
/// Every method has an empty default; `()` observes nothing.
pub trait StageObserver: Send + Sync {
    fn stage_started(&self, _stage: Stage) {}

    /// `detail` is a short human-readable result (size, location, name)
    fn stage_finished(&self, _stage: Stage, _detail: &str) {}

    fn stage_failed(&self, _stage: Stage, _error: &PipelineError) {}
}

impl StageObserver for () {}
