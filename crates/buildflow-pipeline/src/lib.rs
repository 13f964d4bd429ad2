//! buildflow build submission pipeline
//!
//! Packages a project, stages the build context in a context store,
//! provisions the builder's credentials as cluster secrets and submits a
//! single-attempt builder job.
//!
//! ```text
//! ProjectDir ─► ContextArchiver ─► ContextStore::upload ─► ContextLocation
//!                                                               │
//! CredentialProvisioner ─► ClusterGateway::apply_secret ×1..2   │
//!                                                               ▼
//!                 JobSpecBuilder ─► ClusterGateway::apply_job (buildflow-<key>)
//! ```
//!
//! Every external step runs under a deadline from [`StageTimeouts`].

pub mod error;
pub mod pipeline;
pub mod stage;

pub use error::{PipelineError, Result};
pub use pipeline::{
    DeployOutcome, DeployRequest, JOB_NAME_PREFIX, Pipeline, REGISTRY_AUTH_SECRET,
    required_credentials, secret_name,
};
pub use stage::{Stage, StageObserver, StageTimeouts};
