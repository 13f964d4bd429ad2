//! buildflow cluster access
//!
//! Renders credential secrets and builder jobs as Kubernetes resources and
//! applies them with server-side apply (field manager `buildflow`, forced).
//!
//! ```text
//! SecretManifest ──► secret_manifest() ──► v1/Secret ──┐
//!                                                      ├──► KubeGateway (SSA)
//! BuildJob ───────► job_manifest() ─────► batch/v1/Job ┘
//! ```

pub mod error;
pub mod gateway;
pub mod manifest;

pub use error::{ClusterError, Result};
pub use gateway::{ClusterGateway, KubeGateway};
pub use manifest::{MANAGED_BY_LABEL, job_manifest, secret_manifest};
