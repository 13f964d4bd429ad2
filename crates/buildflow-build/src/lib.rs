//! buildflow build-side components
//!
//! This crate packages a project directory into a build context, derives
//! the credentials the remote builder consumes, and describes the builder
//! job that is submitted to the cluster.

pub mod archive;
pub mod credentials;
pub mod error;
pub mod job;
pub mod project;

pub use archive::{Archive, ContextArchiver};
pub use credentials::{CredentialKind, CredentialPayload, CredentialProvisioner, SecretManifest};
pub use error::{BuildError, BuildResult};
pub use job::{
    BuildJob, BuildJobSpec, CONTEXT_VOLUME, ContainerSpec, ContextSource, EnvSource, EnvVar,
    HostPathVolume, JobSpecBuilder, RestartPolicy, SecretVolume, Volume, VolumeMount,
};
pub use project::{BUILD_DESCRIPTOR, ProjectDir};
