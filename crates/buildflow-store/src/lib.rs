//! buildflow build context stores
//!
//! The packaged build context is uploaded to a remote store the builder can
//! read from. Stores are pluggable; each backend is selected by name and
//! carries its own typed configuration.
//!
//! # Supported Backends
//!
//! - **s3**: AWS S3 and S3-compatible object stores (`s3://bucket/key`)
//! - **local**: a host directory the builder mounts (`tar:///dir/key`)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │           buildflow-pipeline          │
//! │     select(name) → upload(key)        │
//! └──────────────────┬───────────────────┘
//!                    │
//! ┌──────────────────▼───────────────────┐
//! │            buildflow-store            │
//! │      trait ContextStore { ... }       │
//! └────────┬─────────────────┬───────────┘
//!          │                 │
//!  ┌───────▼──────┐  ┌───────▼──────┐
//!  │   S3Store    │  │  LocalStore  │
//!  └──────────────┘  └──────────────┘
//! ```

pub mod backend;
pub mod error;
pub mod local;
pub mod s3;
pub mod store;

// Re-exports
pub use backend::{BackendConfig, BackendKind, LocalConfig, S3Config, select};
pub use error::{Result, StoreError};
pub use local::LocalStore;
pub use s3::S3Store;
pub use store::{BuilderAccess, ContextLocation, ContextStore};
