//! S3 context store

use crate::backend::S3Config;
use crate::error::{Result, StoreError};
use crate::store::{BuilderAccess, ContextLocation, ContextStore, validate_key};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use buildflow_build::Archive;
use tokio::sync::OnceCell;

const CONTENT_TYPE: &str = "application/gzip";
const CREDENTIALS_PROVIDER: &str = "buildflow";

/// Uploads build contexts to an S3 bucket
///
/// The SDK client is created on first upload and reused afterwards.
pub struct S3Store {
    config: S3Config,
    client: OnceCell<Client>,
}

impl S3Store {
    pub fn new(config: S3Config) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    async fn client(&self) -> &Client {
        self.client
            .get_or_init(|| async {
                let credentials = Credentials::new(
                    &self.config.access_key_id,
                    &self.config.secret_access_key,
                    None,
                    None,
                    CREDENTIALS_PROVIDER,
                );

                let mut loader = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(self.config.region.clone()))
                    .credentials_provider(credentials);
                if let Some(endpoint) = &self.config.endpoint {
                    loader = loader.endpoint_url(endpoint);
                }
                let sdk_config = loader.load().await;

                // S3-compatible endpoints rarely support virtual-hosted buckets
                let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                    .force_path_style(self.config.endpoint.is_some())
                    .build();

                tracing::debug!(
                    "Created S3 client for region {} (endpoint: {})",
                    self.config.region,
                    self.config.endpoint.as_deref().unwrap_or("default")
                );
                Client::from_conf(s3_config)
            })
            .await
    }
}

#[async_trait]
impl ContextStore for S3Store {
    fn name(&self) -> &str {
        "s3"
    }

    fn location(&self, key: &str) -> ContextLocation {
        ContextLocation::new("s3", &self.config.bucket, key)
    }

    fn builder_access(&self) -> BuilderAccess {
        BuilderAccess::ObjectStore
    }

    async fn upload(&self, archive: Archive, key: &str) -> Result<ContextLocation> {
        validate_key(key)?;
        let location = self.location(key);
        let size = archive.len();

        tracing::info!("Uploading build context ({} bytes) to {}", size, location);

        self.client()
            .await
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type(CONTENT_TYPE)
            .content_length(size as i64)
            .body(ByteStream::from(archive.into_bytes()))
            .send()
            .await
            .map_err(|e| StoreError::Upload {
                location: location.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        tracing::debug!("Upload complete: {}", location);
        Ok(location)
    }
}
