//! S3 object store backed by the `object_store` crate.

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore as _, PutOptions, PutPayload};

use super::ObjectStore;
use crate::error::{StoreError, StoreResult};

/// Writes objects to an S3 (or S3-compatible) bucket.
///
/// Credentials are read from the standard `AWS_*` environment variables.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint: Option<String>,
}

impl S3ObjectStore {
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region
    /// * `endpoint` - Custom endpoint for S3-compatible providers
    ///   (e.g. "http://localhost:9000" for MinIO)
    pub fn new(bucket: String, region: String, endpoint: Option<String>) -> StoreResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint {
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| StoreError::Config(e.to_string()))?;

        Ok(Self {
            store,
            bucket,
            region,
            endpoint,
        })
    }

    /// Public URL of an object.
    ///
    /// AWS uses virtual-hosted style; custom endpoints use path style.
    pub fn url_for(&self, key: &str) -> String {
        object_url(&self.bucket, &self.region, self.endpoint.as_deref(), key)
    }
}

fn object_url(bucket: &str, region: &str, endpoint: Option<&str>, key: &str) -> String {
    match endpoint {
        Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
        None => format!("https://{bucket}.s3.{region}.amazonaws.com/{key}"),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<String> {
        let location = Path::from(key);
        let size = bytes.len();
        let start = std::time::Instant::now();

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&location, PutPayload::from(bytes), options)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key,
                    size_bytes = size,
                    "S3 upload failed"
                );
                StoreError::WriteFailed(e.to_string())
            })?;

        tracing::debug!(
            bucket = %self.bucket,
            key,
            size_bytes = size,
            duration_ms = start.elapsed().as_millis() as u64,
            "S3 upload successful"
        );

        Ok(self.url_for(key))
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
