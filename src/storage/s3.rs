//! AWS S3 object storage backend.
//!
//! Stores image bytes in a single bucket and produces presigned GET URLs
//! for the read paths.  Signing is delegated entirely to the SDK
//! presigner; no signature material lives in this crate.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;

use super::backend::{ObjectStorage, SIGNED_URL_EXPIRY_SECS};

/// S3-backed [`ObjectStorage`].
pub struct S3ObjectStorage {
    client: Client,
    bucket: String,
}

impl S3ObjectStorage {
    /// Create a backend over an already-configured SDK client.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Map an AWS SDK error to an anyhow error with context.
    fn map_sdk_error(context: &str, err: impl std::fmt::Display) -> anyhow::Error {
        anyhow::anyhow!("S3 {context}: {err}")
    }
}

impl ObjectStorage for S3ObjectStorage {
    fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            debug!(
                "S3 put_object: bucket={} key={} bytes={}",
                self.bucket,
                key,
                data.len()
            );
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .content_type(&content_type)
                .body(data.into())
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("put_object", e))?;
            Ok(())
        })
    }

    fn signed_get_url(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let config = PresigningConfig::expires_in(Duration::from_secs(SIGNED_URL_EXPIRY_SECS))
                .map_err(|e| Self::map_sdk_error("presigning config", e))?;

            let presigned = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&key)
                .presigned(config)
                .await
                .map_err(|e| Self::map_sdk_error("presign get_object", e))?;

            Ok(presigned.uri().to_string())
        })
    }
}
