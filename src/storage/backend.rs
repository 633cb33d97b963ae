//! Abstract object storage trait.
//!
//! Every storage backend must implement [`ObjectStorage`].  The write
//! path stores raw bytes under a deterministic key; the read path only
//! ever hands out short-lived signed URLs, never the bytes themselves.

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;

/// Validity window for signed retrieval URLs, in seconds.
pub const SIGNED_URL_EXPIRY_SECS: u64 = 3600;

/// Async object storage contract.
pub trait ObjectStorage: Send + Sync + 'static {
    /// Write `data` under `key` with the given content type.
    fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Produce a signed GET URL for `key`, valid for
    /// [`SIGNED_URL_EXPIRY_SECS`].
    fn signed_get_url(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>>;
}
