//! In-memory object storage.
//!
//! Stores object bytes in a map and hands out deterministic fake URLs.
//! Useful for tests and local development.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use bytes::Bytes;

use super::backend::{ObjectStorage, SIGNED_URL_EXPIRY_SECS};

/// In-memory [`ObjectStorage`] implementation.
#[derive(Default)]
pub struct MemoryObjectStorage {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryObjectStorage {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an object was stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .read()
            .expect("rwlock poisoned")
            .contains_key(key)
    }

    /// Size in bytes of the object under `key`, if present.
    pub fn object_len(&self, key: &str) -> Option<usize> {
        self.objects
            .read()
            .expect("rwlock poisoned")
            .get(key)
            .map(|data| data.len())
    }
}

impl ObjectStorage for MemoryObjectStorage {
    fn put_object(
        &self,
        key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut objects = self.objects.write().expect("rwlock poisoned");
            objects.insert(key, data);
            Ok(())
        })
    }

    fn signed_get_url(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            Ok(format!(
                "memory://objects/{key}?expires={SIGNED_URL_EXPIRY_SECS}"
            ))
        })
    }
}
