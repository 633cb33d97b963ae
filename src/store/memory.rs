//! In-memory item store.
//!
//! Keeps all rows in memory with no persistence.  Useful for tests and
//! local development.  Uses `RwLock<BTreeMap>` for thread-safe access;
//! the BTreeMap gives a stable scan order (ascending id) so pagination
//! is deterministic.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use super::item::{ItemPatch, ItemRecord, ItemStore, ScanPage};

/// In-memory [`ItemStore`] implementation.
#[derive(Default)]
pub struct MemoryItemStore {
    rows: RwLock<BTreeMap<String, ItemRecord>>,
}

impl MemoryItemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.rows.read().expect("rwlock poisoned").len()
    }

    /// Whether the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encode a resume cursor as the same opaque JSON shape DynamoDB uses
/// for a table keyed by `id`.
fn encode_cursor(id: &str) -> String {
    serde_json::json!({ "id": id }).to_string()
}

/// Decode a resume cursor back to the last-returned id.
fn decode_cursor(cursor: &str) -> anyhow::Result<String> {
    let value: serde_json::Value = serde_json::from_str(cursor)
        .map_err(|e| anyhow::anyhow!("invalid pagination cursor: {e}"))?;
    value
        .get("id")
        .and_then(|id| id.as_str())
        .map(|id| id.to_string())
        .ok_or_else(|| anyhow::anyhow!("invalid pagination cursor: missing id"))
}

impl ItemStore for MemoryItemStore {
    fn get(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<ItemRecord>>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            let rows = self.rows.read().expect("rwlock poisoned");
            Ok(rows.get(&id).cloned())
        })
    }

    fn scan(
        &self,
        limit: Option<u32>,
        start_key: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ScanPage>> + Send + '_>> {
        let start_key = start_key.map(|s| s.to_string());
        Box::pin(async move {
            let after = match start_key {
                Some(cursor) => Some(decode_cursor(&cursor)?),
                None => None,
            };

            let rows = self.rows.read().expect("rwlock poisoned");
            let total = rows.len();

            let mut items: Vec<ItemRecord> = Vec::new();
            let mut seen = 0usize;
            for (id, record) in rows.iter() {
                seen += 1;
                if let Some(after_id) = &after {
                    if id <= after_id {
                        continue;
                    }
                }
                items.push(record.clone());
                if let Some(limit) = limit {
                    if items.len() as u32 >= limit {
                        break;
                    }
                }
            }

            // Truncated if rows remain beyond the last one returned.
            let last_evaluated_key = match items.last() {
                Some(last) if seen < total => Some(encode_cursor(&last.id)),
                _ => None,
            };

            Ok(ScanPage {
                items,
                last_evaluated_key,
            })
        })
    }

    fn put(
        &self,
        record: ItemRecord,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut rows = self.rows.write().expect("rwlock poisoned");
            rows.insert(record.id.clone(), record);
            Ok(())
        })
    }

    fn update(
        &self,
        id: &str,
        patch: &ItemPatch,
        updated_at: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let id = id.to_string();
        let patch = patch.clone();
        let updated_at = updated_at.to_string();
        Box::pin(async move {
            let mut rows = self.rows.write().expect("rwlock poisoned");
            let record = rows
                .get(&id)
                .ok_or_else(|| anyhow::anyhow!("item {id} does not exist"))?;

            // Merge through the JSON representation so patched values land
            // in the typed fields and the flattened extras alike.
            let mut doc = serde_json::to_value(record)?;
            let map = doc
                .as_object_mut()
                .ok_or_else(|| anyhow::anyhow!("item {id} is not an object"))?;
            for (name, value) in patch.fields() {
                map.insert(name.to_string(), value.clone());
            }
            map.insert(
                "updatedAt".to_string(),
                serde_json::Value::String(updated_at),
            );

            let merged: ItemRecord = serde_json::from_value(doc)?;
            rows.insert(id, merged);
            Ok(())
        })
    }

    fn delete(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut rows = self.rows.write().expect("rwlock poisoned");
            rows.remove(&id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, title: &str) -> ItemRecord {
        ItemRecord {
            id: id.to_string(),
            title: title.to_string(),
            price: serde_json::Number::from(10),
            image_key: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
            extra: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryItemStore::new();
        store.put(record("a", "Item A")).await.unwrap();

        let fetched = store.get("a").await.unwrap().unwrap();
        assert_eq!(fetched.title, "Item A");
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn scan_paginates_in_id_order() {
        let store = MemoryItemStore::new();
        for id in ["a", "b", "c"] {
            store.put(record(id, id)).await.unwrap();
        }

        let first = store.scan(Some(2), None).await.unwrap();
        let ids: Vec<&str> = first.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        let cursor = first.last_evaluated_key.expect("truncated scan");

        let second = store.scan(Some(2), Some(&cursor)).await.unwrap();
        let ids: Vec<&str> = second.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);
        assert!(second.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn scan_of_full_table_has_no_cursor() {
        let store = MemoryItemStore::new();
        store.put(record("a", "Item A")).await.unwrap();
        store.put(record("b", "Item B")).await.unwrap();

        let page = store.scan(None, None).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn update_merges_and_bumps_updated_at() {
        let store = MemoryItemStore::new();
        store.put(record("a", "Item A")).await.unwrap();

        let body = json!({ "title": "X", "stock": 5, "id": "evil" });
        let patch = ItemPatch::from_body(body.as_object().unwrap());
        store
            .update("a", &patch, "2026-02-02T00:00:00.000Z")
            .await
            .unwrap();

        let updated = store.get("a").await.unwrap().unwrap();
        assert_eq!(updated.id, "a");
        assert_eq!(updated.title, "X");
        assert_eq!(updated.created_at, "2026-01-01T00:00:00.000Z");
        assert_eq!(updated.updated_at, "2026-02-02T00:00:00.000Z");
        assert_eq!(updated.extra.get("stock"), Some(&json!(5)));
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let store = MemoryItemStore::new();
        store.put(record("a", "Item A")).await.unwrap();
        store.delete("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
        // Deleting again is not an error.
        store.delete("a").await.unwrap();
    }
}
