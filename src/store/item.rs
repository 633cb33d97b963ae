//! Abstract item store trait and record types.
//!
//! Any item store backend must implement [`ItemStore`].  The trait uses
//! manually desugared pinned futures so it can be used as a trait object
//! behind `Arc<dyn ItemStore>` for both DynamoDB and in-memory backends.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

/// Attribute names a patch may never touch.  `id` is the primary key and
/// `createdAt`/`updatedAt` are owned by the handlers.
pub const PROTECTED_FIELDS: &[&str] = &["id", "createdAt", "updatedAt"];

/// A stored item row.
///
/// Beyond the core fields, rows are schemaless: the update path accepts
/// arbitrary additional attributes, captured here by the flattened `extra`
/// map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    /// Primary key (UUID, generated at creation time).
    pub id: String,
    /// Display title.
    pub title: String,
    /// Price.  Kept as a JSON number so `19.99` and `0` round-trip exactly.
    pub price: serde_json::Number,
    /// Object-storage key of the item's image, never a URL.
    pub image_key: Option<String>,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
    /// ISO-8601 last-update timestamp.
    pub updated_at: String,
    /// Any additional attributes written by updates.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A partial update: field name to new value, with protected fields
/// already excluded.
///
/// Built from a request body via [`ItemPatch::from_body`]; backends
/// translate it into their partial-update primitive (an `UpdateExpression`
/// for DynamoDB, a map merge in memory).
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    fields: BTreeMap<String, serde_json::Value>,
}

impl ItemPatch {
    /// Build a patch from a request body, dropping protected fields.
    pub fn from_body(body: &serde_json::Map<String, serde_json::Value>) -> Self {
        let fields = body
            .iter()
            .filter(|(key, _)| !PROTECTED_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self { fields }
    }

    /// Iterate over the patched fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether the patch carries no fields (the `updatedAt` bump still
    /// applies).
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One page of a full scan.
#[derive(Debug, Clone)]
pub struct ScanPage {
    /// Items in scan order.
    pub items: Vec<ItemRecord>,
    /// Opaque JSON cursor to resume from, if the scan was truncated.
    pub last_evaluated_key: Option<String>,
}

/// Async item store contract.
pub trait ItemStore: Send + Sync + 'static {
    /// Point lookup by primary key.
    fn get(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<ItemRecord>>> + Send + '_>>;

    /// Full scan with optional page size and opaque resume cursor.
    fn scan(
        &self,
        limit: Option<u32>,
        start_key: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ScanPage>> + Send + '_>>;

    /// Insert a full row (upsert by primary key).
    fn put(
        &self,
        record: ItemRecord,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Apply a partial update plus an `updatedAt` bump to `updated_at`.
    fn update(
        &self,
        id: &str,
        patch: &ItemPatch,
        updated_at: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Delete a row by primary key.  Deleting an absent row is not an
    /// error; existence checks belong to the caller.
    fn delete(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_drops_protected_fields() {
        let body = json!({
            "id": "evil",
            "createdAt": "1970-01-01T00:00:00.000Z",
            "updatedAt": "1970-01-01T00:00:00.000Z",
            "title": "New title",
            "stock": 5,
        });
        let patch = ItemPatch::from_body(body.as_object().unwrap());
        let names: Vec<&str> = patch.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["stock", "title"]);
    }

    #[test]
    fn patch_of_only_protected_fields_is_empty() {
        let body = json!({ "id": "x", "createdAt": "y", "updatedAt": "z" });
        let patch = ItemPatch::from_body(body.as_object().unwrap());
        assert!(patch.is_empty());
    }

    #[test]
    fn record_serializes_with_camel_case_and_null_image_key() {
        let record = ItemRecord {
            id: "abc".to_string(),
            title: "Item 1".to_string(),
            price: serde_json::Number::from_f64(19.99).unwrap(),
            image_key: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
            extra: serde_json::Map::new(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["imageKey"], serde_json::Value::Null);
        assert_eq!(value["createdAt"], "2026-01-01T00:00:00.000Z");
        assert_eq!(value["price"], json!(19.99));
    }
}
