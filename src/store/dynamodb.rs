//! AWS DynamoDB item store backend.
//!
//! One table, keyed by the `id` string attribute.  Rows are stored with
//! their natural JSON attribute names (`title`, `price`, `imageKey`, ...)
//! so the table remains readable by the other consumers of the topic.
//!
//! Pagination cursors are the table's `LastEvaluatedKey` serialized to
//! JSON; the handler passes them through opaquely.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use tracing::debug;

use super::item::{ItemPatch, ItemRecord, ItemStore, ScanPage};

/// DynamoDB-backed [`ItemStore`].
pub struct DynamoItemStore {
    client: Client,
    table_name: String,
}

impl DynamoItemStore {
    /// Create a store over an already-configured SDK client.
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Map an AWS SDK error to an anyhow error with context.
    fn map_sdk_error(context: &str, err: impl std::fmt::Display) -> anyhow::Error {
        anyhow::anyhow!("DynamoDB {context}: {err}")
    }
}

// -- JSON <-> AttributeValue conversion --------------------------------------

/// Convert a JSON value to a DynamoDB attribute value.
fn to_attribute_value(value: &serde_json::Value) -> anyhow::Result<AttributeValue> {
    Ok(match value {
        serde_json::Value::Null => AttributeValue::Null(true),
        serde_json::Value::Bool(b) => AttributeValue::Bool(*b),
        serde_json::Value::Number(n) => AttributeValue::N(n.to_string()),
        serde_json::Value::String(s) => AttributeValue::S(s.clone()),
        serde_json::Value::Array(values) => AttributeValue::L(
            values
                .iter()
                .map(to_attribute_value)
                .collect::<anyhow::Result<Vec<_>>>()?,
        ),
        serde_json::Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), to_attribute_value(v)?)))
                .collect::<anyhow::Result<HashMap<_, _>>>()?,
        ),
    })
}

/// Convert a DynamoDB attribute value back to JSON.
fn from_attribute_value(value: &AttributeValue) -> anyhow::Result<serde_json::Value> {
    Ok(match value {
        AttributeValue::Null(_) => serde_json::Value::Null,
        AttributeValue::Bool(b) => serde_json::Value::Bool(*b),
        AttributeValue::N(n) => serde_json::Value::Number(
            n.parse()
                .map_err(|e| anyhow::anyhow!("invalid number attribute {n:?}: {e}"))?,
        ),
        AttributeValue::S(s) => serde_json::Value::String(s.clone()),
        AttributeValue::L(values) => serde_json::Value::Array(
            values
                .iter()
                .map(from_attribute_value)
                .collect::<anyhow::Result<Vec<_>>>()?,
        ),
        AttributeValue::M(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), from_attribute_value(v)?)))
                .collect::<anyhow::Result<serde_json::Map<_, _>>>()?,
        ),
        other => anyhow::bail!("unsupported attribute value: {other:?}"),
    })
}

/// Convert a full record to a DynamoDB item map.
fn record_to_item(record: &ItemRecord) -> anyhow::Result<HashMap<String, AttributeValue>> {
    let doc = serde_json::to_value(record)?;
    let map = doc
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("item record did not serialize to an object"))?;
    map.iter()
        .map(|(k, v)| Ok((k.clone(), to_attribute_value(v)?)))
        .collect()
}

/// Convert a DynamoDB item map back to a record.
fn item_to_record(item: &HashMap<String, AttributeValue>) -> anyhow::Result<ItemRecord> {
    let map: serde_json::Map<String, serde_json::Value> = item
        .iter()
        .map(|(k, v)| Ok((k.clone(), from_attribute_value(v)?)))
        .collect::<anyhow::Result<_>>()?;
    Ok(serde_json::from_value(serde_json::Value::Object(map))?)
}

/// Serialize a `LastEvaluatedKey` map into an opaque JSON cursor.
fn encode_cursor(key: &HashMap<String, AttributeValue>) -> anyhow::Result<String> {
    let map: serde_json::Map<String, serde_json::Value> = key
        .iter()
        .map(|(k, v)| Ok((k.clone(), from_attribute_value(v)?)))
        .collect::<anyhow::Result<_>>()?;
    Ok(serde_json::Value::Object(map).to_string())
}

/// Parse an opaque JSON cursor back into an `ExclusiveStartKey` map.
fn decode_cursor(cursor: &str) -> anyhow::Result<HashMap<String, AttributeValue>> {
    let value: serde_json::Value = serde_json::from_str(cursor)
        .map_err(|e| anyhow::anyhow!("invalid pagination cursor: {e}"))?;
    let map = value
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("invalid pagination cursor: not an object"))?;
    map.iter()
        .map(|(k, v)| Ok((k.clone(), to_attribute_value(v)?)))
        .collect()
}

impl ItemStore for DynamoItemStore {
    fn get(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<ItemRecord>>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            debug!("DynamoDB get_item: table={} id={}", self.table_name, id);
            let result = self
                .client
                .get_item()
                .table_name(&self.table_name)
                .key("id", AttributeValue::S(id))
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("get_item", e))?;

            match result.item() {
                Some(item) => Ok(Some(item_to_record(item)?)),
                None => Ok(None),
            }
        })
    }

    fn scan(
        &self,
        limit: Option<u32>,
        start_key: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ScanPage>> + Send + '_>> {
        let start_key = start_key.map(|s| s.to_string());
        Box::pin(async move {
            let mut scan = self.client.scan().table_name(&self.table_name);

            if let Some(limit) = limit {
                scan = scan.limit(limit as i32);
            }
            if let Some(cursor) = &start_key {
                scan = scan.set_exclusive_start_key(Some(decode_cursor(cursor)?));
            }

            let result = scan
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("scan", e))?;

            let items = result
                .items()
                .iter()
                .map(item_to_record)
                .collect::<anyhow::Result<Vec<_>>>()?;

            let last_evaluated_key = match result.last_evaluated_key() {
                Some(key) => Some(encode_cursor(key)?),
                None => None,
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
            debug!(
                "DynamoDB put_item: table={} id={}",
                self.table_name, record.id
            );
            let item = record_to_item(&record)?;
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("put_item", e))?;
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
            // Dynamic SET expression: placeholders for every patched field
            // plus the unconditional updatedAt bump.
            let mut parts = vec!["updatedAt = :updatedAt".to_string()];
            let mut names: HashMap<String, String> = HashMap::new();
            let mut values: HashMap<String, AttributeValue> = HashMap::new();
            values.insert(":updatedAt".to_string(), AttributeValue::S(updated_at));

            for (index, (name, value)) in patch.fields().enumerate() {
                let attr_name = format!("#attr{index}");
                let attr_value = format!(":val{index}");
                names.insert(attr_name.clone(), name.to_string());
                values.insert(attr_value.clone(), to_attribute_value(value)?);
                parts.push(format!("{attr_name} = {attr_value}"));
            }

            let expression = format!("SET {}", parts.join(", "));
            debug!(
                "DynamoDB update_item: table={} id={} expr={}",
                self.table_name, id, expression
            );

            let mut update = self
                .client
                .update_item()
                .table_name(&self.table_name)
                .key("id", AttributeValue::S(id))
                .update_expression(expression)
                .set_expression_attribute_values(Some(values));

            if !names.is_empty() {
                update = update.set_expression_attribute_names(Some(names));
            }

            update
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("update_item", e))?;
            Ok(())
        })
    }

    fn delete(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            debug!("DynamoDB delete_item: table={} id={}", self.table_name, id);
            self.client
                .delete_item()
                .table_name(&self.table_name)
                .key("id", AttributeValue::S(id))
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("delete_item", e))?;
            Ok(())
        })
    }
}
