//! Notification bus trait and mutation event types.
//!
//! Every committed mutation publishes one JSON event to a single topic,
//! fire-and-forget: no acknowledgment is consumed and nothing is
//! persisted on this side.

use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

/// A mutation event, serialized to the JSON wire shape consumed by the
/// topic's subscribers.  The `action` tag and the per-action payloads
/// are part of the external contract and must not change.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MutationEvent {
    /// An item was created.
    #[serde(rename = "data_created")]
    DataCreated {
        id: String,
        timestamp: String,
        #[serde(rename = "hasImage")]
        has_image: bool,
    },

    /// An item was partially updated.
    ItemUpdated {
        id: String,
        timestamp: String,
        /// Names of the submitted fields (values are not carried).
        #[serde(rename = "updatedFields")]
        updated_fields: Vec<String>,
    },

    /// An item was deleted.
    ItemDeleted {
        id: String,
        timestamp: String,
        /// Full pre-delete snapshot of the row.
        #[serde(rename = "deletedItem")]
        deleted_item: serde_json::Value,
    },
}

impl MutationEvent {
    /// Human-readable subject line accompanying the message.
    pub fn subject(&self) -> &'static str {
        match self {
            MutationEvent::DataCreated { .. } => "Data Created Notification",
            MutationEvent::ItemUpdated { .. } => "Item Updated Notification",
            MutationEvent::ItemDeleted { .. } => "Item Deleted Notification",
        }
    }
}

/// Async notification bus contract.
pub trait NotificationBus: Send + Sync + 'static {
    /// Publish one event to the configured topic.
    fn publish(
        &self,
        event: &MutationEvent,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn created_event_wire_shape() {
        let event = MutationEvent::DataCreated {
            id: "abc".to_string(),
            timestamp: "2026-01-01T00:00:00.000Z".to_string(),
            has_image: true,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "action": "data_created",
                "id": "abc",
                "timestamp": "2026-01-01T00:00:00.000Z",
                "hasImage": true,
            })
        );
        assert_eq!(event.subject(), "Data Created Notification");
    }

    #[test]
    fn updated_event_carries_field_names() {
        let event = MutationEvent::ItemUpdated {
            id: "abc".to_string(),
            timestamp: "2026-01-01T00:00:00.000Z".to_string(),
            updated_fields: vec!["title".to_string(), "price".to_string()],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["action"], "item_updated");
        assert_eq!(value["updatedFields"], json!(["title", "price"]));
    }

    #[test]
    fn deleted_event_carries_snapshot() {
        let event = MutationEvent::ItemDeleted {
            id: "abc".to_string(),
            timestamp: "2026-01-01T00:00:00.000Z".to_string(),
            deleted_item: json!({ "id": "abc", "title": "Item 1" }),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["action"], "item_deleted");
        assert_eq!(value["deletedItem"]["title"], "Item 1");
    }
}
