//! In-memory notification bus.
//!
//! Records every published event so tests can assert on the exact
//! subjects and payloads a handler produced.

use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use super::bus::{MutationEvent, NotificationBus};

/// A recorded publication.
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    /// Subject line.
    pub subject: String,
    /// JSON message body.
    pub message: serde_json::Value,
}

/// In-memory [`NotificationBus`] implementation.
#[derive(Default)]
pub struct MemoryNotificationBus {
    published: RwLock<Vec<PublishedEvent>>,
}

impl MemoryNotificationBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far, in order.
    pub fn published(&self) -> Vec<PublishedEvent> {
        self.published.read().expect("rwlock poisoned").clone()
    }
}

impl NotificationBus for MemoryNotificationBus {
    fn publish(
        &self,
        event: &MutationEvent,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let subject = event.subject().to_string();
        let message = serde_json::to_value(event);
        Box::pin(async move {
            let message = message?;
            let mut published = self.published.write().expect("rwlock poisoned");
            published.push(PublishedEvent { subject, message });
            Ok(())
        })
    }
}
