//! AWS SNS notification backend.

use std::future::Future;
use std::pin::Pin;

use aws_sdk_sns::Client;
use tracing::debug;

use super::bus::{MutationEvent, NotificationBus};

/// SNS-backed [`NotificationBus`] publishing to one fixed topic.
pub struct SnsNotificationBus {
    client: Client,
    topic_arn: String,
}

impl SnsNotificationBus {
    /// Create a bus over an already-configured SDK client.
    pub fn new(client: Client, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }
}

impl NotificationBus for SnsNotificationBus {
    fn publish(
        &self,
        event: &MutationEvent,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let subject = event.subject();
        let message = serde_json::to_string(event);
        Box::pin(async move {
            let message = message?;
            debug!("SNS publish: topic={} subject={}", self.topic_arn, subject);
            self.client
                .publish()
                .topic_arn(&self.topic_arn)
                .subject(subject)
                .message(message)
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("SNS publish: {e}"))?;
            Ok(())
        })
    }
}
