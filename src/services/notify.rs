/// Notification collaborator
///
/// Delivers a message to named recipients over a named channel (email, push,
/// in-app, ...). Channel semantics belong to the implementation.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Message to deliver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub recipients: Vec<String>,
    pub message: String,
    pub channel: String,
    #[serde(default)]
    pub subject: Option<String>,
}

/// Acknowledgement returned by the channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub id: String,
    pub delivered_to: usize,
    pub sent_at: DateTime<Utc>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<DeliveryReceipt>;
}

/// Notifier that logs and keeps every delivery in memory
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far
    pub async fn deliveries(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(&self, notification: Notification) -> Result<DeliveryReceipt> {
        if notification.recipients.is_empty() {
            return Err(anyhow!("Notification has no recipients"));
        }

        tracing::info!(
            "📣 Notification via {} to {} recipient(s): {}",
            notification.channel,
            notification.recipients.len(),
            notification.message
        );

        let receipt = DeliveryReceipt {
            id: uuid::Uuid::new_v4().to_string(),
            delivered_to: notification.recipients.len(),
            sent_at: Utc::now(),
        };
        self.sent.lock().await.push(notification);

        Ok(receipt)
    }
}
