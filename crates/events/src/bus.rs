//! In-process notification bus backed by a `tokio::sync::broadcast` channel.
//!
//! Shared as `Arc<NotificationBus>` between the engines and the outbox
//! writer.

use chrono::{DateTime, Utc};
use procura_core::notifications::NotificationKind;
use procura_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// A request to notify someone about a set of entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,

    /// Ids of the entities the notification is about; their type is given
    /// by [`NotificationKind::entity_type`].
    pub entity_ids: Vec<DbId>,

    /// Kind-specific extra data.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, entity_ids: Vec<DbId>) -> Self {
        Self {
            kind,
            entity_ids,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// NotificationBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// Fire-and-forget notification queue.
///
/// ```rust
/// use procura_core::notifications::NotificationKind;
/// use procura_events::bus::{Notification, NotificationBus};
///
/// let bus = NotificationBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.enqueue(Notification::new(NotificationKind::RequestConfirmation, vec![1, 2]));
/// ```
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl NotificationBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unread notifications are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a notification to all current subscribers.
    ///
    /// Dropped silently when nobody is subscribed.
    pub fn enqueue(&self, notification: Notification) {
        tracing::debug!(
            kind = %notification.kind,
            count = notification.entity_ids.len(),
            "Notification enqueued"
        );
        let _ = self.sender.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_enqueued_notification() {
        let bus = NotificationBus::default();
        let mut rx = bus.subscribe();

        bus.enqueue(
            Notification::new(NotificationKind::ProxyMatchingOffer, vec![7])
                .with_payload(serde_json::json!({ "request_ids": [1, 2] })),
        );

        let received = rx.recv().await.expect("should receive the notification");
        assert_eq!(received.kind, NotificationKind::ProxyMatchingOffer);
        assert_eq!(received.entity_ids, vec![7]);
        assert_eq!(received.payload["request_ids"][1], 2);
    }

    #[tokio::test]
    async fn every_subscriber_gets_a_copy() {
        let bus = NotificationBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.enqueue(Notification::new(NotificationKind::GeocodePerson, vec![3]));

        assert_eq!(rx1.recv().await.unwrap().entity_ids, vec![3]);
        assert_eq!(rx2.recv().await.unwrap().entity_ids, vec![3]);
    }

    #[test]
    fn enqueue_without_subscribers_is_a_no_op() {
        let bus = NotificationBus::default();
        bus.enqueue(Notification::new(NotificationKind::RequestConfirmation, vec![]));
    }

    #[test]
    fn new_notification_has_empty_payload() {
        let n = Notification::new(NotificationKind::RequestConfirmation, vec![1]);
        assert!(n.payload.is_object());
        assert_eq!(n.payload.as_object().map(|o| o.len()), Some(0));
    }
}
