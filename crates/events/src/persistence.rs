//! Outbox writer.
//!
//! [`OutboxPersistence`] subscribes to the
//! [`NotificationBus`](crate::bus::NotificationBus) and writes every
//! notification to `notification_outbox`. It runs as a long-lived task and
//! exits once every bus handle has been dropped and the channel drained.

use procura_db::models::notification::{CreateOutboxNotification, OutboxNotification};
use procura_db::repositories::NotificationOutboxRepo;
use procura_db::DbPool;
use tokio::sync::broadcast;

use crate::bus::Notification;

/// Background service that persists notifications to the outbox table.
pub struct OutboxPersistence;

impl OutboxPersistence {
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<Notification>) {
        loop {
            match receiver.recv().await {
                Ok(notification) => {
                    if let Err(e) = Self::persist(&pool, &notification).await {
                        tracing::error!(
                            error = %e,
                            kind = %notification.kind,
                            entity_ids = ?notification.entity_ids,
                            "Failed to persist notification"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Outbox writer lagged, notifications were lost");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Notification bus closed, outbox writer shutting down");
                    break;
                }
            }
        }
    }

    async fn persist(
        pool: &DbPool,
        notification: &Notification,
    ) -> Result<OutboxNotification, sqlx::Error> {
        NotificationOutboxRepo::insert(pool, &Self::to_row(notification)).await
    }

    fn to_row(notification: &Notification) -> CreateOutboxNotification {
        CreateOutboxNotification {
            kind: notification.kind.as_str().to_string(),
            entity_type: notification.kind.entity_type().to_string(),
            entity_ids: notification.entity_ids.clone(),
            payload: notification.payload.clone(),
        }
    }
}
