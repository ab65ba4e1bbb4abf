//! Notification outbox rows.

use procura_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `notification_outbox` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OutboxNotification {
    pub id: DbId,
    pub kind: String,
    pub entity_type: String,
    pub entity_ids: Vec<DbId>,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
    pub dispatched_at: Option<Timestamp>,
}

/// DTO for enqueueing a notification.
#[derive(Debug, Clone)]
pub struct CreateOutboxNotification {
    pub kind: String,
    pub entity_type: String,
    pub entity_ids: Vec<DbId>,
    pub payload: serde_json::Value,
}
