//! Repository for the `notification_outbox` table.

use sqlx::PgPool;

use crate::models::notification::{CreateOutboxNotification, OutboxNotification};

const COLUMNS: &str = "id, kind, entity_type, entity_ids, payload, created_at, dispatched_at";

/// Durable queue drained by the external messaging worker. This service
/// only inserts.
pub struct NotificationOutboxRepo;

impl NotificationOutboxRepo {
    pub async fn insert(
        pool: &PgPool,
        input: &CreateOutboxNotification,
    ) -> Result<OutboxNotification, sqlx::Error> {
        let query = format!(
            "INSERT INTO notification_outbox (kind, entity_type, entity_ids, payload) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, OutboxNotification>(&query)
            .bind(&input.kind)
            .bind(&input.entity_type)
            .bind(&input.entity_ids)
            .bind(&input.payload)
            .fetch_one(pool)
            .await
    }
}
