//! Repository for campaign managers and the forwarding log.

use chrono::NaiveDate;
use procura_core::status::RequestStatus;
use procura_core::types::DbId;
use sqlx::PgPool;

use crate::models::campaign_manager::{CampaignManager, RequestForwarding};

/// Provides the campaign-manager directory and forwarding bookkeeping.
pub struct CampaignManagerRepo;

impl CampaignManagerRepo {
    pub async fn find_by_district(
        pool: &PgPool,
        district: &str,
    ) -> Result<Option<CampaignManager>, sqlx::Error> {
        sqlx::query_as::<_, CampaignManager>(
            "SELECT id, district, name, email, created_at FROM campaign_managers \
             WHERE district = $1",
        )
        .bind(district)
        .fetch_optional(pool)
        .await
    }

    /// The forwarding recorded for `district` on `day`, if any.
    pub async fn find_forwarding(
        pool: &PgPool,
        district: &str,
        day: NaiveDate,
    ) -> Result<Option<RequestForwarding>, sqlx::Error> {
        sqlx::query_as::<_, RequestForwarding>(
            "SELECT id, district, forwarded_on, manager_email, request_count, created_at \
             FROM voting_proxy_request_forwardings \
             WHERE district = $1 AND forwarded_on = $2",
        )
        .bind(district)
        .bind(day)
        .fetch_optional(pool)
        .await
    }

    /// Record the forwarding of `request_ids` and flip them to `forwarded`,
    /// in one transaction.
    ///
    /// Returns `None` when a forwarding for `(district, day)` already exists,
    /// in which case nothing changes. Otherwise returns the ids that were
    /// still pending and got flipped.
    pub async fn record_forwarding(
        pool: &PgPool,
        district: &str,
        day: NaiveDate,
        manager_email: &str,
        request_ids: &[DbId],
    ) -> Result<Option<Vec<DbId>>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let forwarding_id = sqlx::query_scalar::<_, DbId>(
            "INSERT INTO voting_proxy_request_forwardings (district, forwarded_on, manager_email) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (district, forwarded_on) DO NOTHING \
             RETURNING id",
        )
        .bind(district)
        .bind(day)
        .bind(manager_email)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(forwarding_id) = forwarding_id else {
            tx.rollback().await?;
            return Ok(None);
        };

        let mut forwarded = sqlx::query_scalar::<_, DbId>(
            "UPDATE voting_proxy_requests SET status_id = $2, updated_at = NOW() \
             WHERE id = ANY($1) AND status_id = $3 AND proxy_id IS NULL \
             RETURNING id",
        )
        .bind(request_ids)
        .bind(RequestStatus::Forwarded.id())
        .bind(RequestStatus::Created.id())
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("UPDATE voting_proxy_request_forwardings SET request_count = $2 WHERE id = $1")
            .bind(forwarding_id)
            .bind(forwarded.len() as i32)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        forwarded.sort_unstable();
        Ok(Some(forwarded))
    }
}
