//! Repository for the `voting_proxy_requests` table.

use procura_core::matching::PoolRequest;
use procura_core::status::RequestStatus;
use procura_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::voting_proxy_request::{
    ForwardableRequestRow, PoolRequestRow, UpsertVotingProxyRequest, UpsertedRequest,
    VotingProxyRequest,
};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, email, first_name, last_name, contact_phone, voting_date, \
                       commune_id, consulate_id, polling_station_number, voter_id, \
                       status_id, proxy_id, outreach_invited_at, created_at, updated_at";

/// Provides reads and state changes for voting proxy requests.
pub struct VotingProxyRequestRepo;

impl VotingProxyRequestRepo {
    pub async fn find_by_ids(
        pool: &PgPool,
        ids: &[DbId],
    ) -> Result<Vec<VotingProxyRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM voting_proxy_requests WHERE id = ANY($1) \
             ORDER BY voting_date, id"
        );
        sqlx::query_as::<_, VotingProxyRequest>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// Upsert one row per date, keyed on `(email, voting_date)`, in a single
    /// transaction.
    ///
    /// Existing rows get their contact and jurisdiction fields refreshed;
    /// status and proxy assignment are left alone.
    pub async fn upsert_dates(
        pool: &PgPool,
        inputs: &[UpsertVotingProxyRequest],
    ) -> Result<Vec<UpsertedRequest>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut results = Vec::with_capacity(inputs.len());

        let query = format!(
            "INSERT INTO voting_proxy_requests \
                 (email, first_name, last_name, contact_phone, voting_date, commune_id, \
                  consulate_id, polling_station_number, voter_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (email, voting_date) DO UPDATE SET \
                 first_name = EXCLUDED.first_name, \
                 last_name = EXCLUDED.last_name, \
                 contact_phone = EXCLUDED.contact_phone, \
                 commune_id = EXCLUDED.commune_id, \
                 consulate_id = EXCLUDED.consulate_id, \
                 polling_station_number = EXCLUDED.polling_station_number, \
                 voter_id = EXCLUDED.voter_id, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}, (xmax = 0) AS created"
        );

        for input in inputs {
            let (commune_id, consulate_id) = input.jurisdiction.into_parts();
            let row = sqlx::query_as::<_, UpsertedRequest>(&query)
                .bind(&input.email)
                .bind(&input.first_name)
                .bind(&input.last_name)
                .bind(&input.contact_phone)
                .bind(input.voting_date)
                .bind(commune_id)
                .bind(consulate_id)
                .bind(&input.polling_station_number)
                .bind(&input.voter_id)
                .fetch_one(&mut *tx)
                .await?;
            results.push(row);
        }

        tx.commit().await?;
        Ok(results)
    }

    /// All `created`, unassigned requests with their commune's town-hall
    /// location, ordered by id.
    pub async fn list_pool(pool: &PgPool) -> Result<Vec<PoolRequestRow>, sqlx::Error> {
        sqlx::query_as::<_, PoolRequestRow>(
            "SELECT r.id, r.email, r.voting_date, r.status_id, r.proxy_id, r.commune_id, \
                    r.consulate_id, r.polling_station_number, \
                    c.latitude AS commune_latitude, c.longitude AS commune_longitude \
             FROM voting_proxy_requests r \
             LEFT JOIN communes c ON c.id = r.commune_id \
             WHERE r.status_id = $1 AND r.proxy_id IS NULL \
             ORDER BY r.id",
        )
        .bind(RequestStatus::Created.id())
        .fetch_all(pool)
        .await
    }

    /// [`Self::list_pool`] converted to domain values; malformed rows are
    /// logged and left out.
    pub async fn list_pool_requests(pool: &PgPool) -> Result<Vec<PoolRequest>, sqlx::Error> {
        let rows = Self::list_pool(pool).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                PoolRequest::try_from(row)
                    .map_err(|e| tracing::warn!(request_id = id, error = %e, "Skipping malformed voting proxy request"))
                    .ok()
            })
            .collect())
    }

    /// Flip the `accepted` subset of `ids` to `confirmed`.
    ///
    /// Returns the ids that actually changed; calling it again is a no-op.
    pub async fn confirm(pool: &PgPool, ids: &[DbId]) -> Result<Vec<DbId>, sqlx::Error> {
        let mut confirmed = sqlx::query_scalar::<_, DbId>(
            "UPDATE voting_proxy_requests SET status_id = $2, updated_at = NOW() \
             WHERE id = ANY($1) AND status_id = $3 AND proxy_id IS NOT NULL \
             RETURNING id",
        )
        .bind(ids)
        .bind(RequestStatus::Confirmed.id())
        .bind(RequestStatus::Accepted.id())
        .fetch_all(pool)
        .await?;
        confirmed.sort_unstable();
        Ok(confirmed)
    }

    /// Those of `ids` for which outreach invited candidates at or after `since`.
    pub async fn canvassed_since(
        pool: &PgPool,
        ids: &[DbId],
        since: Timestamp,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT id FROM voting_proxy_requests \
             WHERE id = ANY($1) AND outreach_invited_at >= $2 \
             ORDER BY id",
        )
        .bind(ids)
        .bind(since)
        .fetch_all(pool)
        .await
    }

    /// Stamp `ids` as served by outreach at `at`. Returns the rows touched.
    pub async fn mark_canvassed(pool: &PgPool, ids: &[DbId], at: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE voting_proxy_requests SET outreach_invited_at = $2 WHERE id = ANY($1)",
        )
        .bind(ids)
        .bind(at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Communes (with their district) that have at least one pending request.
    pub async fn pending_communes(
        pool: &PgPool,
    ) -> Result<Vec<(DbId, Option<String>)>, sqlx::Error> {
        sqlx::query_as::<_, (DbId, Option<String>)>(
            "SELECT DISTINCT c.id, c.district \
             FROM voting_proxy_requests r \
             JOIN communes c ON c.id = r.commune_id \
             WHERE r.status_id = $1 AND r.proxy_id IS NULL \
             ORDER BY c.id",
        )
        .bind(RequestStatus::Created.id())
        .fetch_all(pool)
        .await
    }

    /// Pending requests of the given communes, shaped for the digest.
    pub async fn list_forwardable(
        pool: &PgPool,
        commune_ids: &[DbId],
    ) -> Result<Vec<ForwardableRequestRow>, sqlx::Error> {
        sqlx::query_as::<_, ForwardableRequestRow>(
            "SELECT r.id, r.first_name, r.last_name, r.email, r.contact_phone, \
                    c.name AS commune_name, r.polling_station_number, r.voter_id, r.voting_date \
             FROM voting_proxy_requests r \
             JOIN communes c ON c.id = r.commune_id \
             WHERE r.commune_id = ANY($1) AND r.status_id = $2 AND r.proxy_id IS NULL \
             ORDER BY r.voting_date, c.name, r.last_name, r.id",
        )
        .bind(commune_ids)
        .bind(RequestStatus::Created.id())
        .fetch_all(pool)
        .await
    }
}
