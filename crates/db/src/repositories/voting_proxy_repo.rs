//! Repository for the `voting_proxies` table.

use procura_core::matching::ProxyProfile;
use procura_core::outreach::ProxyInvitation;
use procura_core::status::{ProxyStatus, RequestStatus, StatusId};
use procura_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::voting_proxy::{MatchableProxyRow, UpsertVotingProxy, VotingProxy};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, person_id, email, first_name, last_name, contact_phone, \
                       date_of_birth, voting_dates, commune_id, consulate_id, \
                       polling_station_number, status_id, last_matched, created_at, updated_at";

/// Outcome of [`VotingProxyRepo::accept_requests`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The proxy was not in an accepting status; nothing changed.
    ProxyNotAccepting,
    /// The proxy is now available; these requests were assigned to it.
    Accepted(Vec<DbId>),
}

/// Provides reads and state changes for voting proxies.
pub struct VotingProxyRepo;

impl VotingProxyRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<VotingProxy>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM voting_proxies WHERE id = $1");
        sqlx::query_as::<_, VotingProxy>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Option<VotingProxy>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM voting_proxies WHERE email = $1");
        sqlx::query_as::<_, VotingProxy>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Proxies eligible for a matching pass started at a time whose throttle
    /// cutoff is `cutoff`.
    ///
    /// Rows come back most available dates first, then oldest first; callers
    /// still re-sort after conversion since duplicate dates are not collapsed
    /// here.
    pub async fn list_matchable(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<Vec<MatchableProxyRow>, sqlx::Error> {
        let statuses: Vec<StatusId> = ProxyStatus::MATCHABLE.iter().map(|s| s.id()).collect();
        sqlx::query_as::<_, MatchableProxyRow>(
            "SELECT vp.id, vp.email, vp.voting_dates, vp.commune_id, vp.consulate_id, \
                    vp.polling_station_number, \
                    p.latitude AS person_latitude, p.longitude AS person_longitude \
             FROM voting_proxies vp \
             LEFT JOIN persons p ON p.id = vp.person_id \
             WHERE vp.status_id = ANY($1) \
               AND (vp.last_matched IS NULL OR vp.last_matched < $2) \
             ORDER BY cardinality(vp.voting_dates) DESC, vp.id",
        )
        .bind(&statuses)
        .bind(cutoff)
        .fetch_all(pool)
        .await
    }

    /// Convenience wrapper returning domain profiles; rows violating the
    /// jurisdiction invariant are skipped with a warning.
    pub async fn list_matchable_profiles(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<Vec<ProxyProfile>, sqlx::Error> {
        let rows = Self::list_matchable(pool, cutoff).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                ProxyProfile::try_from(row)
                    .map_err(|e| tracing::warn!(proxy_id = id, error = %e, "Skipping malformed voting proxy"))
                    .ok()
            })
            .collect())
    }

    /// Record that the proxy received an offer at `at`.
    pub async fn mark_matched(pool: &PgPool, id: DbId, at: Timestamp) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE voting_proxies SET last_matched = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move the proxy to `to` if its current status is one of `from`.
    ///
    /// Returns `false` when the guard did not hold (or the row is missing).
    pub async fn transition_status(
        pool: &PgPool,
        id: DbId,
        from: &[ProxyStatus],
        to: ProxyStatus,
    ) -> Result<bool, sqlx::Error> {
        let from: Vec<StatusId> = from.iter().map(|s| s.id()).collect();
        let result = sqlx::query(
            "UPDATE voting_proxies SET status_id = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id = ANY($2)",
        )
        .bind(id)
        .bind(&from)
        .bind(to.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Insert or update a registration keyed on email.
    ///
    /// An `invited` row becomes `created`; other statuses are preserved.
    /// Returns the row and whether it was inserted.
    pub async fn upsert_registration(
        pool: &PgPool,
        input: &UpsertVotingProxy,
    ) -> Result<(VotingProxy, bool), sqlx::Error> {
        let (commune_id, consulate_id) = input.jurisdiction.into_parts();
        let query = format!(
            "INSERT INTO voting_proxies \
                 (person_id, email, first_name, last_name, contact_phone, date_of_birth, \
                  voting_dates, commune_id, consulate_id, polling_station_number, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (email) DO UPDATE SET \
                 person_id = COALESCE(EXCLUDED.person_id, voting_proxies.person_id), \
                 first_name = EXCLUDED.first_name, \
                 last_name = EXCLUDED.last_name, \
                 contact_phone = EXCLUDED.contact_phone, \
                 date_of_birth = COALESCE(EXCLUDED.date_of_birth, voting_proxies.date_of_birth), \
                 voting_dates = EXCLUDED.voting_dates, \
                 commune_id = EXCLUDED.commune_id, \
                 consulate_id = EXCLUDED.consulate_id, \
                 polling_station_number = EXCLUDED.polling_station_number, \
                 status_id = CASE WHEN voting_proxies.status_id = $12 THEN $11 \
                                  ELSE voting_proxies.status_id END, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}, (xmax = 0) AS created"
        );
        let row = sqlx::query_as::<_, UpsertedProxy>(&query)
            .bind(input.person_id)
            .bind(&input.email)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.contact_phone)
            .bind(input.date_of_birth)
            .bind(&input.voting_dates)
            .bind(commune_id)
            .bind(consulate_id)
            .bind(&input.polling_station_number)
            .bind(ProxyStatus::Created.id())
            .bind(ProxyStatus::Invited.id())
            .fetch_one(pool)
            .await?;
        Ok((row.proxy, row.created))
    }

    /// Create `invited` proxies, ignoring emails that already have one.
    ///
    /// Returns the ids of the rows actually inserted.
    pub async fn insert_invitations(
        pool: &PgPool,
        invitations: &[ProxyInvitation],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut created = Vec::with_capacity(invitations.len());

        for invitation in invitations {
            let id = sqlx::query_scalar::<_, DbId>(
                "INSERT INTO voting_proxies \
                     (person_id, email, first_name, last_name, contact_phone, status_id) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (email) DO NOTHING \
                 RETURNING id",
            )
            .bind(invitation.person_id)
            .bind(&invitation.email)
            .bind(&invitation.first_name)
            .bind(&invitation.last_name)
            .bind(&invitation.contact_phone)
            .bind(ProxyStatus::Invited.id())
            .fetch_optional(&mut *tx)
            .await?;
            created.extend(id);
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Make the proxy available and assign it the given requests.
    ///
    /// Runs in one transaction. A request is assigned only if it is still
    /// `created` and unassigned, was not filed by the proxy itself, and falls
    /// on a date the proxy does not already hold a request for. When several
    /// ids share a date only the lowest is taken.
    pub async fn accept_requests(
        pool: &PgPool,
        proxy_id: DbId,
        request_ids: &[DbId],
    ) -> Result<AcceptOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let from: Vec<StatusId> = ProxyStatus::MATCHABLE.iter().map(|s| s.id()).collect();

        let proxy_email = sqlx::query_scalar::<_, String>(
            "UPDATE voting_proxies SET status_id = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id = ANY($2) \
             RETURNING email",
        )
        .bind(proxy_id)
        .bind(&from)
        .bind(ProxyStatus::Available.id())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(proxy_email) = proxy_email else {
            tx.rollback().await?;
            return Ok(AcceptOutcome::ProxyNotAccepting);
        };

        let mut accepted = sqlx::query_scalar::<_, DbId>(
            "UPDATE voting_proxy_requests r \
             SET status_id = $4, proxy_id = $1, updated_at = NOW() \
             WHERE r.id IN ( \
                 SELECT DISTINCT ON (c.voting_date) c.id \
                 FROM voting_proxy_requests c \
                 WHERE c.id = ANY($2) \
                   AND c.status_id = $5 \
                   AND c.proxy_id IS NULL \
                   AND lower(c.email) <> lower($3) \
                   AND NOT EXISTS ( \
                       SELECT 1 FROM voting_proxy_requests held \
                       WHERE held.proxy_id = $1 AND held.voting_date = c.voting_date) \
                 ORDER BY c.voting_date, c.id) \
               AND r.status_id = $5 AND r.proxy_id IS NULL \
             RETURNING r.id",
        )
        .bind(proxy_id)
        .bind(request_ids)
        .bind(&proxy_email)
        .bind(RequestStatus::Accepted.id())
        .bind(RequestStatus::Created.id())
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        accepted.sort_unstable();
        Ok(AcceptOutcome::Accepted(accepted))
    }
}

#[derive(sqlx::FromRow)]
struct UpsertedProxy {
    #[sqlx(flatten)]
    proxy: VotingProxy,
    created: bool,
}
