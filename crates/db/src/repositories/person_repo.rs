//! Repository for the `persons` registry.
//!
//! The registry is owned by another service. The only writes here come from
//! proxy registration: creating the person when the email is unknown, and
//! refreshing their address.

use procura_core::geo::EARTH_RADIUS_M;
use procura_core::outreach::{CandidateArea, CandidateOrder, CandidateQuery};
use procura_core::types::DbId;
use sqlx::PgPool;

use crate::models::person::{CandidateRow, NewPerson, PersonLink};

/// Great-circle distance in meters between the person and `($5, $6)`.
fn haversine_sql() -> String {
    format!(
        "2 * {EARTH_RADIUS_M} * asin(least(1.0, sqrt( \
             power(sin(radians(p.latitude - $5) / 2), 2) \
             + cos(radians($5)) * cos(radians(p.latitude)) \
               * power(sin(radians(p.longitude - $6) / 2), 2))))"
    )
}

/// Lookups over the person registry.
pub struct PersonRepo;

impl PersonRepo {
    /// Find a person by email, case-insensitively.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<PersonLink>, sqlx::Error> {
        sqlx::query_as::<_, PersonLink>(
            "SELECT id, email, latitude, longitude FROM persons WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// Id of the person with this email, creating them first when unknown.
    ///
    /// Returns `(id, created)`.
    pub async fn find_or_create(pool: &PgPool, input: &NewPerson) -> Result<(DbId, bool), sqlx::Error> {
        let inserted: Option<DbId> = sqlx::query_scalar(
            "INSERT INTO persons (email, first_name, last_name, contact_phone) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (lower(email)) WHERE email IS NOT NULL DO NOTHING \
             RETURNING id",
        )
        .bind(&input.email)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.contact_phone)
        .fetch_optional(pool)
        .await?;

        if let Some(id) = inserted {
            return Ok((id, true));
        }
        let existing = Self::find_by_email(pool, &input.email)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        Ok((existing.id, false))
    }

    /// Overwrite the address parts that are `Some`; others keep their value.
    pub async fn update_address(
        pool: &PgPool,
        id: DbId,
        address: Option<&str>,
        zip: Option<&str>,
        city: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE persons SET \
                 location_address1 = COALESCE($2, location_address1), \
                 location_zip = COALESCE($3, location_zip), \
                 location_city = COALESCE($4, location_city), \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(address)
        .bind(zip)
        .bind(city)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// People who could be invited to become a proxy.
    ///
    /// Base eligibility: verified email, campaign supporter with at least one
    /// newsletter, not already a voting proxy, not the requester and not in
    /// `exclude_person_ids`. Area, order and cap come from the query.
    pub async fn outreach_candidates(
        pool: &PgPool,
        query: &CandidateQuery,
    ) -> Result<Vec<CandidateRow>, sqlx::Error> {
        let area_filter = match &query.area {
            CandidateArea::Countries(_) => "p.location_country = ANY($5)".to_string(),
            CandidateArea::Near { .. } => format!(
                "p.latitude IS NOT NULL AND p.longitude IS NOT NULL AND {} <= $7",
                haversine_sql()
            ),
            CandidateArea::Codes { .. } => {
                "(p.location_citycode = $5 OR p.location_zip = ANY($6))".to_string()
            }
        };
        let order_by = match query.order {
            CandidateOrder::Registration => "p.id",
            CandidateOrder::Engagement => "recent_attendance_count DESC, p.id",
        };

        let sql = format!(
            "SELECT p.id AS person_id, p.email, p.first_name, p.last_name, p.contact_phone, \
                    (SELECT COUNT(*) FROM person_event_attendances a \
                     WHERE a.person_id = p.id AND a.event_ended_at >= $1) AS recent_attendance_count \
             FROM persons p \
             WHERE p.email IS NOT NULL \
               AND p.email_verified \
               AND p.is_campaign_supporter \
               AND cardinality(p.newsletters) > 0 \
               AND lower(p.email) <> lower($2) \
               AND NOT (p.id = ANY($3)) \
               AND NOT EXISTS ( \
                   SELECT 1 FROM voting_proxies vp \
                   WHERE vp.person_id = p.id OR lower(vp.email) = lower(p.email)) \
               AND {area_filter} \
             ORDER BY {order_by} \
             LIMIT $4"
        );

        let q = sqlx::query_as::<_, CandidateRow>(&sql)
            .bind(query.attended_since)
            .bind(&query.exclude_email)
            .bind(query.exclude_person_ids.as_slice())
            .bind(query.limit as i64);

        let q = match &query.area {
            CandidateArea::Countries(countries) => q.bind(countries.as_slice()),
            CandidateArea::Near { center, radius_m } => q
                .bind(center.latitude)
                .bind(center.longitude)
                .bind(*radius_m),
            CandidateArea::Codes {
                city_code,
                postal_codes,
            } => q.bind(city_code).bind(postal_codes.as_slice()),
        };

        q.fetch_all(pool).await
    }
}
