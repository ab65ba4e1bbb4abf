//! Voting proxy request rows and DTOs.

use procura_core::error::CoreError;
use procura_core::forwarding::ForwardedRequestRow;
use procura_core::geo::GeoPoint;
use procura_core::jurisdiction::Jurisdiction;
use procura_core::matching::PoolRequest;
use procura_core::status::{RequestStatus, StatusId};
use procura_core::types::{DbId, Timestamp, VotingDate};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `voting_proxy_requests` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VotingProxyRequest {
    pub id: DbId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub contact_phone: String,
    pub voting_date: VotingDate,
    pub commune_id: Option<DbId>,
    pub consulate_id: Option<DbId>,
    pub polling_station_number: Option<String>,
    pub voter_id: Option<String>,
    pub status_id: StatusId,
    pub proxy_id: Option<DbId>,
    pub outreach_invited_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl VotingProxyRequest {
    pub fn status(&self) -> Result<RequestStatus, CoreError> {
        RequestStatus::try_from(self.status_id)
    }
}

/// Result of an upsert: the row and whether it was inserted.
#[derive(Debug, Clone, FromRow)]
pub struct UpsertedRequest {
    #[sqlx(flatten)]
    pub request: VotingProxyRequest,
    pub created: bool,
}

/// DTO for one date of a request registration. Keyed by (email, date).
#[derive(Debug, Clone)]
pub struct UpsertVotingProxyRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub contact_phone: String,
    pub voting_date: VotingDate,
    pub jurisdiction: Jurisdiction,
    pub polling_station_number: Option<String>,
    pub voter_id: Option<String>,
}

/// An unassigned request joined with its commune's town-hall location.
#[derive(Debug, Clone, FromRow)]
pub struct PoolRequestRow {
    pub id: DbId,
    pub email: String,
    pub voting_date: VotingDate,
    pub status_id: StatusId,
    pub proxy_id: Option<DbId>,
    pub commune_id: Option<DbId>,
    pub consulate_id: Option<DbId>,
    pub polling_station_number: Option<String>,
    pub commune_latitude: Option<f64>,
    pub commune_longitude: Option<f64>,
}

impl TryFrom<PoolRequestRow> for PoolRequest {
    type Error = CoreError;

    fn try_from(row: PoolRequestRow) -> Result<Self, Self::Error> {
        Ok(PoolRequest {
            id: row.id,
            status: RequestStatus::try_from(row.status_id)?,
            jurisdiction: Jurisdiction::require(row.commune_id, row.consulate_id)?,
            commune_centroid: GeoPoint::from_columns(row.commune_latitude, row.commune_longitude),
            email: row.email,
            voting_date: row.voting_date,
            proxy_id: row.proxy_id,
            polling_station_number: row.polling_station_number,
        })
    }
}

/// A pending request as it appears in a campaign-manager digest.
#[derive(Debug, Clone, FromRow)]
pub struct ForwardableRequestRow {
    pub id: DbId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub contact_phone: String,
    pub commune_name: Option<String>,
    pub polling_station_number: Option<String>,
    pub voter_id: Option<String>,
    pub voting_date: VotingDate,
}

impl From<ForwardableRequestRow> for ForwardedRequestRow {
    fn from(row: ForwardableRequestRow) -> Self {
        ForwardedRequestRow {
            request_id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            contact_phone: Some(row.contact_phone).filter(|p| !p.is_empty()),
            commune_name: row.commune_name,
            polling_station_number: row.polling_station_number,
            voter_id: row.voter_id,
            voting_date: row.voting_date,
        }
    }
}
