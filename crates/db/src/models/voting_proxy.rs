//! Voting proxy rows and DTOs.

use procura_core::error::CoreError;
use procura_core::geo::GeoPoint;
use procura_core::jurisdiction::Jurisdiction;
use procura_core::matching::ProxyProfile;
use procura_core::status::{ProxyStatus, StatusId};
use procura_core::types::{DbId, Timestamp, VotingDate};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `voting_proxies` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VotingProxy {
    pub id: DbId,
    pub person_id: Option<DbId>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub contact_phone: String,
    pub date_of_birth: Option<chrono::NaiveDate>,
    pub voting_dates: Vec<VotingDate>,
    pub commune_id: Option<DbId>,
    pub consulate_id: Option<DbId>,
    pub polling_station_number: Option<String>,
    pub status_id: StatusId,
    pub last_matched: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl VotingProxy {
    pub fn status(&self) -> Result<ProxyStatus, CoreError> {
        ProxyStatus::try_from(self.status_id)
    }

    pub fn jurisdiction(&self) -> Result<Option<Jurisdiction>, CoreError> {
        Jurisdiction::from_parts(self.commune_id, self.consulate_id)
    }
}

/// DTO for the registration upsert. Keyed by email.
#[derive(Debug, Clone)]
pub struct UpsertVotingProxy {
    pub person_id: Option<DbId>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub contact_phone: String,
    pub date_of_birth: Option<chrono::NaiveDate>,
    pub voting_dates: Vec<VotingDate>,
    pub jurisdiction: Jurisdiction,
    pub polling_station_number: Option<String>,
}

/// A matchable proxy joined with its person's coordinates.
#[derive(Debug, Clone, FromRow)]
pub struct MatchableProxyRow {
    pub id: DbId,
    pub email: String,
    pub voting_dates: Vec<VotingDate>,
    pub commune_id: Option<DbId>,
    pub consulate_id: Option<DbId>,
    pub polling_station_number: Option<String>,
    pub person_latitude: Option<f64>,
    pub person_longitude: Option<f64>,
}

impl TryFrom<MatchableProxyRow> for ProxyProfile {
    type Error = CoreError;

    fn try_from(row: MatchableProxyRow) -> Result<Self, Self::Error> {
        Ok(ProxyProfile {
            id: row.id,
            jurisdiction: Jurisdiction::require(row.commune_id, row.consulate_id)?,
            coordinates: GeoPoint::from_columns(row.person_latitude, row.person_longitude),
            email: row.email,
            voting_dates: row.voting_dates,
            polling_station_number: row.polling_station_number,
        })
    }
}
