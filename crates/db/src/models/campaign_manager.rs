//! Campaign managers and the forwarding log.

use procura_core::forwarding::CampaignManagerContact;
use procura_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `campaign_managers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CampaignManager {
    pub id: DbId,
    pub district: String,
    pub name: String,
    pub email: String,
    pub created_at: Timestamp,
}

impl From<CampaignManager> for CampaignManagerContact {
    fn from(row: CampaignManager) -> Self {
        CampaignManagerContact {
            district: row.district,
            name: row.name,
            email: row.email,
        }
    }
}

/// A row from the `voting_proxy_request_forwardings` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RequestForwarding {
    pub id: DbId,
    pub district: String,
    pub forwarded_on: chrono::NaiveDate,
    pub manager_email: String,
    pub request_count: i32,
    pub created_at: Timestamp,
}
