//! Storage seam of the matching engines.
//!
//! [`Registry`] exposes exactly the reads and guarded writes the engines
//! need. [`pg::PgRegistry`] implements it over the repository layer; tests
//! use an in-memory implementation.

pub mod pg;

use async_trait::async_trait;
use chrono::NaiveDate;
use procura_core::forwarding::{CampaignManagerContact, ForwardedRequestRow};
use procura_core::geo::GeoPoint;
use procura_core::matching::{PoolRequest, ProxyProfile};
use procura_core::outreach::{CandidateQuery, OutreachCandidate, ProxyInvitation};
use procura_core::status::{ProxyStatus, RequestStatus};
use procura_core::types::{DbId, Timestamp};
use procura_db::models::person::NewPerson;
use procura_db::models::voting_proxy::UpsertVotingProxy;
use procura_db::models::voting_proxy_request::UpsertVotingProxyRequest;

pub use procura_db::repositories::voting_proxy_repo::AcceptOutcome;

use crate::error::EngineError;

/// Identity and status of a voting proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRecord {
    pub id: DbId,
    pub email: String,
    pub person_id: Option<DbId>,
    pub status: ProxyStatus,
}

/// Status and assignment of a voting proxy request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub id: DbId,
    pub status: RequestStatus,
    pub proxy_id: Option<DbId>,
}

/// What outreach needs to know about a commune.
#[derive(Debug, Clone, PartialEq)]
pub struct CommuneArea {
    pub code: String,
    pub postal_codes: Vec<String>,
    pub centroid: Option<GeoPoint>,
}

#[async_trait]
pub trait Registry: Send + Sync {
    // -- assignment --------------------------------------------------------

    /// `created` or `available` proxies whose `last_matched` is unset or
    /// before `cutoff`.
    async fn matchable_proxies(&self, cutoff: Timestamp) -> Result<Vec<ProxyProfile>, EngineError>;

    /// `created`, unassigned requests.
    async fn pending_requests(&self) -> Result<Vec<PoolRequest>, EngineError>;

    async fn mark_proxy_matched(&self, proxy_id: DbId, at: Timestamp) -> Result<(), EngineError>;

    // -- responses ---------------------------------------------------------

    async fn find_proxy(&self, proxy_id: DbId) -> Result<Option<ProxyRecord>, EngineError>;

    /// Guarded status change; `false` when the proxy is not in `from`.
    async fn set_proxy_status(
        &self,
        proxy_id: DbId,
        from: &[ProxyStatus],
        to: ProxyStatus,
    ) -> Result<bool, EngineError>;

    /// Make the proxy available and assign it whichever of `request_ids`
    /// are still pending, in one transaction.
    async fn accept_requests(
        &self,
        proxy_id: DbId,
        request_ids: &[DbId],
    ) -> Result<AcceptOutcome, EngineError>;

    async fn find_requests(&self, request_ids: &[DbId]) -> Result<Vec<RequestRecord>, EngineError>;

    /// Flip the accepted subset to confirmed; returns the flipped ids.
    async fn confirm_requests(&self, request_ids: &[DbId]) -> Result<Vec<DbId>, EngineError>;

    // -- intake ------------------------------------------------------------

    /// Upsert one row per date; returns `(id, created)` in input order.
    async fn upsert_requests(
        &self,
        inputs: &[UpsertVotingProxyRequest],
    ) -> Result<Vec<(DbId, bool)>, EngineError>;

    async fn upsert_proxy(&self, input: &UpsertVotingProxy) -> Result<(ProxyRecord, bool), EngineError>;

    /// Person with this email, created when unknown. Returns `(id, created)`.
    async fn find_or_create_person(&self, person: &NewPerson) -> Result<(DbId, bool), EngineError>;

    async fn update_person_address(
        &self,
        person_id: DbId,
        address: Option<&str>,
        zip: Option<&str>,
        city: Option<&str>,
    ) -> Result<(), EngineError>;

    // -- outreach ----------------------------------------------------------

    async fn commune_area(&self, commune_id: DbId) -> Result<Option<CommuneArea>, EngineError>;

    async fn consulate_countries(&self, consulate_id: DbId) -> Result<Option<Vec<String>>, EngineError>;

    async fn outreach_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<OutreachCandidate>, EngineError>;

    /// Insert `invited` proxies, skipping emails that already have one.
    async fn create_invitations(&self, invitations: &[ProxyInvitation]) -> Result<Vec<DbId>, EngineError>;

    /// Those of `request_ids` served by outreach at or after `since`.
    async fn recently_canvassed(
        &self,
        request_ids: &[DbId],
        since: Timestamp,
    ) -> Result<Vec<DbId>, EngineError>;

    async fn mark_canvassed(&self, request_ids: &[DbId], at: Timestamp) -> Result<(), EngineError>;

    // -- forwarding --------------------------------------------------------

    /// Communes with pending requests, with their electoral district.
    async fn pending_communes(&self) -> Result<Vec<(DbId, Option<String>)>, EngineError>;

    async fn forwardable_requests(
        &self,
        commune_ids: &[DbId],
    ) -> Result<Vec<ForwardedRequestRow>, EngineError>;

    async fn campaign_manager(&self, district: &str) -> Result<Option<CampaignManagerContact>, EngineError>;

    async fn forwarding_recorded(&self, district: &str, day: NaiveDate) -> Result<bool, EngineError>;

    /// Log the forwarding and flip the still-pending ids to `forwarded`.
    /// `None` when `(district, day)` was already recorded.
    async fn record_forwarding(
        &self,
        district: &str,
        day: NaiveDate,
        manager_email: &str,
        request_ids: &[DbId],
    ) -> Result<Option<Vec<DbId>>, EngineError>;
}
