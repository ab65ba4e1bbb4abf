//! [`Registry`] over Postgres.

use async_trait::async_trait;
use chrono::NaiveDate;
use procura_core::forwarding::{CampaignManagerContact, ForwardedRequestRow};
use procura_core::matching::{PoolRequest, ProxyProfile};
use procura_core::outreach::{CandidateQuery, OutreachCandidate, ProxyInvitation};
use procura_core::status::ProxyStatus;
use procura_core::types::{DbId, Timestamp};
use procura_db::models::person::NewPerson;
use procura_db::models::voting_proxy::{UpsertVotingProxy, VotingProxy};
use procura_db::models::voting_proxy_request::UpsertVotingProxyRequest;
use procura_db::repositories::{
    CampaignManagerRepo, CommuneRepo, PersonRepo, VotingProxyRepo, VotingProxyRequestRepo,
};
use procura_db::DbPool;

use super::{AcceptOutcome, CommuneArea, ProxyRecord, Registry, RequestRecord};
use crate::error::EngineError;

/// Postgres-backed registry. Cheap to clone.
#[derive(Clone)]
pub struct PgRegistry {
    pool: DbPool,
}

impl PgRegistry {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn proxy_record(row: &VotingProxy) -> Result<ProxyRecord, EngineError> {
    Ok(ProxyRecord {
        id: row.id,
        email: row.email.clone(),
        person_id: row.person_id,
        status: row.status()?,
    })
}

#[async_trait]
impl Registry for PgRegistry {
    async fn matchable_proxies(&self, cutoff: Timestamp) -> Result<Vec<ProxyProfile>, EngineError> {
        Ok(VotingProxyRepo::list_matchable_profiles(&self.pool, cutoff).await?)
    }

    async fn pending_requests(&self) -> Result<Vec<PoolRequest>, EngineError> {
        Ok(VotingProxyRequestRepo::list_pool_requests(&self.pool).await?)
    }

    async fn mark_proxy_matched(&self, proxy_id: DbId, at: Timestamp) -> Result<(), EngineError> {
        if VotingProxyRepo::mark_matched(&self.pool, proxy_id, at).await? {
            Ok(())
        } else {
            Err(EngineError::not_found("voting_proxy", proxy_id))
        }
    }

    async fn find_proxy(&self, proxy_id: DbId) -> Result<Option<ProxyRecord>, EngineError> {
        VotingProxyRepo::find_by_id(&self.pool, proxy_id)
            .await?
            .map(|row| proxy_record(&row))
            .transpose()
    }

    async fn set_proxy_status(
        &self,
        proxy_id: DbId,
        from: &[ProxyStatus],
        to: ProxyStatus,
    ) -> Result<bool, EngineError> {
        Ok(VotingProxyRepo::transition_status(&self.pool, proxy_id, from, to).await?)
    }

    async fn accept_requests(
        &self,
        proxy_id: DbId,
        request_ids: &[DbId],
    ) -> Result<AcceptOutcome, EngineError> {
        Ok(VotingProxyRepo::accept_requests(&self.pool, proxy_id, request_ids).await?)
    }

    async fn find_requests(&self, request_ids: &[DbId]) -> Result<Vec<RequestRecord>, EngineError> {
        VotingProxyRequestRepo::find_by_ids(&self.pool, request_ids)
            .await?
            .into_iter()
            .map(|row| {
                Ok(RequestRecord {
                    id: row.id,
                    status: row.status()?,
                    proxy_id: row.proxy_id,
                })
            })
            .collect()
    }

    async fn confirm_requests(&self, request_ids: &[DbId]) -> Result<Vec<DbId>, EngineError> {
        Ok(VotingProxyRequestRepo::confirm(&self.pool, request_ids).await?)
    }

    async fn upsert_requests(
        &self,
        inputs: &[UpsertVotingProxyRequest],
    ) -> Result<Vec<(DbId, bool)>, EngineError> {
        let rows = VotingProxyRequestRepo::upsert_dates(&self.pool, inputs).await?;
        Ok(rows.into_iter().map(|r| (r.request.id, r.created)).collect())
    }

    async fn upsert_proxy(&self, input: &UpsertVotingProxy) -> Result<(ProxyRecord, bool), EngineError> {
        let (row, created) = VotingProxyRepo::upsert_registration(&self.pool, input).await?;
        Ok((proxy_record(&row)?, created))
    }

    async fn find_or_create_person(&self, person: &NewPerson) -> Result<(DbId, bool), EngineError> {
        Ok(PersonRepo::find_or_create(&self.pool, person).await?)
    }

    async fn update_person_address(
        &self,
        person_id: DbId,
        address: Option<&str>,
        zip: Option<&str>,
        city: Option<&str>,
    ) -> Result<(), EngineError> {
        PersonRepo::update_address(&self.pool, person_id, address, zip, city).await?;
        Ok(())
    }

    async fn commune_area(&self, commune_id: DbId) -> Result<Option<CommuneArea>, EngineError> {
        Ok(CommuneRepo::find_commune(&self.pool, commune_id)
            .await?
            .map(|commune| CommuneArea {
                centroid: commune.centroid(),
                code: commune.code,
                postal_codes: commune.postal_codes,
            }))
    }

    async fn consulate_countries(&self, consulate_id: DbId) -> Result<Option<Vec<String>>, EngineError> {
        Ok(CommuneRepo::find_consulate(&self.pool, consulate_id)
            .await?
            .map(|consulate| consulate.countries))
    }

    async fn outreach_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<OutreachCandidate>, EngineError> {
        let rows = PersonRepo::outreach_candidates(&self.pool, query).await?;
        Ok(rows.into_iter().map(OutreachCandidate::from).collect())
    }

    async fn create_invitations(&self, invitations: &[ProxyInvitation]) -> Result<Vec<DbId>, EngineError> {
        Ok(VotingProxyRepo::insert_invitations(&self.pool, invitations).await?)
    }

    async fn recently_canvassed(
        &self,
        request_ids: &[DbId],
        since: Timestamp,
    ) -> Result<Vec<DbId>, EngineError> {
        Ok(VotingProxyRequestRepo::canvassed_since(&self.pool, request_ids, since).await?)
    }

    async fn mark_canvassed(&self, request_ids: &[DbId], at: Timestamp) -> Result<(), EngineError> {
        let marked = VotingProxyRequestRepo::mark_canvassed(&self.pool, request_ids, at).await?;
        tracing::debug!(marked, "Requests stamped as canvassed");
        Ok(())
    }

    async fn pending_communes(&self) -> Result<Vec<(DbId, Option<String>)>, EngineError> {
        Ok(VotingProxyRequestRepo::pending_communes(&self.pool).await?)
    }

    async fn forwardable_requests(
        &self,
        commune_ids: &[DbId],
    ) -> Result<Vec<ForwardedRequestRow>, EngineError> {
        let rows = VotingProxyRequestRepo::list_forwardable(&self.pool, commune_ids).await?;
        Ok(rows.into_iter().map(ForwardedRequestRow::from).collect())
    }

    async fn campaign_manager(&self, district: &str) -> Result<Option<CampaignManagerContact>, EngineError> {
        Ok(CampaignManagerRepo::find_by_district(&self.pool, district)
            .await?
            .map(CampaignManagerContact::from))
    }

    async fn forwarding_recorded(&self, district: &str, day: NaiveDate) -> Result<bool, EngineError> {
        Ok(CampaignManagerRepo::find_forwarding(&self.pool, district, day)
            .await?
            .is_some())
    }

    async fn record_forwarding(
        &self,
        district: &str,
        day: NaiveDate,
        manager_email: &str,
        request_ids: &[DbId],
    ) -> Result<Option<Vec<DbId>>, EngineError> {
        Ok(CampaignManagerRepo::record_forwarding(&self.pool, district, day, manager_email, request_ids).await?)
    }
}
