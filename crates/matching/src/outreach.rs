//! Recruitment of new proxies for requests the matching pass left over.

use std::collections::HashSet;

use procura_core::jurisdiction::Jurisdiction;
use procura_core::matching::PoolRequest;
use procura_core::notifications::NotificationKind;
use procura_core::outreach::{
    attendance_cutoff, cluster_requests, outreach_cooldown_cutoff, rank_candidates,
    CandidateArea, CandidateOrder, CandidateQuery, ProxyInvitation, RequestCluster,
    PER_REQUEST_INVITATION_LIMIT,
};
use procura_core::types::{DbId, Timestamp};
use procura_events::{Notification, NotificationBus};

use crate::error::EngineError;
use crate::registry::Registry;

/// Outcome of an outreach run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutreachReport {
    /// Ids of the `invited` proxies created.
    pub invited_proxy_ids: Vec<DbId>,
    /// Requests of clusters for which at least one person was invited.
    pub possibly_fulfilled_request_ids: Vec<DbId>,
}

/// Where to look for candidates for a cluster, or `None` when the
/// jurisdiction is unknown.
async fn search_area<R: Registry + ?Sized>(
    registry: &R,
    cluster: &RequestCluster,
) -> Result<Option<(CandidateArea, CandidateOrder)>, EngineError> {
    Ok(match cluster.jurisdiction {
        Jurisdiction::Consulate(consulate_id) => registry
            .consulate_countries(consulate_id)
            .await?
            .map(|countries| (CandidateArea::Countries(countries), CandidateOrder::Registration)),
        Jurisdiction::Commune(commune_id) => registry.commune_area(commune_id).await?.map(|area| {
            (
                CandidateArea::for_commune(area.centroid, &area.code, &area.postal_codes),
                CandidateOrder::Engagement,
            )
        }),
    })
}

/// Invite people to become proxies for the unassigned requests among
/// `requests`.
///
/// Requests are clustered per requester and jurisdiction; each cluster
/// invites at most [`PER_REQUEST_INVITATION_LIMIT`] people, and nobody is
/// picked twice in a run. A cluster whose jurisdiction cannot be resolved,
/// or whose candidate lookup fails, is skipped. So is a cluster holding a
/// request already served by outreach within the last
/// [`OUTREACH_COOLDOWN_DAYS`](procura_core::outreach::OUTREACH_COOLDOWN_DAYS).
/// Served requests are stamped with `now`; their statuses are not changed.
pub async fn find_candidates_for_requests<R: Registry + ?Sized>(
    registry: &R,
    bus: &NotificationBus,
    requests: &[PoolRequest],
    now: Timestamp,
) -> Result<OutreachReport, EngineError> {
    let clusters = cluster_requests(requests);
    let attended_since = attendance_cutoff(now);

    let clustered: Vec<DbId> = clusters
        .iter()
        .flat_map(|c| c.request_ids.iter().copied())
        .collect();
    let cooling: HashSet<DbId> = if clustered.is_empty() {
        HashSet::new()
    } else {
        registry
            .recently_canvassed(&clustered, outreach_cooldown_cutoff(now))
            .await?
            .into_iter()
            .collect()
    };

    let mut picked: Vec<DbId> = Vec::new();
    let mut invitations: Vec<ProxyInvitation> = Vec::new();
    let mut possibly_fulfilled: Vec<DbId> = Vec::new();

    for cluster in &clusters {
        if cluster.request_ids.iter().any(|id| cooling.contains(id)) {
            tracing::debug!(
                jurisdiction = ?cluster.jurisdiction,
                email = %cluster.email,
                "Cluster canvassed recently, skipping outreach"
            );
            continue;
        }

        let (area, order) = match search_area(registry, cluster).await {
            Ok(Some(found)) => found,
            Ok(None) => {
                tracing::warn!(
                    jurisdiction = ?cluster.jurisdiction,
                    "Unknown jurisdiction, skipping outreach for cluster"
                );
                continue;
            }
            Err(e) => {
                tracing::error!(
                    jurisdiction = ?cluster.jurisdiction,
                    error = %e,
                    "Failed to resolve outreach area"
                );
                continue;
            }
        };

        let query = CandidateQuery {
            area,
            exclude_email: cluster.email.clone(),
            exclude_person_ids: picked.clone(),
            order,
            attended_since,
            limit: PER_REQUEST_INVITATION_LIMIT,
        };

        let mut candidates = match registry.outreach_candidates(&query).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!(
                    jurisdiction = ?cluster.jurisdiction,
                    error = %e,
                    "Outreach candidate lookup failed"
                );
                continue;
            }
        };
        rank_candidates(&mut candidates, order, PER_REQUEST_INVITATION_LIMIT);

        if candidates.is_empty() {
            tracing::debug!(jurisdiction = ?cluster.jurisdiction, "No outreach candidate found");
            continue;
        }

        tracing::debug!(
            jurisdiction = ?cluster.jurisdiction,
            candidates = candidates.len(),
            "Outreach candidates found"
        );
        picked.extend(candidates.iter().map(|c| c.person_id));
        invitations.extend(candidates.iter().map(ProxyInvitation::from));
        possibly_fulfilled.extend_from_slice(&cluster.request_ids);
    }

    if invitations.is_empty() {
        tracing::info!(
            clusters = clusters.len(),
            cooling = cooling.len(),
            "Outreach found nobody to invite"
        );
        return Ok(OutreachReport::default());
    }

    let invited_proxy_ids = registry.create_invitations(&invitations).await?;
    registry.mark_canvassed(&possibly_fulfilled, now).await?;
    tracing::info!(
        clusters = clusters.len(),
        invited = invited_proxy_ids.len(),
        requests = possibly_fulfilled.len(),
        "Voting proxy candidates invited"
    );

    if !invited_proxy_ids.is_empty() {
        bus.enqueue(Notification::new(
            NotificationKind::CandidateInvitationEmail,
            invited_proxy_ids.clone(),
        ));
    }

    Ok(OutreachReport {
        invited_proxy_ids,
        possibly_fulfilled_request_ids: possibly_fulfilled,
    })
}

/// Reload the pending pool and run outreach on what `offered` left out.
pub async fn run_outreach_pass<R: Registry + ?Sized>(
    registry: &R,
    bus: &NotificationBus,
    offered: &[DbId],
    now: Timestamp,
) -> Result<OutreachReport, EngineError> {
    let offered: HashSet<DbId> = offered.iter().copied().collect();
    let leftover: Vec<PoolRequest> = registry
        .pending_requests()
        .await?
        .into_iter()
        .filter(|r| !offered.contains(&r.id))
        .collect();
    find_candidates_for_requests(registry, bus, &leftover, now).await
}
