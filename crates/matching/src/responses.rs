//! A proxy's answer to an offer, and the requester's confirmation.
//!
//! Status changes are validated against the state machines in
//! `procura_core::status` first, then applied through guarded updates so a
//! concurrent answer cannot double-assign a request.

use procura_core::error::CoreError;
use procura_core::notifications::NotificationKind;
use procura_core::status::{ProxyStatus, RequestStatus};
use procura_core::types::DbId;
use procura_events::{Notification, NotificationBus};

use crate::error::EngineError;
use crate::registry::{AcceptOutcome, ProxyRecord, Registry};

async fn load_proxy<R: Registry + ?Sized>(
    registry: &R,
    proxy_id: DbId,
) -> Result<ProxyRecord, EngineError> {
    registry
        .find_proxy(proxy_id)
        .await?
        .ok_or_else(|| EngineError::not_found("voting_proxy", proxy_id))
}

/// The proxy accepts some of the requests it was offered.
///
/// The proxy becomes `available`. Each request still `created` and
/// unassigned becomes `accepted` by this proxy; the others are skipped, as
/// are requests on a date the proxy already covers. Returns the ids that
/// were accepted and notifies their requesters.
pub async fn accept_voting_proxy_requests<R: Registry + ?Sized>(
    registry: &R,
    bus: &NotificationBus,
    proxy_id: DbId,
    request_ids: &[DbId],
) -> Result<Vec<DbId>, EngineError> {
    let proxy = load_proxy(registry, proxy_id).await?;
    proxy.status.validate_transition(ProxyStatus::Available)?;

    let acceptable: Vec<DbId> = registry
        .find_requests(request_ids)
        .await?
        .into_iter()
        .filter(|r| r.proxy_id.is_none() && r.status.can_transition(RequestStatus::Accepted))
        .map(|r| r.id)
        .collect();

    let accepted = match registry.accept_requests(proxy_id, &acceptable).await? {
        AcceptOutcome::Accepted(ids) => ids,
        AcceptOutcome::ProxyNotAccepting => {
            return Err(CoreError::Conflict(format!(
                "Voting proxy {proxy_id} changed status while accepting requests"
            ))
            .into());
        }
    };

    let skipped = request_ids.len().saturating_sub(accepted.len());
    tracing::info!(
        proxy_id,
        accepted = ?accepted,
        skipped,
        "Voting proxy accepted requests"
    );

    if !accepted.is_empty() {
        bus.enqueue(Notification::new(
            NotificationKind::ProxyAcceptanceSms,
            accepted.clone(),
        ));
    }
    Ok(accepted)
}

/// The proxy declines the offer and becomes `unavailable`.
///
/// The offered requests are left untouched; they stay in the pool for the
/// next pass.
pub async fn decline_voting_proxy_requests<R: Registry + ?Sized>(
    registry: &R,
    proxy_id: DbId,
) -> Result<(), EngineError> {
    let proxy = load_proxy(registry, proxy_id).await?;
    proxy.status.validate_transition(ProxyStatus::Unavailable)?;

    let changed = registry
        .set_proxy_status(proxy_id, &ProxyStatus::MATCHABLE, ProxyStatus::Unavailable)
        .await?;
    if !changed {
        return Err(CoreError::Conflict(format!(
            "Voting proxy {proxy_id} changed status while declining"
        ))
        .into());
    }

    tracing::info!(proxy_id, "Voting proxy declined requests");
    Ok(())
}

/// Mark accepted requests as confirmed by their requester.
///
/// Ids that are not `accepted` are ignored, so calling this twice is
/// harmless. Returns the ids that changed.
pub async fn confirm_voting_proxy_requests<R: Registry + ?Sized>(
    registry: &R,
    bus: &NotificationBus,
    request_ids: &[DbId],
) -> Result<Vec<DbId>, EngineError> {
    let confirmable: Vec<DbId> = registry
        .find_requests(request_ids)
        .await?
        .into_iter()
        .filter(|r| r.status.can_transition(RequestStatus::Confirmed))
        .map(|r| r.id)
        .collect();

    if confirmable.is_empty() {
        tracing::debug!(request_ids = ?request_ids, "Nothing to confirm");
        return Ok(Vec::new());
    }

    let confirmed = registry.confirm_requests(&confirmable).await?;
    tracing::info!(confirmed = ?confirmed, "Voting proxy requests confirmed");

    if !confirmed.is_empty() {
        bus.enqueue(Notification::new(
            NotificationKind::RequestConfirmedSms,
            confirmed.clone(),
        ));
    }
    Ok(confirmed)
}
