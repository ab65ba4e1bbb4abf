//! The matching pass: offer pending requests to available proxies.

use procura_core::matching::{matching_cutoff, sort_for_sweep, MatchingSweep};
use procura_core::notifications::NotificationKind;
use procura_core::types::{DbId, Timestamp};
use procura_events::{Notification, NotificationBus};

use crate::error::EngineError;
use crate::registry::Registry;

/// Sweep matchable proxies against the pending pool and send each proxy
/// its best group of requests.
///
/// The proxy list and the pool are loaded once, at `now`; a failure there
/// aborts the pass. A failure while committing one proxy's offer is logged,
/// the requests are put back in the pool, and the sweep goes on.
///
/// Returns every request id offered, in offer order.
pub async fn run_matching_pass<R: Registry + ?Sized>(
    registry: &R,
    bus: &NotificationBus,
    now: Timestamp,
) -> Result<Vec<DbId>, EngineError> {
    let mut proxies = registry.matchable_proxies(matching_cutoff(now)).await?;
    sort_for_sweep(&mut proxies);
    let pool = registry.pending_requests().await?;

    tracing::info!(
        proxies = proxies.len(),
        requests = pool.len(),
        "Matching pass started"
    );

    let mut sweep = MatchingSweep::new(pool);
    let mut offers = 0usize;

    for proxy in &proxies {
        if sweep.is_exhausted() {
            tracing::debug!("Request pool exhausted, stopping sweep");
            break;
        }

        let group = match sweep.claim_for(proxy) {
            Ok(group) => group,
            Err(no_match) => {
                tracing::debug!(proxy_id = proxy.id, "{no_match}");
                continue;
            }
        };

        if let Err(e) = registry.mark_proxy_matched(proxy.id, now).await {
            tracing::error!(
                proxy_id = proxy.id,
                error = %e,
                "Failed to record matching offer, releasing requests"
            );
            sweep.release(&group.request_ids);
            continue;
        }

        tracing::info!(
            proxy_id = proxy.id,
            request_ids = ?group.request_ids,
            matching_dates = group.matching_date_count,
            polling_station_match = group.polling_station_match,
            "Voting proxy requests offered"
        );
        bus.enqueue(
            Notification::new(NotificationKind::ProxyMatchingOffer, vec![proxy.id]).with_payload(
                serde_json::json!({
                    "request_ids": group.request_ids,
                    "proximity": group.proximity,
                }),
            ),
        );
        offers += 1;
    }

    let offered = sweep.into_offered();
    tracing::info!(
        offers,
        offered_requests = offered.len(),
        "Matching pass finished"
    );
    Ok(offered)
}
