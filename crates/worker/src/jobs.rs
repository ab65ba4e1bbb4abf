//! The worker's periodic jobs.
//!
//! Each job owns its interval and runs until its [`CancellationToken`] is
//! cancelled. A pass is awaited before the next tick is taken, so passes of
//! the same job never overlap.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use procura_events::{EmailDelivery, NotificationBus};
use procura_matching::assignment::run_matching_pass;
use procura_matching::forwarding::forward_pending_requests_to_campaign_managers;
use procura_matching::outreach::run_outreach_pass;
use procura_matching::{EngineError, PgRegistry};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// MatchingJob
// ---------------------------------------------------------------------------

/// Matching pass followed, when enabled, by outreach on the requests it
/// could not offer.
pub struct MatchingJob {
    registry: PgRegistry,
    bus: Arc<NotificationBus>,
    interval: Duration,
    outreach_enabled: bool,
}

impl MatchingJob {
    pub fn new(
        registry: PgRegistry,
        bus: Arc<NotificationBus>,
        interval: Duration,
        outreach_enabled: bool,
    ) -> Self {
        Self {
            registry,
            bus,
            interval,
            outreach_enabled,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            outreach = self.outreach_enabled,
            "Matching job started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Matching job stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "Matching cycle failed");
                    }
                }
            }
        }
    }

    async fn run_once(&self) -> Result<(), EngineError> {
        let now = Utc::now();
        let offered = run_matching_pass(&self.registry, &self.bus, now).await?;

        if self.outreach_enabled {
            let report = run_outreach_pass(&self.registry, &self.bus, &offered, now).await?;
            tracing::debug!(
                invited = report.invited_proxy_ids.len(),
                requests = report.possibly_fulfilled_request_ids.len(),
                "Outreach cycle done"
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ForwardingJob
// ---------------------------------------------------------------------------

/// Daily digest of unmatched requests to district campaign managers.
pub struct ForwardingJob {
    registry: PgRegistry,
    /// `None` runs the job dry.
    mailer: Option<EmailDelivery>,
    interval: Duration,
}

impl ForwardingJob {
    pub fn new(registry: PgRegistry, mailer: Option<EmailDelivery>, interval: Duration) -> Self {
        Self {
            registry,
            mailer,
            interval,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            dry_run = self.mailer.is_none(),
            "Forwarding job started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Forwarding job stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let today = Utc::now().date_naive();
                    match forward_pending_requests_to_campaign_managers(
                        &self.registry,
                        self.mailer.as_ref(),
                        today,
                    )
                    .await
                    {
                        Ok(report) => tracing::info!(
                            districts = report.districts.len(),
                            forwarded = report.forwarded_request_ids.len(),
                            skipped = report.skipped_districts.len(),
                            failed = report.failed_districts.len(),
                            "Forwarding cycle done"
                        ),
                        Err(e) => tracing::error!(error = %e, "Forwarding cycle failed"),
                    }
                }
            }
        }
    }
}
