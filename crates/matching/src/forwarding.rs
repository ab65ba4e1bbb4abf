//! Hand-off of requests nobody took to district campaign managers.

use async_trait::async_trait;
use chrono::NaiveDate;
use procura_core::forwarding::{
    build_csv, digest_attachment_name, digest_body, digest_subject, group_communes_by_district,
};
use procura_core::types::DbId;
use procura_events::{DigestEmail, EmailDelivery, EmailError};

use crate::error::EngineError;
use crate::registry::Registry;

/// Sends a digest email. Implemented by [`EmailDelivery`].
#[async_trait]
pub trait DigestMailer: Send + Sync {
    async fn send_digest(&self, digest: &DigestEmail) -> Result<(), EmailError>;
}

#[async_trait]
impl DigestMailer for EmailDelivery {
    async fn send_digest(&self, digest: &DigestEmail) -> Result<(), EmailError> {
        EmailDelivery::send_digest(self, digest).await
    }
}

/// What one forwarding run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardingReport {
    /// Districts whose manager got (or, in a dry run, would get) a digest.
    pub districts: Vec<String>,
    /// Requests now `forwarded`. Always empty in a dry run.
    pub forwarded_request_ids: Vec<DbId>,
    /// Districts skipped: already sent today, or no campaign manager.
    pub skipped_districts: Vec<String>,
    /// Districts whose digest failed; retried on the next run.
    pub failed_districts: Vec<String>,
}

enum DistrictOutcome {
    Sent(Vec<DbId>),
    DryRun,
    Skipped,
}

/// Mail every district's pending commune requests to its campaign manager,
/// then take them out of automatic matching.
///
/// The email goes out first; the requests are flipped to `forwarded` only
/// once it was accepted by the SMTP server, in the same transaction that
/// logs the `(district, today)` forwarding. A district already logged for
/// `today` is skipped, so reruns on the same day send nothing twice.
///
/// Without a mailer the run is dry: digests are built and logged, nothing
/// is sent or changed.
pub async fn forward_pending_requests_to_campaign_managers<R, M>(
    registry: &R,
    mailer: Option<&M>,
    today: NaiveDate,
) -> Result<ForwardingReport, EngineError>
where
    R: Registry + ?Sized,
    M: DigestMailer + ?Sized,
{
    let communes = registry.pending_communes().await?;
    let by_district =
        group_communes_by_district(communes.iter().map(|(id, district)| (*id, district.as_deref())));

    tracing::info!(
        districts = by_district.len(),
        dry_run = mailer.is_none(),
        "Forwarding pending requests to campaign managers"
    );

    let mut report = ForwardingReport::default();
    for (district, commune_ids) in by_district {
        match forward_district(registry, mailer, today, &district, &commune_ids).await {
            Ok(DistrictOutcome::Sent(ids)) => {
                report.forwarded_request_ids.extend(ids);
                report.districts.push(district);
            }
            Ok(DistrictOutcome::DryRun) => report.districts.push(district),
            Ok(DistrictOutcome::Skipped) => report.skipped_districts.push(district),
            Err(e) => {
                tracing::error!(district = %district, error = %e, "Forwarding failed");
                report.failed_districts.push(district);
            }
        }
    }

    report.forwarded_request_ids.sort_unstable();
    Ok(report)
}

async fn forward_district<R, M>(
    registry: &R,
    mailer: Option<&M>,
    today: NaiveDate,
    district: &str,
    commune_ids: &[DbId],
) -> Result<DistrictOutcome, EngineError>
where
    R: Registry + ?Sized,
    M: DigestMailer + ?Sized,
{
    if registry.forwarding_recorded(district, today).await? {
        tracing::debug!(district, "Digest already sent today");
        return Ok(DistrictOutcome::Skipped);
    }

    let Some(manager) = registry.campaign_manager(district).await? else {
        tracing::warn!(district, "No campaign manager for district");
        return Ok(DistrictOutcome::Skipped);
    };

    let rows = registry.forwardable_requests(commune_ids).await?;
    if rows.is_empty() {
        return Ok(DistrictOutcome::Skipped);
    }
    let request_ids: Vec<DbId> = rows.iter().map(|r| r.request_id).collect();

    let digest = DigestEmail {
        to: manager.email.clone(),
        subject: digest_subject(today),
        body: digest_body(&manager.name, district, rows.len()),
        attachment_name: digest_attachment_name(today),
        csv: build_csv(&rows),
    };

    let Some(mailer) = mailer else {
        tracing::info!(
            district,
            manager = %manager.email,
            requests = request_ids.len(),
            csv = %digest.csv,
            "Dry run, digest not sent"
        );
        return Ok(DistrictOutcome::DryRun);
    };

    mailer.send_digest(&digest).await?;

    match registry
        .record_forwarding(district, today, &manager.email, &request_ids)
        .await?
    {
        Some(forwarded) => {
            tracing::info!(
                district,
                manager = %manager.email,
                forwarded = forwarded.len(),
                "Requests forwarded to campaign manager"
            );
            Ok(DistrictOutcome::Sent(forwarded))
        }
        None => {
            tracing::warn!(district, "Forwarding recorded concurrently, statuses left as is");
            Ok(DistrictOutcome::Skipped)
        }
    }
}
