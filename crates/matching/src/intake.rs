//! Registration of requests and proxies.

use procura_core::intake::{VotingProxyInput, VotingProxyRequestInput};
use procura_core::jurisdiction::Jurisdiction;
use procura_core::notifications::NotificationKind;
use procura_core::status::ProxyStatus;
use procura_core::types::{DbId, VotingDate};
use procura_db::models::person::NewPerson;
use procura_db::models::voting_proxy::UpsertVotingProxy;
use procura_db::models::voting_proxy_request::UpsertVotingProxyRequest;
use procura_events::{Notification, NotificationBus};
use serde::Serialize;

use crate::error::EngineError;
use crate::registry::Registry;

/// Result of [`create_or_update_voting_proxy_request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestRegistration {
    pub email: String,
    pub voting_dates: Vec<VotingDate>,
    /// One id per date, in date order.
    pub request_ids: Vec<DbId>,
    /// Whether at least one of the dates was already registered.
    pub updated: bool,
}

/// Result of [`create_or_update_voting_proxy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyRegistration {
    pub id: DbId,
    pub email: String,
    pub person_id: DbId,
    #[serde(serialize_with = "serialize_status")]
    pub status: ProxyStatus,
    pub updated: bool,
}

fn serialize_status<S: serde::Serializer>(status: &ProxyStatus, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(status.name())
}

/// Register a voter's request, one row per voting date.
///
/// Rows are keyed on `(email, voting_date)`, so resubmitting the same form
/// refreshes the existing rows instead of duplicating them. The requester
/// gets a confirmation for every upserted row.
pub async fn create_or_update_voting_proxy_request<R: Registry + ?Sized>(
    registry: &R,
    bus: &NotificationBus,
    input: &VotingProxyRequestInput,
) -> Result<RequestRegistration, EngineError> {
    let input = input.normalized();
    let jurisdiction = input.validated()?;
    let email = input.email.clone();
    let voting_dates = input.distinct_dates();

    let rows: Vec<UpsertVotingProxyRequest> = voting_dates
        .iter()
        .map(|&voting_date| UpsertVotingProxyRequest {
            email: email.clone(),
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            contact_phone: input.contact_phone.clone(),
            voting_date,
            jurisdiction,
            polling_station_number: input.polling_station_number.clone(),
            voter_id: input.voter_id.clone(),
        })
        .collect();

    let upserted = registry.upsert_requests(&rows).await?;
    let updated = upserted.iter().any(|(_, created)| !created);
    let request_ids: Vec<DbId> = upserted.into_iter().map(|(id, _)| id).collect();

    tracing::info!(
        email = %email,
        request_ids = ?request_ids,
        updated,
        "Voting proxy request registered"
    );
    bus.enqueue(Notification::new(
        NotificationKind::RequestConfirmation,
        request_ids.clone(),
    ));

    Ok(RequestRegistration {
        email,
        voting_dates,
        request_ids,
        updated,
    })
}

/// Register a volunteer as a voting proxy, keyed on email.
///
/// The person with the same email is linked, or created when there is
/// none, and their postal address refreshed. An `invited` proxy becomes
/// `created`. The person is then queued for geocoding so distance matching
/// can use them.
pub async fn create_or_update_voting_proxy<R: Registry + ?Sized>(
    registry: &R,
    bus: &NotificationBus,
    input: &VotingProxyInput,
) -> Result<ProxyRegistration, EngineError> {
    let input = input.normalized();
    let jurisdiction = input.validated()?;
    let email = input.email.clone();

    let (person_id, new_person) = registry
        .find_or_create_person(&NewPerson {
            email: email.clone(),
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            contact_phone: Some(input.contact_phone.clone()).filter(|p| !p.is_empty()),
        })
        .await?;

    let zip = match (&input.zip, jurisdiction) {
        (Some(zip), _) => Some(zip.clone()),
        (None, Jurisdiction::Commune(commune_id)) => registry
            .commune_area(commune_id)
            .await?
            .and_then(|area| area.postal_codes.into_iter().next()),
        (None, Jurisdiction::Consulate(_)) => None,
    };
    if input.address.is_some() || zip.is_some() || input.city.is_some() {
        registry
            .update_person_address(
                person_id,
                input.address.as_deref(),
                zip.as_deref(),
                input.city.as_deref(),
            )
            .await?;
    }

    let (proxy, created) = registry
        .upsert_proxy(&UpsertVotingProxy {
            person_id: Some(person_id),
            email: email.clone(),
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            contact_phone: input.contact_phone.clone(),
            date_of_birth: input.date_of_birth,
            voting_dates: input.distinct_dates(),
            jurisdiction,
            polling_station_number: input.polling_station_number.clone(),
        })
        .await?;

    tracing::info!(
        proxy_id = proxy.id,
        person_id,
        new_person,
        status = proxy.status.name(),
        updated = !created,
        "Voting proxy registered"
    );

    bus.enqueue(Notification::new(NotificationKind::GeocodePerson, vec![person_id]));

    Ok(ProxyRegistration {
        id: proxy.id,
        email,
        person_id,
        status: proxy.status,
        updated: !created,
    })
}
