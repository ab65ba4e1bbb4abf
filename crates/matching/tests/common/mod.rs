//! In-memory [`Registry`] for engine tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use procura_core::forwarding::{CampaignManagerContact, ForwardedRequestRow};
use procura_core::geo::GeoPoint;
use procura_core::jurisdiction::Jurisdiction;
use procura_core::matching::{is_due_for_matching, PoolRequest, ProxyProfile};
use procura_core::notifications::NotificationKind;
use procura_core::outreach::{CandidateArea, CandidateQuery, OutreachCandidate, ProxyInvitation};
use procura_core::status::{ProxyStatus, RequestStatus};
use procura_core::types::{DbId, Timestamp, VotingDate};
use procura_db::models::person::NewPerson;
use procura_db::models::voting_proxy::UpsertVotingProxy;
use procura_db::models::voting_proxy_request::UpsertVotingProxyRequest;
use procura_events::bus::Notification;
use procura_events::{DigestEmail, EmailError};
use procura_matching::forwarding::DigestMailer;
use procura_matching::registry::{AcceptOutcome, CommuneArea, ProxyRecord, Registry, RequestRecord};
use procura_matching::EngineError;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn day(d: u32) -> VotingDate {
    NaiveDate::from_ymd_opt(2022, 6, d).unwrap()
}

pub fn now() -> Timestamp {
    Utc.with_ymd_and_hms(2022, 6, 1, 12, 0, 0).unwrap()
}

pub const PARIS: GeoPoint = GeoPoint {
    latitude: 48.8566,
    longitude: 2.3522,
};
pub const VERSAILLES: GeoPoint = GeoPoint {
    latitude: 48.8049,
    longitude: 2.1204,
};
pub const LYON: GeoPoint = GeoPoint {
    latitude: 45.7640,
    longitude: 4.8357,
};

#[derive(Debug, Clone)]
pub struct MemProxy {
    pub id: DbId,
    pub email: String,
    pub person_id: Option<DbId>,
    pub status: ProxyStatus,
    pub jurisdiction: Option<Jurisdiction>,
    pub voting_dates: Vec<VotingDate>,
    pub polling_station_number: Option<String>,
    pub coordinates: Option<GeoPoint>,
    pub last_matched: Option<Timestamp>,
}

#[derive(Debug, Clone)]
pub struct MemRequest {
    pub id: DbId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub voting_date: VotingDate,
    pub status: RequestStatus,
    pub proxy_id: Option<DbId>,
    pub jurisdiction: Jurisdiction,
    pub polling_station_number: Option<String>,
    pub outreach_invited_at: Option<Timestamp>,
}

#[derive(Debug, Clone)]
pub struct MemCommune {
    pub code: String,
    pub name: String,
    pub postal_codes: Vec<String>,
    pub centroid: Option<GeoPoint>,
    pub district: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MemPerson {
    pub id: DbId,
    pub email: String,
    pub eligible: bool,
    pub coordinates: Option<GeoPoint>,
    pub country: Option<String>,
    pub zip: Option<String>,
    pub city_code: Option<String>,
    pub recent_attendances: i64,
    pub address: Option<String>,
}

#[derive(Default)]
pub struct State {
    next_id: DbId,
    pub proxies: BTreeMap<DbId, MemProxy>,
    pub requests: BTreeMap<DbId, MemRequest>,
    pub communes: BTreeMap<DbId, MemCommune>,
    pub consulates: BTreeMap<DbId, Vec<String>>,
    pub persons: BTreeMap<DbId, MemPerson>,
    pub managers: BTreeMap<String, CampaignManagerContact>,
    pub forwardings: HashSet<(String, NaiveDate)>,
    /// `mark_proxy_matched` fails for these proxies.
    pub broken_proxies: HashSet<DbId>,
    /// `commune_area` fails for these communes.
    pub broken_communes: HashSet<DbId>,
}

impl State {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryRegistry {
    pub state: Mutex<State>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn add_commune(&self, id: DbId, centroid: Option<GeoPoint>, district: Option<&str>) {
        self.with(|s| {
            s.communes.insert(
                id,
                MemCommune {
                    code: format!("C{id}"),
                    name: format!("Commune {id}"),
                    postal_codes: vec![format!("{id:05}")],
                    centroid,
                    district: district.map(str::to_string),
                },
            );
        });
    }

    pub fn add_consulate(&self, id: DbId, countries: &[&str]) {
        self.with(|s| {
            s.consulates
                .insert(id, countries.iter().map(|c| c.to_string()).collect());
        });
    }

    pub fn add_proxy(
        &self,
        email: &str,
        jurisdiction: Jurisdiction,
        dates: &[VotingDate],
        coordinates: Option<GeoPoint>,
    ) -> DbId {
        self.with(|s| {
            let id = s.next_id();
            s.proxies.insert(
                id,
                MemProxy {
                    id,
                    email: email.to_string(),
                    person_id: None,
                    status: ProxyStatus::Created,
                    jurisdiction: Some(jurisdiction),
                    voting_dates: dates.to_vec(),
                    polling_station_number: None,
                    coordinates,
                    last_matched: None,
                },
            );
            id
        })
    }

    pub fn add_request(&self, email: &str, jurisdiction: Jurisdiction, date: VotingDate) -> DbId {
        self.with(|s| {
            let id = s.next_id();
            s.requests.insert(
                id,
                MemRequest {
                    id,
                    email: email.to_string(),
                    first_name: "Jeanne".to_string(),
                    last_name: format!("Requester{id}"),
                    voting_date: date,
                    status: RequestStatus::Created,
                    proxy_id: None,
                    jurisdiction,
                    polling_station_number: None,
                    outreach_invited_at: None,
                },
            );
            id
        })
    }

    pub fn add_person(&self, email: &str, coordinates: Option<GeoPoint>, recent_attendances: i64) -> DbId {
        self.with(|s| {
            let id = s.next_id();
            s.persons.insert(
                id,
                MemPerson {
                    id,
                    email: email.to_string(),
                    eligible: true,
                    coordinates,
                    country: None,
                    zip: None,
                    city_code: None,
                    recent_attendances,
                    address: None,
                },
            );
            id
        })
    }

    pub fn proxy(&self, id: DbId) -> MemProxy {
        self.with(|s| s.proxies[&id].clone())
    }

    pub fn request(&self, id: DbId) -> MemRequest {
        self.with(|s| s.requests[&id].clone())
    }

    fn profile(proxy: &MemProxy) -> Option<ProxyProfile> {
        Some(ProxyProfile {
            id: proxy.id,
            email: proxy.email.clone(),
            jurisdiction: proxy.jurisdiction?,
            voting_dates: proxy.voting_dates.clone(),
            polling_station_number: proxy.polling_station_number.clone(),
            coordinates: proxy.coordinates,
        })
    }
}

fn is_pending(r: &MemRequest) -> bool {
    r.status == RequestStatus::Created && r.proxy_id.is_none()
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn matchable_proxies(&self, cutoff: Timestamp) -> Result<Vec<ProxyProfile>, EngineError> {
        Ok(self.with(|s| {
            s.proxies
                .values()
                .filter(|p| p.status.is_matchable())
                .filter(|p| p.last_matched.map_or(true, |at| at < cutoff))
                .filter_map(Self::profile)
                .collect()
        }))
    }

    async fn pending_requests(&self) -> Result<Vec<PoolRequest>, EngineError> {
        Ok(self.with(|s| {
            s.requests
                .values()
                .filter(|r| is_pending(r))
                .map(|r| PoolRequest {
                    id: r.id,
                    email: r.email.clone(),
                    voting_date: r.voting_date,
                    status: r.status,
                    proxy_id: r.proxy_id,
                    jurisdiction: r.jurisdiction,
                    polling_station_number: r.polling_station_number.clone(),
                    commune_centroid: r
                        .jurisdiction
                        .commune_id()
                        .and_then(|c| s.communes.get(&c))
                        .and_then(|c| c.centroid),
                })
                .collect()
        }))
    }

    async fn mark_proxy_matched(&self, proxy_id: DbId, at: Timestamp) -> Result<(), EngineError> {
        self.with(|s| {
            if s.broken_proxies.contains(&proxy_id) {
                return Err(EngineError::Database(sqlx::Error::PoolTimedOut));
            }
            match s.proxies.get_mut(&proxy_id) {
                Some(p) => {
                    p.last_matched = Some(at);
                    Ok(())
                }
                None => Err(EngineError::not_found("voting_proxy", proxy_id)),
            }
        })
    }

    async fn find_proxy(&self, proxy_id: DbId) -> Result<Option<ProxyRecord>, EngineError> {
        Ok(self.with(|s| {
            s.proxies.get(&proxy_id).map(|p| ProxyRecord {
                id: p.id,
                email: p.email.clone(),
                person_id: p.person_id,
                status: p.status,
            })
        }))
    }

    async fn set_proxy_status(
        &self,
        proxy_id: DbId,
        from: &[ProxyStatus],
        to: ProxyStatus,
    ) -> Result<bool, EngineError> {
        Ok(self.with(|s| match s.proxies.get_mut(&proxy_id) {
            Some(p) if from.contains(&p.status) => {
                p.status = to;
                true
            }
            _ => false,
        }))
    }

    async fn accept_requests(
        &self,
        proxy_id: DbId,
        request_ids: &[DbId],
    ) -> Result<AcceptOutcome, EngineError> {
        Ok(self.with(|s| {
            let Some(proxy) = s.proxies.get_mut(&proxy_id) else {
                return AcceptOutcome::ProxyNotAccepting;
            };
            if !proxy.status.is_matchable() {
                return AcceptOutcome::ProxyNotAccepting;
            }
            proxy.status = ProxyStatus::Available;
            let proxy_email = proxy.email.to_lowercase();

            let mut held: HashSet<VotingDate> = s
                .requests
                .values()
                .filter(|r| r.proxy_id == Some(proxy_id))
                .map(|r| r.voting_date)
                .collect();

            let mut ids = request_ids.to_vec();
            ids.sort_unstable();
            ids.dedup();

            let mut accepted = Vec::new();
            for id in ids {
                let Some(r) = s.requests.get_mut(&id) else { continue };
                if !is_pending(r) || r.email.to_lowercase() == proxy_email || held.contains(&r.voting_date) {
                    continue;
                }
                r.status = RequestStatus::Accepted;
                r.proxy_id = Some(proxy_id);
                held.insert(r.voting_date);
                accepted.push(id);
            }
            AcceptOutcome::Accepted(accepted)
        }))
    }

    async fn find_requests(&self, request_ids: &[DbId]) -> Result<Vec<RequestRecord>, EngineError> {
        Ok(self.with(|s| {
            request_ids
                .iter()
                .filter_map(|id| s.requests.get(id))
                .map(|r| RequestRecord {
                    id: r.id,
                    status: r.status,
                    proxy_id: r.proxy_id,
                })
                .collect()
        }))
    }

    async fn confirm_requests(&self, request_ids: &[DbId]) -> Result<Vec<DbId>, EngineError> {
        Ok(self.with(|s| {
            let mut confirmed = Vec::new();
            for id in request_ids {
                if let Some(r) = s.requests.get_mut(id) {
                    if r.status == RequestStatus::Accepted && r.proxy_id.is_some() {
                        r.status = RequestStatus::Confirmed;
                        confirmed.push(*id);
                    }
                }
            }
            confirmed.sort_unstable();
            confirmed
        }))
    }

    async fn upsert_requests(
        &self,
        inputs: &[UpsertVotingProxyRequest],
    ) -> Result<Vec<(DbId, bool)>, EngineError> {
        Ok(self.with(|s| {
            inputs
                .iter()
                .map(|input| {
                    let existing = s
                        .requests
                        .values()
                        .find(|r| r.email == input.email && r.voting_date == input.voting_date)
                        .map(|r| r.id);
                    match existing {
                        Some(id) => {
                            let r = s.requests.get_mut(&id).unwrap();
                            r.first_name = input.first_name.clone();
                            r.last_name = input.last_name.clone();
                            r.jurisdiction = input.jurisdiction;
                            r.polling_station_number = input.polling_station_number.clone();
                            (id, false)
                        }
                        None => {
                            let id = s.next_id();
                            s.requests.insert(
                                id,
                                MemRequest {
                                    id,
                                    email: input.email.clone(),
                                    first_name: input.first_name.clone(),
                                    last_name: input.last_name.clone(),
                                    voting_date: input.voting_date,
                                    status: RequestStatus::Created,
                                    proxy_id: None,
                                    jurisdiction: input.jurisdiction,
                                    polling_station_number: input.polling_station_number.clone(),
                                    outreach_invited_at: None,
                                },
                            );
                            (id, true)
                        }
                    }
                })
                .collect()
        }))
    }

    async fn upsert_proxy(&self, input: &UpsertVotingProxy) -> Result<(ProxyRecord, bool), EngineError> {
        Ok(self.with(|s| {
            let existing = s.proxies.values().find(|p| p.email == input.email).map(|p| p.id);
            let (id, created) = match existing {
                Some(id) => (id, false),
                None => {
                    let id = s.next_id();
                    s.proxies.insert(
                        id,
                        MemProxy {
                            id,
                            email: input.email.clone(),
                            person_id: None,
                            status: ProxyStatus::Created,
                            jurisdiction: None,
                            voting_dates: Vec::new(),
                            polling_station_number: None,
                            coordinates: None,
                            last_matched: None,
                        },
                    );
                    (id, true)
                }
            };
            let person_coordinates = input
                .person_id
                .and_then(|pid| s.persons.get(&pid))
                .and_then(|p| p.coordinates);
            let p = s.proxies.get_mut(&id).unwrap();
            p.person_id = input.person_id.or(p.person_id);
            p.jurisdiction = Some(input.jurisdiction);
            p.voting_dates = input.voting_dates.clone();
            p.polling_station_number = input.polling_station_number.clone();
            p.coordinates = person_coordinates.or(p.coordinates);
            if p.status == ProxyStatus::Invited {
                p.status = ProxyStatus::Created;
            }
            (
                ProxyRecord {
                    id,
                    email: p.email.clone(),
                    person_id: p.person_id,
                    status: p.status,
                },
                created,
            )
        }))
    }

    async fn find_or_create_person(&self, person: &NewPerson) -> Result<(DbId, bool), EngineError> {
        Ok(self.with(|s| {
            if let Some(p) = s.persons.values().find(|p| p.email.eq_ignore_ascii_case(&person.email)) {
                return (p.id, false);
            }
            let id = s.next_id();
            s.persons.insert(
                id,
                MemPerson {
                    id,
                    email: person.email.clone(),
                    // not a campaign supporter yet, so never an outreach candidate
                    eligible: false,
                    coordinates: None,
                    country: None,
                    zip: None,
                    city_code: None,
                    recent_attendances: 0,
                    address: None,
                },
            );
            (id, true)
        }))
    }

    async fn update_person_address(
        &self,
        person_id: DbId,
        address: Option<&str>,
        zip: Option<&str>,
        _city: Option<&str>,
    ) -> Result<(), EngineError> {
        self.with(|s| {
            if let Some(p) = s.persons.get_mut(&person_id) {
                if let Some(address) = address {
                    p.address = Some(address.to_string());
                }
                if let Some(zip) = zip {
                    p.zip = Some(zip.to_string());
                }
            }
        });
        Ok(())
    }

    async fn commune_area(&self, commune_id: DbId) -> Result<Option<CommuneArea>, EngineError> {
        self.with(|s| {
            if s.broken_communes.contains(&commune_id) {
                return Err(EngineError::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(s.communes.get(&commune_id).map(|c| CommuneArea {
                code: c.code.clone(),
                postal_codes: c.postal_codes.clone(),
                centroid: c.centroid,
            }))
        })
    }

    async fn consulate_countries(&self, consulate_id: DbId) -> Result<Option<Vec<String>>, EngineError> {
        Ok(self.with(|s| s.consulates.get(&consulate_id).cloned()))
    }

    async fn outreach_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<OutreachCandidate>, EngineError> {
        Ok(self.with(|s| {
            let proxy_persons: HashSet<DbId> = s.proxies.values().filter_map(|p| p.person_id).collect();
            let proxy_emails: HashSet<String> =
                s.proxies.values().map(|p| p.email.to_lowercase()).collect();

            s.persons
                .values()
                .filter(|p| p.eligible)
                .filter(|p| !proxy_persons.contains(&p.id))
                .filter(|p| !proxy_emails.contains(&p.email.to_lowercase()))
                .filter(|p| !p.email.eq_ignore_ascii_case(&query.exclude_email))
                .filter(|p| !query.exclude_person_ids.contains(&p.id))
                .filter(|p| match &query.area {
                    CandidateArea::Countries(countries) => {
                        p.country.as_ref().is_some_and(|c| countries.contains(c))
                    }
                    CandidateArea::Near { center, radius_m } => p
                        .coordinates
                        .is_some_and(|at| at.is_within(center, *radius_m)),
                    CandidateArea::Codes {
                        city_code,
                        postal_codes,
                    } => {
                        p.city_code.as_ref() == Some(city_code)
                            || p.zip.as_ref().is_some_and(|z| postal_codes.contains(z))
                    }
                })
                .map(|p| OutreachCandidate {
                    person_id: p.id,
                    email: p.email.clone(),
                    first_name: String::new(),
                    last_name: "Candidate".to_string(),
                    contact_phone: None,
                    recent_attendance_count: p.recent_attendances,
                })
                // reverse id order and no cap; ranking is the engine's job
                .rev()
                .collect()
        }))
    }

    async fn create_invitations(&self, invitations: &[ProxyInvitation]) -> Result<Vec<DbId>, EngineError> {
        Ok(self.with(|s| {
            let mut created = Vec::new();
            for invitation in invitations {
                if s.proxies.values().any(|p| p.email == invitation.email) {
                    continue;
                }
                let id = s.next_id();
                s.proxies.insert(
                    id,
                    MemProxy {
                        id,
                        email: invitation.email.clone(),
                        person_id: Some(invitation.person_id),
                        status: ProxyStatus::Invited,
                        jurisdiction: None,
                        voting_dates: Vec::new(),
                        polling_station_number: None,
                        coordinates: None,
                        last_matched: None,
                    },
                );
                created.push(id);
            }
            created
        }))
    }

    async fn recently_canvassed(
        &self,
        request_ids: &[DbId],
        since: Timestamp,
    ) -> Result<Vec<DbId>, EngineError> {
        Ok(self.with(|s| {
            request_ids
                .iter()
                .copied()
                .filter(|id| {
                    s.requests
                        .get(id)
                        .and_then(|r| r.outreach_invited_at)
                        .is_some_and(|at| at >= since)
                })
                .collect()
        }))
    }

    async fn mark_canvassed(&self, request_ids: &[DbId], at: Timestamp) -> Result<(), EngineError> {
        self.with(|s| {
            for id in request_ids {
                if let Some(r) = s.requests.get_mut(id) {
                    r.outreach_invited_at = Some(at);
                }
            }
        });
        Ok(())
    }

    async fn pending_communes(&self) -> Result<Vec<(DbId, Option<String>)>, EngineError> {
        Ok(self.with(|s| {
            let ids: std::collections::BTreeSet<DbId> = s
                .requests
                .values()
                .filter(|r| is_pending(r))
                .filter_map(|r| r.jurisdiction.commune_id())
                .collect();
            ids.into_iter()
                .filter_map(|id| s.communes.get(&id).map(|c| (id, c.district.clone())))
                .collect()
        }))
    }

    async fn forwardable_requests(
        &self,
        commune_ids: &[DbId],
    ) -> Result<Vec<ForwardedRequestRow>, EngineError> {
        Ok(self.with(|s| {
            s.requests
                .values()
                .filter(|r| is_pending(r))
                .filter(|r| r.jurisdiction.commune_id().is_some_and(|c| commune_ids.contains(&c)))
                .map(|r| ForwardedRequestRow {
                    request_id: r.id,
                    first_name: r.first_name.clone(),
                    last_name: r.last_name.clone(),
                    email: r.email.clone(),
                    contact_phone: None,
                    commune_name: r
                        .jurisdiction
                        .commune_id()
                        .and_then(|c| s.communes.get(&c))
                        .map(|c| c.name.clone()),
                    polling_station_number: r.polling_station_number.clone(),
                    voter_id: None,
                    voting_date: r.voting_date,
                })
                .collect()
        }))
    }

    async fn campaign_manager(&self, district: &str) -> Result<Option<CampaignManagerContact>, EngineError> {
        Ok(self.with(|s| s.managers.get(district).cloned()))
    }

    async fn forwarding_recorded(&self, district: &str, day: NaiveDate) -> Result<bool, EngineError> {
        Ok(self.with(|s| s.forwardings.contains(&(district.to_string(), day))))
    }

    async fn record_forwarding(
        &self,
        district: &str,
        day: NaiveDate,
        _manager_email: &str,
        request_ids: &[DbId],
    ) -> Result<Option<Vec<DbId>>, EngineError> {
        Ok(self.with(|s| {
            if !s.forwardings.insert((district.to_string(), day)) {
                return None;
            }
            let mut forwarded = Vec::new();
            for id in request_ids {
                if let Some(r) = s.requests.get_mut(id) {
                    if is_pending(r) {
                        r.status = RequestStatus::Forwarded;
                        forwarded.push(*id);
                    }
                }
            }
            forwarded.sort_unstable();
            Some(forwarded)
        }))
    }
}

// ---------------------------------------------------------------------------
// Mailer
// ---------------------------------------------------------------------------

/// Records digests instead of sending them; can be told to fail.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<DigestEmail>>,
    pub fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<DigestEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DigestMailer for RecordingMailer {
    async fn send_digest(&self, digest: &DigestEmail) -> Result<(), EmailError> {
        if self.fail {
            return Err(EmailError::Build("SMTP unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(digest.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Everything currently buffered on a bus subscription.
pub fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

pub fn of_kind(notifications: &[Notification], kind: NotificationKind) -> Vec<Notification> {
    notifications.iter().filter(|n| n.kind == kind).cloned().collect()
}

/// Whether `is_due_for_matching` agrees with the registry's throttle.
pub fn due(proxy: &MemProxy, at: Timestamp) -> bool {
    is_due_for_matching(proxy.last_matched, at)
}
