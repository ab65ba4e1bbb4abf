//! Recruitment of new voting proxies for requests no proxy covers.
//!
//! Pending requests are clustered per requester and jurisdiction. For each
//! cluster the engine looks for people near the request's jurisdiction and
//! invites at most [`PER_REQUEST_INVITATION_LIMIT`] of them.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::Serialize;

use crate::geo::{GeoPoint, PROXY_TO_REQUEST_DISTANCE_LIMIT_M};
use crate::jurisdiction::Jurisdiction;
use crate::matching::PoolRequest;
use crate::status::RequestStatus;
use crate::types::{DbId, Timestamp};

/// Maximum number of people invited for one request cluster.
pub const PER_REQUEST_INVITATION_LIMIT: usize = 10;

/// Event attendances older than this do not count as engagement.
pub const RECENT_ATTENDANCE_WINDOW_DAYS: i64 = 365;

/// A request cluster served by outreach is left alone for this long, so a
/// request nobody takes does not trigger a new round of invitations on every
/// matching tick.
pub const OUTREACH_COOLDOWN_DAYS: i64 = 7;

/// Placeholder stored for missing names and phone numbers of invited proxies.
pub const MISSING_FIELD_PLACEHOLDER: &str = "-";

/// Earliest event end counted as a recent attendance at `now`.
pub fn attendance_cutoff(now: Timestamp) -> Timestamp {
    now - Duration::days(RECENT_ATTENDANCE_WINDOW_DAYS)
}

/// Clusters served by outreach at or after this instant are cooling down.
pub fn outreach_cooldown_cutoff(now: Timestamp) -> Timestamp {
    now - Duration::days(OUTREACH_COOLDOWN_DAYS)
}

// ---------------------------------------------------------------------------
// Request clusters
// ---------------------------------------------------------------------------

/// Pending requests of one requester in one jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCluster {
    pub email: String,
    pub jurisdiction: Jurisdiction,
    pub request_ids: Vec<DbId>,
}

/// Group unassigned requests into clusters, consulate clusters first.
///
/// Order inside each partition is by jurisdiction id, then email, so that
/// reruns invite the same people in the same order.
pub fn cluster_requests(requests: &[PoolRequest]) -> Vec<RequestCluster> {
    let mut clusters: BTreeMap<(u8, DbId, &str), Vec<DbId>> = BTreeMap::new();

    for request in requests
        .iter()
        .filter(|r| r.status == RequestStatus::Created && r.proxy_id.is_none())
    {
        let key = match request.jurisdiction {
            Jurisdiction::Consulate(id) => (0, id, request.email.as_str()),
            Jurisdiction::Commune(id) => (1, id, request.email.as_str()),
        };
        clusters.entry(key).or_default().push(request.id);
    }

    clusters
        .into_iter()
        .map(|((kind, jurisdiction_id, email), mut request_ids)| {
            request_ids.sort_unstable();
            RequestCluster {
                email: email.to_string(),
                jurisdiction: if kind == 0 {
                    Jurisdiction::Consulate(jurisdiction_id)
                } else {
                    Jurisdiction::Commune(jurisdiction_id)
                },
                request_ids,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Candidate search
// ---------------------------------------------------------------------------

/// Where outreach candidates must live.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateArea {
    /// Any of the countries a consulate serves (ISO codes).
    Countries(Vec<String>),
    /// Within `radius_m` of a town hall.
    Near { center: GeoPoint, radius_m: f64 },
    /// Same INSEE city code, or one of the commune's postal codes.
    Codes {
        city_code: String,
        postal_codes: Vec<String>,
    },
}

impl CandidateArea {
    /// Area for a commune: by distance when its town hall is geocoded,
    /// by address codes otherwise.
    pub fn for_commune(centroid: Option<GeoPoint>, city_code: &str, postal_codes: &[String]) -> Self {
        match centroid {
            Some(center) => CandidateArea::Near {
                center,
                radius_m: PROXY_TO_REQUEST_DISTANCE_LIMIT_M,
            },
            None => CandidateArea::Codes {
                city_code: city_code.to_string(),
                postal_codes: postal_codes.to_vec(),
            },
        }
    }
}

/// How candidates are prioritised before the cap applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrder {
    /// Person id ascending.
    Registration,
    /// Most recent event attendances first, then person id.
    Engagement,
}

/// Parameters of one candidate lookup.
#[derive(Debug, Clone)]
pub struct CandidateQuery {
    pub area: CandidateArea,
    /// The requester, who cannot be their own proxy.
    pub exclude_email: String,
    /// People already invited earlier in the same run.
    pub exclude_person_ids: Vec<DbId>,
    pub order: CandidateOrder,
    /// Attendances ending before this do not count.
    pub attended_since: Timestamp,
    pub limit: usize,
}

/// A person who could be invited to become a proxy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutreachCandidate {
    pub person_id: DbId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub contact_phone: Option<String>,
    pub recent_attendance_count: i64,
}

/// Sort candidates per `order` and keep the first `limit`.
pub fn rank_candidates(candidates: &mut Vec<OutreachCandidate>, order: CandidateOrder, limit: usize) {
    match order {
        CandidateOrder::Registration => candidates.sort_by_key(|c| c.person_id),
        CandidateOrder::Engagement => candidates.sort_by(|a, b| {
            b.recent_attendance_count
                .cmp(&a.recent_attendance_count)
                .then(a.person_id.cmp(&b.person_id))
        }),
    }
    candidates.truncate(limit);
}

/// Fields of the `invited` voting proxy row created for a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyInvitation {
    pub person_id: DbId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub contact_phone: String,
}

fn or_placeholder(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        MISSING_FIELD_PLACEHOLDER.to_string()
    } else {
        value.to_string()
    }
}

impl From<&OutreachCandidate> for ProxyInvitation {
    fn from(candidate: &OutreachCandidate) -> Self {
        Self {
            person_id: candidate.person_id,
            email: candidate.email.clone(),
            first_name: or_placeholder(&candidate.first_name),
            last_name: or_placeholder(&candidate.last_name),
            contact_phone: or_placeholder(candidate.contact_phone.as_deref().unwrap_or("")),
        }
    }
}
