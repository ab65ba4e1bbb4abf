//! Proxy-to-request candidate selection.
//!
//! Pure functions over snapshots of the request pool. The matching engine
//! loads the pool once per pass, then asks [`MatchingSweep::claim_for`] for
//! each proxy in turn; nothing here touches the database.
//!
//! Selection is tiered:
//!
//! 1. consulate proxies only see requests of the same consulate;
//! 2. commune proxies with known coordinates see requests whose town hall is
//!    within [`PROXY_TO_REQUEST_DISTANCE_LIMIT_M`];
//! 3. otherwise (or when nothing is near) requests of the same commune.
//!
//! Candidates are then grouped by requester email and the group covering the
//! most voting dates wins, ties broken by polling-station match, then by
//! proximity.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::geo::{GeoPoint, PROXY_TO_REQUEST_DISTANCE_LIMIT_M};
use crate::jurisdiction::Jurisdiction;
use crate::status::RequestStatus;
use crate::types::{DbId, Timestamp, VotingDate};

/// A proxy that received an offer is not offered anything else for this long.
pub const MATCHING_THROTTLE_DAYS: i64 = 2;

/// Proxies whose `last_matched` is at or after this instant are skipped.
pub fn matching_cutoff(now: Timestamp) -> Timestamp {
    now - Duration::days(MATCHING_THROTTLE_DAYS)
}

/// Whether a proxy last matched at `last_matched` may be matched at `now`.
pub fn is_due_for_matching(last_matched: Option<Timestamp>, now: Timestamp) -> bool {
    last_matched.map_or(true, |at| at < matching_cutoff(now))
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// The parts of a voting proxy the candidate finder needs.
#[derive(Debug, Clone)]
pub struct ProxyProfile {
    pub id: DbId,
    pub email: String,
    pub jurisdiction: Jurisdiction,
    pub voting_dates: Vec<VotingDate>,
    pub polling_station_number: Option<String>,
    /// Coordinates of the linked person, if geocoded.
    pub coordinates: Option<GeoPoint>,
}

impl ProxyProfile {
    /// Number of distinct dates the proxy is available on.
    pub fn available_date_count(&self) -> usize {
        self.voting_dates.iter().collect::<BTreeSet<_>>().len()
    }
}

/// A request as seen by the candidate finder.
#[derive(Debug, Clone)]
pub struct PoolRequest {
    pub id: DbId,
    pub email: String,
    pub voting_date: VotingDate,
    pub status: RequestStatus,
    pub proxy_id: Option<DbId>,
    pub jurisdiction: Jurisdiction,
    pub polling_station_number: Option<String>,
    /// Town-hall coordinates of the request's commune, if known.
    pub commune_centroid: Option<GeoPoint>,
}

impl PoolRequest {
    fn is_unassigned(&self) -> bool {
        self.status == RequestStatus::Created && self.proxy_id.is_none()
    }
}

// ---------------------------------------------------------------------------
// Proximity
// ---------------------------------------------------------------------------

/// How close a request is to a proxy.
///
/// Exact jurisdiction matches sort before any geodesic distance, geodesic
/// distances sort ascending.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "kind", content = "meters", rename_all = "snake_case")]
pub enum Proximity {
    ExactJurisdiction,
    Geodesic(f64),
}

impl Ord for Proximity {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Proximity::ExactJurisdiction, Proximity::ExactJurisdiction) => Ordering::Equal,
            (Proximity::ExactJurisdiction, Proximity::Geodesic(_)) => Ordering::Less,
            (Proximity::Geodesic(_), Proximity::ExactJurisdiction) => Ordering::Greater,
            (Proximity::Geodesic(a), Proximity::Geodesic(b)) => a.total_cmp(b),
        }
    }
}

impl PartialOrd for Proximity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Proximity {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Proximity {}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// The winning group of requests for one proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateGroup {
    pub email: String,
    /// Request ids ordered by voting date, then id.
    pub request_ids: Vec<DbId>,
    pub matching_date_count: usize,
    pub polling_station_match: bool,
    pub proximity: Proximity,
}

/// No pending request is compatible with the proxy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("No pending voting proxy request matches voting proxy {proxy_id}")]
pub struct NoMatch {
    pub proxy_id: DbId,
}

// ---------------------------------------------------------------------------
// Candidate finder
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct GroupAccumulator {
    entries: Vec<(VotingDate, DbId)>,
    dates: BTreeSet<VotingDate>,
    polling_station_match: bool,
    proximity: Proximity,
    lowest_id: DbId,
}

impl GroupAccumulator {
    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.dates
            .len()
            .cmp(&other.dates.len())
            .then(self.polling_station_match.cmp(&other.polling_station_match))
            .then(other.proximity.cmp(&self.proximity))
            .then(other.lowest_id.cmp(&self.lowest_id))
    }
}

fn same_polling_station(a: Option<&str>, b: Option<&str>) -> bool {
    match (a.map(str::trim), b.map(str::trim)) {
        (Some(a), Some(b)) if !a.is_empty() => a.to_lowercase() == b.to_lowercase(),
        _ => false,
    }
}

/// Select the best group of pending requests for `proxy`.
///
/// `restrict_to`, when given, limits the result to those request ids. It is
/// applied after the proximity tier has been chosen on the whole pool.
pub fn find_requests_for_proxy(
    proxy: &ProxyProfile,
    pool: &[PoolRequest],
    restrict_to: Option<&HashSet<DbId>>,
) -> Result<CandidateGroup, NoMatch> {
    let dates: HashSet<VotingDate> = proxy.voting_dates.iter().copied().collect();

    let base: Vec<&PoolRequest> = pool
        .iter()
        .filter(|r| r.is_unassigned())
        .filter(|r| dates.contains(&r.voting_date))
        .filter(|r| !r.email.eq_ignore_ascii_case(&proxy.email))
        .collect();

    let tiered: Vec<(&PoolRequest, Proximity)> = match proxy.jurisdiction {
        Jurisdiction::Consulate(_) => base
            .into_iter()
            .filter(|r| r.jurisdiction == proxy.jurisdiction)
            .map(|r| (r, Proximity::ExactJurisdiction))
            .collect(),
        Jurisdiction::Commune(_) => {
            let near: Vec<(&PoolRequest, Proximity)> = match proxy.coordinates {
                Some(origin) => base
                    .iter()
                    .filter_map(|r| {
                        let distance = origin.distance_m(&r.commune_centroid?);
                        (distance <= PROXY_TO_REQUEST_DISTANCE_LIMIT_M)
                            .then_some((*r, Proximity::Geodesic(distance)))
                    })
                    .collect(),
                None => Vec::new(),
            };

            if near.is_empty() {
                base.into_iter()
                    .filter(|r| r.jurisdiction == proxy.jurisdiction)
                    .map(|r| (r, Proximity::ExactJurisdiction))
                    .collect()
            } else {
                near
            }
        }
    };

    let proxy_commune = proxy.jurisdiction.commune_id();
    let mut groups: BTreeMap<&str, GroupAccumulator> = BTreeMap::new();

    for (request, proximity) in tiered {
        if restrict_to.is_some_and(|ids| !ids.contains(&request.id)) {
            continue;
        }

        let polling_station_match = proxy_commune.is_some()
            && request.jurisdiction.commune_id() == proxy_commune
            && same_polling_station(
                request.polling_station_number.as_deref(),
                proxy.polling_station_number.as_deref(),
            );

        let group = groups
            .entry(request.email.as_str())
            .or_insert_with(|| GroupAccumulator {
                entries: Vec::new(),
                dates: BTreeSet::new(),
                polling_station_match: false,
                proximity,
                lowest_id: request.id,
            });
        group.entries.push((request.voting_date, request.id));
        group.dates.insert(request.voting_date);
        group.polling_station_match |= polling_station_match;
        group.proximity = group.proximity.min(proximity);
        group.lowest_id = group.lowest_id.min(request.id);
    }

    let (email, mut winner) = groups
        .into_iter()
        .max_by(|(_, a), (_, b)| a.rank_cmp(b))
        .ok_or(NoMatch { proxy_id: proxy.id })?;

    winner.entries.sort();
    Ok(CandidateGroup {
        email: email.to_string(),
        request_ids: winner.entries.into_iter().map(|(_, id)| id).collect(),
        matching_date_count: winner.dates.len(),
        polling_station_match: winner.polling_station_match,
        proximity: winner.proximity,
    })
}

/// Order proxies for a sweep: most available dates first, then creation order.
pub fn sort_for_sweep(proxies: &mut [ProxyProfile]) {
    proxies.sort_by(|a, b| {
        b.available_date_count()
            .cmp(&a.available_date_count())
            .then(a.id.cmp(&b.id))
    });
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

/// Bookkeeping for one matching pass over a fixed pool snapshot.
///
/// Requests claimed by a proxy are withheld from every later proxy of the
/// same pass, even though they stay `created` in the registry until the
/// proxy answers.
#[derive(Debug)]
pub struct MatchingSweep {
    pool: Vec<PoolRequest>,
    pending: HashSet<DbId>,
    offered: Vec<DbId>,
}

impl MatchingSweep {
    pub fn new(pool: Vec<PoolRequest>) -> Self {
        let pending = pool
            .iter()
            .filter(|r| r.is_unassigned())
            .map(|r| r.id)
            .collect();
        Self {
            pool,
            pending,
            offered: Vec::new(),
        }
    }

    /// Number of requests not yet offered in this pass.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }

    /// Find the best group for `proxy` among the still-pending requests and
    /// withhold it from the rest of the pass.
    pub fn claim_for(&mut self, proxy: &ProxyProfile) -> Result<CandidateGroup, NoMatch> {
        let group = find_requests_for_proxy(proxy, &self.pool, Some(&self.pending))?;
        for id in &group.request_ids {
            self.pending.remove(id);
        }
        self.offered.extend_from_slice(&group.request_ids);
        Ok(group)
    }

    /// Give back requests whose offer could not be committed.
    pub fn release(&mut self, request_ids: &[DbId]) {
        self.offered.retain(|id| !request_ids.contains(id));
        self.pending.extend(request_ids.iter().copied());
    }

    /// Ids offered so far, in offer order.
    pub fn offered(&self) -> &[DbId] {
        &self.offered
    }

    pub fn into_offered(self) -> Vec<DbId> {
        self.offered
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
