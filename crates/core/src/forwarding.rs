//! Hand-off of pending requests to district campaign managers.
//!
//! Requests still waiting for a proxy are grouped by electoral district and
//! mailed as a CSV digest to the district's campaign manager, after which
//! they leave automatic matching for good.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::{DbId, VotingDate};

/// Header row of the CSV digest, in column order.
pub const CSV_COLUMNS: [&str; 8] = [
    "first_name",
    "last_name",
    "email",
    "contact_phone",
    "commune",
    "polling_station_number",
    "voter_id",
    "voting_date",
];

/// One line of the CSV digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardedRequestRow {
    pub request_id: DbId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub contact_phone: Option<String>,
    pub commune_name: Option<String>,
    pub polling_station_number: Option<String>,
    pub voter_id: Option<String>,
    pub voting_date: VotingDate,
}

/// A district's campaign manager, as returned by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignManagerContact {
    pub district: String,
    pub name: String,
    pub email: String,
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Group commune ids by electoral district, skipping communes without one.
///
/// Districts come out in lexical order so reruns process them identically.
pub fn group_communes_by_district<'a>(
    communes: impl IntoIterator<Item = (DbId, Option<&'a str>)>,
) -> BTreeMap<String, Vec<DbId>> {
    let mut by_district: BTreeMap<String, Vec<DbId>> = BTreeMap::new();
    for (commune_id, district) in communes {
        if let Some(district) = district.map(str::trim).filter(|d| !d.is_empty()) {
            by_district
                .entry(district.to_string())
                .or_default()
                .push(commune_id);
        }
    }
    for ids in by_district.values_mut() {
        ids.sort_unstable();
        ids.dedup();
    }
    by_district
}

// ---------------------------------------------------------------------------
// Digest content
// ---------------------------------------------------------------------------

/// Subject line of the digest sent on `today`.
pub fn digest_subject(today: NaiveDate) -> String {
    format!("[Voting proxies] Pending voting proxy requests - {today}")
}

/// File name of the CSV attachment sent on `today`.
pub fn digest_attachment_name(today: NaiveDate) -> String {
    format!("voting_proxy_requests-{today}.csv")
}

/// Plain-text body of the digest.
pub fn digest_body(manager_name: &str, district: &str, request_count: usize) -> String {
    format!(
        "Hello {manager_name},\n\
         \n\
         Attached is the list of the {request_count} voting proxy request(s) from \
         district {district} (or nearby) that are still waiting for a volunteer.\n\
         \n\
         You receive this message because you are registered as the campaign \
         manager of district {district}. These requests are no longer offered \
         to volunteers automatically.\n\
         \n\
         Regards.\n"
    )
}

// ---------------------------------------------------------------------------
// CSV helpers
// ---------------------------------------------------------------------------

/// Escape a value for CSV: wrap in quotes if it contains comma, quote, or newline.
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Build the CSV digest: a header row, then one line per request, each
/// terminated by `\n`.
pub fn build_csv(rows: &[ForwardedRequestRow]) -> String {
    let mut out = CSV_COLUMNS.join(",");
    out.push('\n');

    for row in rows {
        let fields = [
            row.first_name.as_str(),
            row.last_name.as_str(),
            row.email.as_str(),
            row.contact_phone.as_deref().unwrap_or(""),
            row.commune_name.as_deref().unwrap_or(""),
            row.polling_station_number.as_deref().unwrap_or(""),
            row.voter_id.as_deref().unwrap_or(""),
        ];
        let mut line: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
        line.push(row.voting_date.to_string());
        out.push_str(&line.join(","));
        out.push('\n');
    }

    out
}
