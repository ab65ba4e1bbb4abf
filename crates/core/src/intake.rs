//! Validated input for the two registration entry points: a voter asking
//! for a proxy, and a volunteer offering to be one.

use serde::Deserialize;
use validator::Validate;

use crate::error::CoreError;
use crate::jurisdiction::Jurisdiction;
use crate::types::{DbId, VotingDate};

/// A voter's request for a proxy on one or more dates.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VotingProxyRequestInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 255))]
    pub first_name: String,
    #[validate(length(min = 1, max = 255))]
    pub last_name: String,
    #[validate(length(min = 1, max = 30))]
    pub contact_phone: String,
    #[validate(length(min = 1))]
    pub voting_dates: Vec<VotingDate>,
    pub commune_id: Option<DbId>,
    pub consulate_id: Option<DbId>,
    #[validate(length(max = 255))]
    pub polling_station_number: Option<String>,
    #[validate(length(max = 255))]
    pub voter_id: Option<String>,
}

fn trimmed(value: &str) -> String {
    value.trim().to_string()
}

fn blank_to_none(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl VotingProxyRequestInput {
    /// Copy with surrounding whitespace removed and blank optional fields
    /// cleared. Validate the normalized copy, not the raw form.
    pub fn normalized(&self) -> Self {
        Self {
            email: trimmed(&self.email),
            first_name: trimmed(&self.first_name),
            last_name: trimmed(&self.last_name),
            contact_phone: trimmed(&self.contact_phone),
            voting_dates: self.voting_dates.clone(),
            commune_id: self.commune_id,
            consulate_id: self.consulate_id,
            polling_station_number: blank_to_none(&self.polling_station_number),
            voter_id: blank_to_none(&self.voter_id),
        }
    }

    /// Run field validation and the jurisdiction check.
    pub fn validated(&self) -> Result<Jurisdiction, CoreError> {
        self.validate()?;
        Jurisdiction::require(self.commune_id, self.consulate_id)
    }

    /// Requested dates, sorted and without duplicates.
    pub fn distinct_dates(&self) -> Vec<VotingDate> {
        let mut dates = self.voting_dates.clone();
        dates.sort_unstable();
        dates.dedup();
        dates
    }
}

/// A volunteer registering (or updating their registration) as a proxy.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VotingProxyInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 255))]
    pub first_name: String,
    #[validate(length(min = 1, max = 255))]
    pub last_name: String,
    #[validate(length(min = 1, max = 30))]
    pub contact_phone: String,
    pub date_of_birth: Option<chrono::NaiveDate>,
    #[validate(length(min = 1))]
    pub voting_dates: Vec<VotingDate>,
    pub commune_id: Option<DbId>,
    pub consulate_id: Option<DbId>,
    #[validate(length(max = 255))]
    pub polling_station_number: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 20))]
    pub zip: Option<String>,
    #[validate(length(max = 255))]
    pub city: Option<String>,
}

impl VotingProxyInput {
    /// See [`VotingProxyRequestInput::normalized`].
    pub fn normalized(&self) -> Self {
        Self {
            email: trimmed(&self.email),
            first_name: trimmed(&self.first_name),
            last_name: trimmed(&self.last_name),
            contact_phone: trimmed(&self.contact_phone),
            date_of_birth: self.date_of_birth,
            voting_dates: self.voting_dates.clone(),
            commune_id: self.commune_id,
            consulate_id: self.consulate_id,
            polling_station_number: blank_to_none(&self.polling_station_number),
            address: blank_to_none(&self.address),
            zip: blank_to_none(&self.zip),
            city: blank_to_none(&self.city),
        }
    }

    /// Run field validation and the jurisdiction check.
    pub fn validated(&self) -> Result<Jurisdiction, CoreError> {
        self.validate()?;
        Jurisdiction::require(self.commune_id, self.consulate_id)
    }

    /// Available dates, sorted and without duplicates.
    pub fn distinct_dates(&self) -> Vec<VotingDate> {
        let mut dates = self.voting_dates.clone();
        dates.sort_unstable();
        dates.dedup();
        dates
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    use super::*;

    fn request_input() -> VotingProxyRequestInput {
        VotingProxyRequestInput {
            email: "voter@example.org".to_string(),
            first_name: "Jeanne".to_string(),
            last_name: "Martin".to_string(),
            contact_phone: "+33600000000".to_string(),
            voting_dates: vec![
                NaiveDate::from_ymd_opt(2022, 6, 19).unwrap(),
                NaiveDate::from_ymd_opt(2022, 6, 12).unwrap(),
                NaiveDate::from_ymd_opt(2022, 6, 19).unwrap(),
            ],
            commune_id: Some(1),
            consulate_id: None,
            polling_station_number: Some("12".to_string()),
            voter_id: None,
        }
    }

    #[test]
    fn valid_request_yields_its_jurisdiction() {
        assert_eq!(request_input().validated().unwrap(), Jurisdiction::Commune(1));
    }

    #[test]
    fn bad_email_is_rejected() {
        let mut input = request_input();
        input.email = "not-an-email".to_string();
        assert_matches!(input.validated(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn request_needs_a_date() {
        let mut input = request_input();
        input.voting_dates.clear();
        assert_matches!(input.validated(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn request_cannot_target_commune_and_consulate() {
        let mut input = request_input();
        input.consulate_id = Some(2);
        assert_matches!(input.validated(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn padded_email_is_valid_once_normalized() {
        let mut input = request_input();
        input.email = "  voter@example.org ".to_string();
        input.first_name = " Jeanne".to_string();
        input.polling_station_number = Some("  ".to_string());
        assert_matches!(input.validated(), Err(CoreError::Validation(_)));

        let normalized = input.normalized();
        assert_eq!(normalized.email, "voter@example.org");
        assert_eq!(normalized.first_name, "Jeanne");
        assert_eq!(normalized.polling_station_number, None);
        assert_eq!(normalized.validated().unwrap(), Jurisdiction::Commune(1));
    }

    #[test]
    fn whitespace_only_name_is_rejected_after_normalizing() {
        let mut input = request_input();
        input.last_name = "   ".to_string();
        assert_matches!(input.normalized().validated(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn duplicate_dates_collapse() {
        let dates = request_input().distinct_dates();
        assert_eq!(dates.len(), 2);
        assert!(dates[0] < dates[1]);
    }
}
