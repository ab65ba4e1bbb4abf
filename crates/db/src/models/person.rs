//! Person registry rows used for proxy outreach.

use procura_core::outreach::OutreachCandidate;
use procura_core::types::DbId;
use sqlx::FromRow;

/// The subset of a person the registration flow links to.
#[derive(Debug, Clone, FromRow)]
pub struct PersonLink {
    pub id: DbId,
    pub email: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Identity of a person created by proxy registration.
#[derive(Debug, Clone)]
pub struct NewPerson {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub contact_phone: Option<String>,
}

/// An eligible outreach candidate with their engagement score.
#[derive(Debug, Clone, FromRow)]
pub struct CandidateRow {
    pub person_id: DbId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub contact_phone: Option<String>,
    pub recent_attendance_count: i64,
}

impl From<CandidateRow> for OutreachCandidate {
    fn from(row: CandidateRow) -> Self {
        OutreachCandidate {
            person_id: row.person_id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            contact_phone: row.contact_phone,
            recent_attendance_count: row.recent_attendance_count,
        }
    }
}
