//! Reference rows: communes and consulates.

use procura_core::geo::GeoPoint;
use procura_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `communes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Commune {
    pub id: DbId,
    /// INSEE code.
    pub code: String,
    pub name: String,
    pub postal_codes: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub district: Option<String>,
    pub created_at: Timestamp,
}

impl Commune {
    /// Town-hall location, when geocoded.
    pub fn centroid(&self) -> Option<GeoPoint> {
        GeoPoint::from_columns(self.latitude, self.longitude)
    }
}

/// A row from the `consulates` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Consulate {
    pub id: DbId,
    pub name: String,
    pub countries: Vec<String>,
    pub created_at: Timestamp,
}
