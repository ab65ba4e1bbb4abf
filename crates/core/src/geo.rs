//! Geographic helpers used by proximity matching.

use serde::{Deserialize, Serialize};

/// Maximum distance between a proxy and a request's town hall, and between a
/// commune's town hall and an outreach candidate.
pub const PROXY_TO_REQUEST_DISTANCE_LIMIT_M: f64 = 30_000.0;

/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Build a point from two nullable columns; `None` unless both are set.
    pub fn from_columns(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        Some(Self::new(latitude?, longitude?))
    }

    /// Great-circle distance in meters (haversine on the mean sphere).
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
    }

    /// Whether `other` lies within `radius_m` meters.
    pub fn is_within(&self, other: &GeoPoint, radius_m: f64) -> bool {
        self.distance_m(other) <= radius_m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARIS: GeoPoint = GeoPoint {
        latitude: 48.8566,
        longitude: 2.3522,
    };
    const VERSAILLES: GeoPoint = GeoPoint {
        latitude: 48.8049,
        longitude: 2.1204,
    };
    const LYON: GeoPoint = GeoPoint {
        latitude: 45.7640,
        longitude: 4.8357,
    };

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(PARIS.distance_m(&PARIS), 0.0);
    }

    #[test]
    fn paris_versailles_is_about_18_km() {
        let d = PARIS.distance_m(&VERSAILLES);
        assert!((17_000.0..19_000.0).contains(&d), "got {d}");
        assert!(PARIS.is_within(&VERSAILLES, PROXY_TO_REQUEST_DISTANCE_LIMIT_M));
    }

    #[test]
    fn paris_lyon_is_out_of_range() {
        let d = PARIS.distance_m(&LYON);
        assert!((390_000.0..395_000.0).contains(&d), "got {d}");
        assert!(!PARIS.is_within(&LYON, PROXY_TO_REQUEST_DISTANCE_LIMIT_M));
    }

    #[test]
    fn distance_is_symmetric() {
        assert!((PARIS.distance_m(&LYON) - LYON.distance_m(&PARIS)).abs() < 1e-6);
    }

    #[test]
    fn point_needs_both_columns() {
        assert!(GeoPoint::from_columns(Some(1.0), None).is_none());
        assert_eq!(
            GeoPoint::from_columns(Some(1.0), Some(2.0)),
            Some(GeoPoint::new(1.0, 2.0))
        );
    }
}
