//! Validated WGS84 position

use serde::{Deserialize, Serialize};

use crate::registry::TrackerError;

/// A point on the globe in degrees
///
/// Always holds finite values with `lat` in `[-90, 90]` and `lng` in
/// `[-180, 180]`; construction and deserialization both validate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPosition")]
pub struct Position {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawPosition {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawPosition> for Position {
    type Error = TrackerError;

    fn try_from(raw: RawPosition) -> Result<Self, Self::Error> {
        Position::new(raw.lat, raw.lng)
    }
}

impl Position {
    /// Create a position, rejecting out-of-range or non-finite coordinates
    pub fn new(lat: f64, lng: f64) -> Result<Self, TrackerError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(TrackerError::InvalidInput(format!(
                "latitude {} outside [-90, 90]",
                lat
            )));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(TrackerError::InvalidInput(format!(
                "longitude {} outside [-180, 180]",
                lng
            )));
        }
        Ok(Self { lat, lng })
    }

    /// Latitude in degrees
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees
    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_position() {
        let p = Position::new(37.7749, -122.4194).unwrap();
        assert_eq!(p.lat(), 37.7749);
        assert_eq!(p.lng(), -122.4194);
    }

    #[test]
    fn test_range_edges_accepted() {
        assert!(Position::new(90.0, 180.0).is_ok());
        assert!(Position::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(matches!(
            Position::new(90.0001, 0.0),
            Err(TrackerError::InvalidInput(_))
        ));
        assert!(matches!(
            Position::new(0.0, -180.5),
            Err(TrackerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(Position::new(f64::NAN, 0.0).is_err());
        assert!(Position::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Position = serde_json::from_str(r#"{"lat":1.5,"lng":2.5}"#).unwrap();
        assert_eq!(ok, Position::new(1.5, 2.5).unwrap());

        let bad = serde_json::from_str::<Position>(r#"{"lat":91.0,"lng":0.0}"#);
        assert!(bad.is_err());
    }
}
