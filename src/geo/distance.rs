//! Great-circle distance

use super::position::Position;

/// Mean Earth radius used for all distance math
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometres between two coordinates in degrees
///
/// Callers validate ranges first; out-of-range input yields meaningless but
/// non-panicking output.
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` a hair above 1 for antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Distance between two validated positions
pub fn distance(a: Position, b: Position) -> f64 {
    haversine(a.lat(), a.lng(), b.lat(), b.lng())
}

/// Round a distance to one decimal for presentation
pub fn round_km(km: f64) -> f64 {
    (km * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[(f64, f64)] = &[
        (0.0, 0.0),
        (37.7749, -122.4194),
        (-33.8688, 151.2093),
        (51.5074, -0.1278),
        (89.9, 45.0),
        (-89.5, -170.0),
        (0.0, 179.99),
        (0.0, -179.99),
    ];

    #[test]
    fn test_same_point_is_zero() {
        for &(lat, lng) in SAMPLES {
            assert_eq!(haversine(lat, lng, lat, lng), 0.0);
        }
    }

    #[test]
    fn test_symmetric() {
        for &(lat1, lng1) in SAMPLES {
            for &(lat2, lng2) in SAMPLES {
                let ab = haversine(lat1, lng1, lat2, lng2);
                let ba = haversine(lat2, lng2, lat1, lng1);
                assert!((ab - ba).abs() < 1e-9, "{} vs {}", ab, ba);
            }
        }
    }

    #[test]
    fn test_triangle_inequality() {
        for &a in SAMPLES {
            for &b in SAMPLES {
                for &c in SAMPLES {
                    let ab = haversine(a.0, a.1, b.0, b.1);
                    let bc = haversine(b.0, b.1, c.0, c.1);
                    let ac = haversine(a.0, a.1, c.0, c.1);
                    assert!(ac <= ab + bc + 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_known_distances() {
        // One hundredth of a degree along the equator
        let near = haversine(0.0, 0.0, 0.01, 0.0);
        assert!((near - 1.112).abs() < 0.01);

        // One degree of latitude
        let far = haversine(0.0, 0.0, 1.0, 0.0);
        assert!((far - 111.195).abs() < 0.01);

        // Across the antimeridian is short, not half the globe
        let wrap = haversine(0.0, 179.99, 0.0, -179.99);
        assert!(wrap < 2.5);
    }

    #[test]
    fn test_antipodal_is_finite() {
        let d = haversine(0.0, 0.0, 0.0, 180.0);
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn test_round_km() {
        assert_eq!(round_km(0.014), 0.0);
        assert_eq!(round_km(1.11), 1.1);
        assert_eq!(round_km(111.19), 111.2);
    }
}
