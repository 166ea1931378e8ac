//! Geographic position and great-circle distances.
//!

use geo::{point, HaversineDistance};
use serde::{Deserialize, Serialize};

/// This structure hold a general location object with lon/lat, in signed degrees (WGS84).
///
/// Longitude comes first, as in every geospatial interchange format we write.
///
#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Position {
    /// Longitude in degrees, east positive
    pub longitude: f64,
    /// Latitude in degrees, north positive
    pub latitude: f64,
}

impl Position {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Position {
            longitude,
            latitude,
        }
    }

    /// Great-circle distance in meters on a spherical earth (haversine, mean earth radius).
    ///
    pub fn distance_to(&self, other: &Position) -> f64 {
        let p1 = point!(x: self.longitude, y: self.latitude);
        let p2 = point!(x: other.longitude, y: other.latitude);
        p1.haversine_distance(&p2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_default() {
        let p = Position::default();
        assert_eq!(
            Position {
                longitude: 0.0,
                latitude: 0.0,
            },
            p
        );
    }

    #[test]
    fn test_distance_same_point() {
        let p = Position::new(-76.0, 39.0);
        assert_eq!(0.0, p.distance_to(&p));
    }

    #[test]
    fn test_distance_one_degree_of_latitude() {
        // 2 * pi * R / 360 with R = 6371008.8 m
        let a = Position::new(-76.0, 39.0);
        let b = Position::new(-76.0, 40.0);
        let d = a.distance_to(&b);
        assert!((d - 111_195.08).abs() < 1.0, "d = {d}");
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = Position::new(-77.48778502911327, 39.64903419561805);
        let b = Position::new(-77.44135081354383, 39.64435087129784);
        assert!((a.distance_to(&b) - b.distance_to(&a)).abs() < 1e-6);
    }
}
