//! Great-circle distance checks between the user and a spot.

use geo::Point;

use crate::models::Coordinates;

/// Earth radius used by [`distance`], in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters between two lat/long positions.
pub fn distance(user_lat: f64, user_long: f64, point_lat: f64, point_long: f64) -> f64 {
    let phi1 = user_lat.to_radians();
    let phi2 = point_lat.to_radians();
    // Absolute deltas keep the result bit-for-bit symmetric
    let d_phi = (point_lat - user_lat).abs().to_radians();
    let d_lambda = (point_long - user_long).abs().to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Distance between two points (x = longitude, y = latitude)
pub fn point_distance(a: Point<f64>, b: Point<f64>) -> f64 {
    distance(a.y(), a.x(), b.y(), b.x())
}

/// Inclusive: a distance exactly at the threshold counts as within.
pub fn within_threshold(distance_m: f64, threshold_m: f64) -> bool {
    distance_m <= threshold_m
}

/// Decides whether the user is close enough to a spot to rate it.
#[derive(Debug, Clone, Copy)]
pub struct ProximityGate {
    threshold_m: f64,
}

impl ProximityGate {
    pub fn new(threshold_m: f64) -> Self {
        Self { threshold_m }
    }

    pub fn threshold_m(&self) -> f64 {
        self.threshold_m
    }

    pub fn distance(&self, user: Coordinates, spot: Coordinates) -> f64 {
        point_distance(user.into(), spot.into())
    }

    pub fn allows(&self, user: Coordinates, spot: Coordinates) -> bool {
        within_threshold(self.distance(user, spot), self.threshold_m)
    }
}

impl Default for ProximityGate {
    fn default() -> Self {
        Self::new(500.0)
    }
}
