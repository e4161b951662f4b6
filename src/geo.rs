//! Great-circle distance and travel-time estimation.
//!
//! Pure functions; every fare quote and candidate ranking goes through
//! `distance_km`.

use serde::Serialize;

use crate::domain::Location;

/// Mean Earth radius in kilometers, for the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Assumed average urban speed for travel-time estimates.
const AVG_SPEED_KMH: f64 = 40.0;

/// Fixed pickup overhead added to every estimate, in minutes.
const PICKUP_OVERHEAD_MIN: f64 = 5.0;

/// Default congestion multiplier when the caller has no better signal.
pub const DEFAULT_TRAFFIC_FACTOR: f64 = 1.2;

/// Haversine distance between two points, in kilometers.
///
/// Deterministic and symmetric; `distance_km(a, a)` is 0.
pub fn distance_km(a: Location, b: Location) -> f64 {
    let lat1 = a.latitude().to_radians();
    let lat2 = b.latitude().to_radians();
    let dlat = (b.latitude() - a.latitude()).to_radians();
    let dlon = (b.longitude() - a.longitude()).to_radians();

    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;

    EARTH_RADIUS_KM * 2.0 * h.sqrt().asin()
}

/// Travel-time estimate for a given trip distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TravelTimeEstimate {
    pub distance_km: f64,
    /// Minutes at average speed, before traffic.
    pub base_minutes: f64,
    pub traffic_factor: f64,
    /// Base minutes scaled by traffic plus the pickup overhead.
    pub total_minutes: f64,
}

/// Estimate travel time in minutes: distance at 40 km/h, scaled by the
/// traffic factor, plus a fixed 5-minute pickup overhead.
pub fn estimate_travel_time(distance_km: f64, traffic_factor: f64) -> TravelTimeEstimate {
    let base_minutes = distance_km / AVG_SPEED_KMH * 60.0;
    let total_minutes = base_minutes * traffic_factor + PICKUP_OVERHEAD_MIN;
    TravelTimeEstimate {
        distance_km,
        base_minutes,
        traffic_factor,
        total_minutes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(lat: f64, lon: f64) -> Location {
        Location::new(lat, lon).expect("valid test coordinates")
    }

    #[test]
    fn distance_is_symmetric() {
        let a = loc(24.7136, 46.6753);
        let b = loc(24.6408, 46.7728);
        assert!((distance_km(a, b) - distance_km(b, a)).abs() < 1e-12);
    }

    #[test]
    fn distance_to_self_is_zero() {
        let a = loc(24.7136, 46.6753);
        assert_eq!(distance_km(a, a), 0.0);
    }

    #[test]
    fn riyadh_crosstown_distance() {
        let a = loc(24.7136, 46.6753);
        let b = loc(24.6408, 46.7728);
        let d = distance_km(a, b);
        assert!((d - 12.7506).abs() < 0.001, "got {}", d);
    }

    #[test]
    fn antipodal_distance_is_half_circumference() {
        let a = loc(0.0, 0.0);
        let b = loc(0.0, 180.0);
        let d = distance_km(a, b);
        let half = std::f64::consts::PI * EARTH_RADIUS_KM;
        assert!((d - half).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn travel_time_formula() {
        // 20 km at 40 km/h = 30 min, x1.2 traffic = 36, +5 pickup = 41.
        let est = estimate_travel_time(20.0, DEFAULT_TRAFFIC_FACTOR);
        assert!((est.base_minutes - 30.0).abs() < 1e-9);
        assert!((est.total_minutes - 41.0).abs() < 1e-9);
    }

    #[test]
    fn zero_distance_still_has_pickup_overhead() {
        let est = estimate_travel_time(0.0, 1.0);
        assert_eq!(est.total_minutes, 5.0);
    }
}
