//! Geographic coordinates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A validated latitude/longitude pair in degrees.
///
/// Construction is the only validation point: any `Location` in the
/// system holds in-range coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Error, PartialEq)]
#[error("coordinates out of range: ({latitude}, {longitude})")]
pub struct InvalidCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// Create a location, rejecting out-of-range or non-finite coordinates.
    ///
    /// # Errors
    /// Returns `InvalidCoordinates` unless −90 ≤ lat ≤ 90 and −180 ≤ lon ≤ 180.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidCoordinates> {
        let lat_ok = latitude.is_finite() && (-90.0..=90.0).contains(&latitude);
        let lon_ok = longitude.is_finite() && (-180.0..=180.0).contains(&longitude);
        if lat_ok && lon_ok {
            Ok(Location {
                latitude,
                longitude,
            })
        } else {
            Err(InvalidCoordinates {
                latitude,
                longitude,
            })
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl Default for Location {
    /// The null island origin; used as a last-resort fallback when a
    /// stored coordinate fails re-validation.
    fn default() -> Self {
        Location {
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_in_range_coordinates() {
        assert!(Location::new(24.7136, 46.6753).is_ok());
        assert!(Location::new(-90.0, 180.0).is_ok());
        assert!(Location::new(0.0, 0.0).is_ok());
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(Location::new(91.0, 0.0).is_err());
        assert!(Location::new(-90.1, 0.0).is_err());
        assert!(Location::new(0.0, 180.5).is_err());
        assert!(Location::new(0.0, -181.0).is_err());
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        assert!(Location::new(f64::NAN, 0.0).is_err());
        assert!(Location::new(0.0, f64::INFINITY).is_err());
    }
}
