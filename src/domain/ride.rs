//! Ride record and its status state machine.

use serde::{Deserialize, Serialize};

use super::{DriverId, Location, Money, PassengerId, RideId, TimeMs};

/// Ride status, a closed set of tagged variants.
///
/// Allowed paths:
/// `Requested → Offered → Accepted → InProgress → Completed`, with
/// `NoDriversFound` reachable from `Requested` and `Cancelled` from any
/// non-terminal state. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Requested,
    Offered,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
    NoDriversFound,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Requested => "requested",
            RideStatus::Offered => "offered",
            RideStatus::Accepted => "accepted",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
            RideStatus::NoDriversFound => "no_drivers_found",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requested" => Some(RideStatus::Requested),
            "offered" => Some(RideStatus::Offered),
            "accepted" => Some(RideStatus::Accepted),
            "in_progress" => Some(RideStatus::InProgress),
            "completed" => Some(RideStatus::Completed),
            "cancelled" => Some(RideStatus::Cancelled),
            "no_drivers_found" => Some(RideStatus::NoDriversFound),
            _ => None,
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RideStatus::Completed | RideStatus::Cancelled | RideStatus::NoDriversFound
        )
    }

    /// States from which a driver's conditional accept can still win.
    pub fn is_acceptable(&self) -> bool {
        matches!(self, RideStatus::Requested | RideStatus::Offered)
    }
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Vehicle class requested by the passenger; scales the fare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Standard,
    Premium,
    Luxury,
    Van,
    Motorcycle,
}

impl VehicleClass {
    /// Parse a class name; unrecognized classes fall back to Standard,
    /// which carries the neutral 1.0 multiplier.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "premium" => VehicleClass::Premium,
            "luxury" => VehicleClass::Luxury,
            "van" => VehicleClass::Van,
            "motorcycle" => VehicleClass::Motorcycle,
            _ => VehicleClass::Standard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Standard => "standard",
            VehicleClass::Premium => "premium",
            VehicleClass::Luxury => "luxury",
            VehicleClass::Van => "van",
            VehicleClass::Motorcycle => "motorcycle",
        }
    }

    /// Fare multiplier for this class.
    pub fn fare_multiplier(&self) -> f64 {
        match self {
            VehicleClass::Standard => 1.0,
            VehicleClass::Premium => 1.5,
            VehicleClass::Luxury => 2.0,
            VehicleClass::Van => 1.3,
            VehicleClass::Motorcycle => 0.8,
        }
    }
}

impl std::fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ride, from request to terminal state. Never deleted; this is the
/// audit record of the trip and its quoted money split.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ride {
    pub id: RideId,
    /// Human-facing code, e.g. `RIDE-20250301-1a2b3c4d`.
    pub ride_code: String,
    pub passenger_id: PassengerId,
    pub driver_id: Option<DriverId>,
    pub pickup: Location,
    pub destination: Location,
    pub vehicle_class: VehicleClass,
    pub distance_km: f64,
    pub quoted_fare: Money,
    pub final_fare: Option<Money>,
    pub commission: Money,
    pub driver_earning: Money,
    pub status: RideStatus,
    pub cancellation_reason: Option<String>,
    pub requested_at: TimeMs,
    pub accepted_at: Option<TimeMs>,
    pub started_at: Option<TimeMs>,
    pub completed_at: Option<TimeMs>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_string_roundtrip() {
        for status in [
            RideStatus::Requested,
            RideStatus::Offered,
            RideStatus::Accepted,
            RideStatus::InProgress,
            RideStatus::Completed,
            RideStatus::Cancelled,
            RideStatus::NoDriversFound,
        ] {
            assert_eq!(RideStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RideStatus::parse("pending"), None);
    }

    #[test]
    fn terminal_states_are_exactly_three() {
        assert!(RideStatus::Completed.is_terminal());
        assert!(RideStatus::Cancelled.is_terminal());
        assert!(RideStatus::NoDriversFound.is_terminal());
        assert!(!RideStatus::Requested.is_terminal());
        assert!(!RideStatus::Offered.is_terminal());
        assert!(!RideStatus::Accepted.is_terminal());
        assert!(!RideStatus::InProgress.is_terminal());
    }

    #[test]
    fn accept_window_is_requested_or_offered() {
        assert!(RideStatus::Requested.is_acceptable());
        assert!(RideStatus::Offered.is_acceptable());
        assert!(!RideStatus::Accepted.is_acceptable());
        assert!(!RideStatus::Completed.is_acceptable());
    }

    #[test]
    fn unknown_vehicle_class_falls_back_to_standard() {
        assert_eq!(VehicleClass::parse("hovercraft"), VehicleClass::Standard);
        assert_eq!(VehicleClass::parse("PREMIUM"), VehicleClass::Premium);
    }

    #[test]
    fn vehicle_multipliers() {
        assert_eq!(VehicleClass::Standard.fare_multiplier(), 1.0);
        assert_eq!(VehicleClass::Premium.fare_multiplier(), 1.5);
        assert_eq!(VehicleClass::Luxury.fare_multiplier(), 2.0);
        assert_eq!(VehicleClass::Van.fare_multiplier(), 1.3);
        assert_eq!(VehicleClass::Motorcycle.fare_multiplier(), 0.8);
    }
}
