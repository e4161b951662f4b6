//! Driver availability snapshot owned by the driver directory.

use serde::{Deserialize, Serialize};

use super::{DriverId, Location, Money, RideId, TimeMs, VehicleClass};

/// Account status for a driver. Suspension is driven by the debt ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Active,
    Suspended,
}

impl DriverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Active => "active",
            DriverStatus::Suspended => "suspended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(DriverStatus::Active),
            "suspended" => Some(DriverStatus::Suspended),
            _ => None,
        }
    }
}

impl std::fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-driver snapshot: presence, location, current assignment, and the
/// running debt balance the ledger maintains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverAvailability {
    pub id: DriverId,
    pub status: DriverStatus,
    pub vehicle_class: VehicleClass,
    pub location: Option<Location>,
    pub location_updated_at: Option<TimeMs>,
    pub is_online: bool,
    pub is_available: bool,
    pub current_ride_id: Option<RideId>,
    pub current_debt: Money,
    pub wallet_balance: Money,
    pub total_earnings: Money,
    pub total_rides: i64,
}

impl DriverAvailability {
    /// A driver can take work while active and under the debt limit;
    /// the limit check lives in the ledger summary.
    pub fn is_active(&self) -> bool {
        self.status == DriverStatus::Active
    }
}
