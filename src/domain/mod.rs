//! Domain types for the dispatch core.
//!
//! This module provides:
//! - Exact monetary arithmetic via the Money wrapper
//! - Validated geographic coordinates
//! - Ride, driver, and debt ledger records with closed status enums

pub mod driver;
pub mod ledger;
pub mod location;
pub mod money;
pub mod primitives;
pub mod ride;

pub use driver::{DriverAvailability, DriverStatus};
pub use ledger::{DebtTransaction, TransactionKind};
pub use location::{InvalidCoordinates, Location};
pub use money::Money;
pub use primitives::{DriverId, PassengerId, RideId, TimeMs};
pub use ride::{Ride, RideStatus, VehicleClass};
