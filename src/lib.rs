pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod geo;
pub mod ledger;
pub mod lifecycle;
pub mod matching;
pub mod notify;
pub mod pricing;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    DebtTransaction, DriverAvailability, DriverId, Location, Money, PassengerId, Ride, RideId,
    RideStatus, TimeMs, TransactionKind, VehicleClass,
};
pub use error::AppError;
pub use ledger::LedgerManager;
pub use lifecycle::RideLifecycle;
pub use matching::RideMatcher;
pub use notify::{NotificationDispatcher, Recipient, TracingDispatcher};
pub use pricing::FareEngine;
