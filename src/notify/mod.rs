//! Outbound notifications to passengers and drivers.
//!
//! The core calls the dispatcher and moves on: delivery is best-effort
//! and a failed send never fails the operation that triggered it.

use async_trait::async_trait;
use std::fmt;

use crate::domain::{DriverId, PassengerId};

pub mod mock;

pub use mock::RecordingDispatcher;

/// Who a notification is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipient {
    Passenger(PassengerId),
    Driver(DriverId),
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Passenger(id) => write!(f, "passenger:{}", id),
            Recipient::Driver(id) => write!(f, "driver:{}", id),
        }
    }
}

/// Fire-and-forget notification port.
///
/// Implementations own their own delivery, retries, and failure
/// handling; callers never observe a delivery error.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync + fmt::Debug {
    async fn dispatch(&self, recipient: Recipient, message: &str);
}

/// Dispatcher that writes notifications to the log. Stands in for a
/// real delivery channel such as push or SMS.
#[derive(Debug, Clone, Default)]
pub struct TracingDispatcher;

impl TracingDispatcher {
    pub fn new() -> Self {
        TracingDispatcher
    }
}

#[async_trait]
impl NotificationDispatcher for TracingDispatcher {
    async fn dispatch(&self, recipient: Recipient, message: &str) {
        tracing::info!(recipient = %recipient, message = %message, "notification");
    }
}
