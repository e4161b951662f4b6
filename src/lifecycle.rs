//! The ride state machine: request, offer fan-out, acceptance, start,
//! completion, cancellation.
//!
//! Transitions are guarded conditional writes in the repository; this
//! module classifies their outcomes, drives the ledger at completion,
//! and notifies the parties involved.

use backoff::future::retry;
use backoff::ExponentialBackoff;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::MatchingConfig;
use crate::db::repo::{CompleteError, NewRide};
use crate::db::Repository;
use crate::domain::{
    DriverId, Location, Money, PassengerId, Ride, RideId, RideStatus, TimeMs, VehicleClass,
};
use crate::error::AppError;
use crate::geo::{self, TravelTimeEstimate};
use crate::ledger::LedgerManager;
use crate::matching::RideMatcher;
use crate::notify::{NotificationDispatcher, Recipient};
use crate::pricing::{FareBreakdown, FareEngine};

/// Result of a ride request: the persisted ride (possibly already in
/// `NoDriversFound`), the quote it was priced with, and the fan-out
/// headcount.
#[derive(Debug, Clone)]
pub struct RideRequestOutcome {
    pub ride: Ride,
    pub fare: FareBreakdown,
    pub eta: TravelTimeEstimate,
    pub drivers_notified: usize,
}

pub struct RideLifecycle {
    repo: Arc<Repository>,
    fare_engine: FareEngine,
    matcher: RideMatcher,
    ledger: Arc<LedgerManager>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    matching: MatchingConfig,
}

impl RideLifecycle {
    pub fn new(
        repo: Arc<Repository>,
        fare_engine: FareEngine,
        matcher: RideMatcher,
        ledger: Arc<LedgerManager>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        matching: MatchingConfig,
    ) -> Self {
        RideLifecycle {
            repo,
            fare_engine,
            matcher,
            ledger,
            dispatcher,
            matching,
        }
    }

    /// Quote, persist, match, and fan out offers for a new ride.
    ///
    /// With zero candidates in range the ride lands in `NoDriversFound`
    /// and no offers go out; otherwise it moves to `Offered` and the
    /// closest drivers are notified (best-effort).
    ///
    /// # Errors
    /// `Validation` for bad input; storage errors pass through.
    pub async fn request_ride(
        &self,
        passenger_id: PassengerId,
        pickup: Location,
        destination: Location,
        vehicle_class: VehicleClass,
    ) -> Result<RideRequestOutcome, AppError> {
        let now = Utc::now();
        let fare = self
            .fare_engine
            .quote(pickup, destination, vehicle_class, now)?;
        let eta = geo::estimate_travel_time(fare.distance_km, self.matching.traffic_factor);

        self.repo.ensure_passenger(passenger_id, TimeMs::now()).await?;

        let candidates = self
            .matcher
            .find_candidates(
                pickup,
                self.matching.search_radius_km,
                self.matching.candidate_limit,
            )
            .await?;

        let ride = self
            .repo
            .insert_requested_ride(&NewRide {
                ride_code: ride_code(now),
                passenger_id,
                pickup,
                destination,
                vehicle_class,
                distance_km: fare.distance_km,
                quoted_fare: fare.total_fare,
                commission: fare.commission,
                driver_earning: fare.driver_earning,
                requested_at: TimeMs::new(now.timestamp_millis()),
            })
            .await?;

        if candidates.is_empty() {
            self.repo.mark_no_drivers_found(ride.id).await?;
            self.dispatcher
                .dispatch(
                    Recipient::Passenger(passenger_id),
                    "No drivers are available near you right now. Please try again later.",
                )
                .await;
            let ride = self.reload(ride.id).await?;
            return Ok(RideRequestOutcome {
                ride,
                fare,
                eta,
                drivers_notified: 0,
            });
        }

        self.repo.mark_offered(ride.id).await?;

        let mut drivers_notified = 0;
        for candidate in candidates.iter().take(self.matching.offer_fanout) {
            self.dispatcher
                .dispatch(
                    Recipient::Driver(candidate.driver_id),
                    &format!(
                        "New ride request {}: pickup {:.2} km away, trip {:.2} km, fare {}, your earning {}.",
                        ride.ride_code,
                        candidate.distance_km,
                        fare.distance_km,
                        fare.total_fare,
                        fare.driver_earning
                    ),
                )
                .await;
            drivers_notified += 1;
        }

        self.dispatcher
            .dispatch(
                Recipient::Passenger(passenger_id),
                &format!(
                    "Ride {} requested. Offer sent to {} nearby driver(s).",
                    ride.ride_code, drivers_notified
                ),
            )
            .await;

        let ride = self.reload(ride.id).await?;
        Ok(RideRequestOutcome {
            ride,
            fare,
            eta,
            drivers_notified,
        })
    }

    /// A driver's attempt to take the ride. Exactly one caller wins the
    /// conditional write; everyone else gets `AlreadyTaken` (or
    /// `InvalidTransition` if the ride ended first).
    ///
    /// # Errors
    /// `NotFound`, `AlreadyTaken`, `InvalidTransition`, or `Validation`
    /// when the driver cannot take work.
    pub async fn accept_ride(
        &self,
        ride_id: RideId,
        driver_id: DriverId,
    ) -> Result<Ride, AppError> {
        let driver = self
            .repo
            .get_driver(driver_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("driver {}", driver_id)))?;
        if !driver.is_active() {
            return Err(AppError::Validation(format!(
                "driver {} is suspended",
                driver_id
            )));
        }
        if !driver.is_online {
            return Err(AppError::Validation(format!(
                "driver {} is offline",
                driver_id
            )));
        }

        if self
            .repo
            .try_accept_ride(ride_id, driver_id, TimeMs::now())
            .await?
        {
            let ride = self.reload(ride_id).await?;
            self.dispatcher
                .dispatch(
                    Recipient::Passenger(ride.passenger_id),
                    &format!(
                        "Your ride {} was accepted by driver {}.",
                        ride.ride_code, driver_id
                    ),
                )
                .await;
            return Ok(ride);
        }

        // Lost the conditional write; re-read to say why.
        match self.repo.get_ride(ride_id).await? {
            None => Err(AppError::NotFound(format!("ride {}", ride_id))),
            Some(ride)
                if matches!(
                    ride.status,
                    RideStatus::Cancelled | RideStatus::NoDriversFound
                ) =>
            {
                Err(AppError::InvalidTransition(format!(
                    "ride {} cannot be accepted from state {}",
                    ride_id, ride.status
                )))
            }
            Some(ride) if ride.driver_id.is_some() => Err(AppError::AlreadyTaken(ride_id)),
            Some(ride) => Err(AppError::InvalidTransition(format!(
                "ride {} cannot be accepted from state {}",
                ride_id, ride.status
            ))),
        }
    }

    /// `Accepted → InProgress`, only by the assigned driver.
    ///
    /// # Errors
    /// `NotFound` or `InvalidTransition`.
    pub async fn start_ride(&self, ride_id: RideId, driver_id: DriverId) -> Result<Ride, AppError> {
        if self
            .repo
            .try_start_ride(ride_id, driver_id, TimeMs::now())
            .await?
        {
            let ride = self.reload(ride_id).await?;
            self.dispatcher
                .dispatch(
                    Recipient::Passenger(ride.passenger_id),
                    &format!("Your ride {} has started.", ride.ride_code),
                )
                .await;
            return Ok(ride);
        }

        match self.repo.get_ride(ride_id).await? {
            None => Err(AppError::NotFound(format!("ride {}", ride_id))),
            Some(ride) if ride.driver_id != Some(driver_id) => Err(AppError::InvalidTransition(
                format!("ride {} is not assigned to driver {}", ride_id, driver_id),
            )),
            Some(ride) => Err(AppError::InvalidTransition(format!(
                "ride {} cannot start from state {}",
                ride_id, ride.status
            ))),
        }
    }

    /// `InProgress → Completed` with the commission posting in the same
    /// unit of work; threshold evaluation follows on the new balance.
    ///
    /// # Errors
    /// `NotFound`, `InvalidTransition`, or `Conflict` when the balance
    /// retry budget is exhausted.
    pub async fn complete_ride(
        &self,
        ride_id: RideId,
        final_fare: Option<Money>,
    ) -> Result<Ride, AppError> {
        if let Some(fare) = final_fare {
            if fare.is_negative() {
                return Err(AppError::Validation(
                    "final fare must not be negative".to_string(),
                ));
            }
        }

        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(20),
            max_interval: Duration::from_millis(100),
            max_elapsed_time: Some(Duration::from_millis(300)),
            ..ExponentialBackoff::default()
        };

        let (ride, transaction) = retry(policy, || async {
            let description = format!("Ride commission ({})", ride_id);
            match self
                .repo
                .complete_ride_with_commission(ride_id, final_fare, &description, TimeMs::now())
                .await
            {
                Ok(outcome) => Ok(outcome),
                Err(CompleteError::BalanceConflict) => Err(backoff::Error::transient(
                    AppError::Conflict("concurrent ledger update".to_string()),
                )),
                Err(CompleteError::NotFound) => Err(backoff::Error::permanent(
                    AppError::NotFound(format!("ride {}", ride_id)),
                )),
                Err(CompleteError::NotInProgress(status)) => {
                    Err(backoff::Error::permanent(AppError::InvalidTransition(
                        format!("ride {} cannot complete from state {}", ride_id, status),
                    )))
                }
                Err(CompleteError::MissingDriver) => Err(backoff::Error::permanent(
                    AppError::Internal(format!("ride {} has no assigned driver", ride_id)),
                )),
                Err(CompleteError::Db(e)) => Err(backoff::Error::permanent(e.into())),
            }
        })
        .await?;

        if let Some(driver_id) = ride.driver_id {
            self.ledger
                .evaluate_thresholds(driver_id, transaction.balance_after)
                .await?;
            self.dispatcher
                .dispatch(
                    Recipient::Driver(driver_id),
                    &format!(
                        "Ride {} completed. Your earning: {}. Commission {} added to your balance.",
                        ride.ride_code, ride.driver_earning, transaction.amount
                    ),
                )
                .await;
        }
        self.dispatcher
            .dispatch(
                Recipient::Passenger(ride.passenger_id),
                &format!(
                    "Ride {} completed. Fare: {}.",
                    ride.ride_code,
                    ride.final_fare.unwrap_or(ride.quoted_fare)
                ),
            )
            .await;

        Ok(ride)
    }

    /// Cancel from any non-terminal state, releasing the assigned driver.
    ///
    /// # Errors
    /// `Validation` for an empty reason, `NotFound`, or
    /// `InvalidTransition` when the ride already ended.
    pub async fn cancel_ride(&self, ride_id: RideId, reason: &str) -> Result<Ride, AppError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::Validation(
                "cancellation reason must not be empty".to_string(),
            ));
        }

        if self.repo.try_cancel_ride(ride_id, reason).await? {
            let ride = self.reload(ride_id).await?;
            self.dispatcher
                .dispatch(
                    Recipient::Passenger(ride.passenger_id),
                    &format!("Ride {} was cancelled: {}", ride.ride_code, reason),
                )
                .await;
            if let Some(driver_id) = ride.driver_id {
                self.dispatcher
                    .dispatch(
                        Recipient::Driver(driver_id),
                        &format!("Ride {} was cancelled: {}", ride.ride_code, reason),
                    )
                    .await;
            }
            return Ok(ride);
        }

        match self.repo.get_ride(ride_id).await? {
            None => Err(AppError::NotFound(format!("ride {}", ride_id))),
            Some(ride) => Err(AppError::InvalidTransition(format!(
                "ride {} cannot be cancelled from state {}",
                ride_id, ride.status
            ))),
        }
    }

    /// Fetch a ride for status display.
    ///
    /// # Errors
    /// `NotFound` for an unknown ride.
    pub async fn ride_status(&self, ride_id: RideId) -> Result<Ride, AppError> {
        self.reload(ride_id).await
    }

    async fn reload(&self, ride_id: RideId) -> Result<Ride, AppError> {
        self.repo
            .get_ride(ride_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("ride {}", ride_id)))
    }
}

/// Human-facing ride code, e.g. `RIDE-20250301-1a2b3c4d`.
fn ride_code(now: chrono::DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("RIDE-{}-{}", now.format("%Y%m%d"), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ride_codes_carry_date_and_unique_suffix() {
        let now = Utc::now();
        let a = ride_code(now);
        let b = ride_code(now);
        assert!(a.starts_with("RIDE-"));
        assert_eq!(a.len(), "RIDE-".len() + 8 + 1 + 8);
        assert_ne!(a, b);
    }
}
