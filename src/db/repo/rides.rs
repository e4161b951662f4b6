//! Ride persistence and atomic status transitions.
//!
//! Every transition is a guarded UPDATE: the row changes only if it is
//! still in the expected source state. Losers of a race observe zero
//! affected rows and re-read to classify the failure.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::warn;

use super::ledger::{cas_driver_debt, insert_posting};
use super::{parse_money_column, Repository};
use crate::domain::{
    DebtTransaction, DriverId, Location, Money, PassengerId, Ride, RideId, RideStatus, TimeMs,
    TransactionKind, VehicleClass,
};

/// Fields required to persist a freshly quoted ride in `Requested` state.
#[derive(Debug, Clone)]
pub struct NewRide {
    pub ride_code: String,
    pub passenger_id: PassengerId,
    pub pickup: Location,
    pub destination: Location,
    pub vehicle_class: VehicleClass,
    pub distance_km: f64,
    pub quoted_fare: Money,
    pub commission: Money,
    pub driver_earning: Money,
    pub requested_at: TimeMs,
}

/// Failure modes of the completion transaction.
#[derive(Debug)]
pub enum CompleteError {
    NotFound,
    /// The ride was not in `InProgress` when the guarded update ran.
    NotInProgress(RideStatus),
    /// The ride reached `InProgress` without a driver; data corruption.
    MissingDriver,
    /// The driver's balance moved between read and write; retryable.
    BalanceConflict,
    Db(sqlx::Error),
}

impl From<sqlx::Error> for CompleteError {
    fn from(err: sqlx::Error) -> Self {
        CompleteError::Db(err)
    }
}

fn location_or_origin(lat: f64, lon: f64, ride_id: i64, which: &str) -> Location {
    Location::new(lat, lon).unwrap_or_else(|e| {
        warn!(ride = ride_id, field = which, error = %e, "Stored coordinate failed validation");
        Location::default()
    })
}

pub(crate) fn ride_from_row(row: &SqliteRow) -> Ride {
    let id: i64 = row.get("id");
    let status_str: String = row.get("status");
    let status = RideStatus::parse(&status_str).unwrap_or_else(|| {
        warn!(ride = id, status = %status_str, "Unknown ride status in store, treating as cancelled");
        RideStatus::Cancelled
    });
    let vehicle_str: String = row.get("vehicle_class");
    let quoted_fare: String = row.get("quoted_fare");
    let commission: String = row.get("commission");
    let driver_earning: String = row.get("driver_earning");
    let final_fare: Option<String> = row.get("final_fare");

    Ride {
        id: RideId::new(id),
        ride_code: row.get("ride_code"),
        passenger_id: PassengerId::new(row.get("passenger_id")),
        driver_id: row.get::<Option<i64>, _>("driver_id").map(DriverId::new),
        pickup: location_or_origin(row.get("pickup_lat"), row.get("pickup_lon"), id, "pickup"),
        destination: location_or_origin(row.get("dest_lat"), row.get("dest_lon"), id, "destination"),
        vehicle_class: VehicleClass::parse(&vehicle_str),
        distance_km: row.get("distance_km"),
        quoted_fare: parse_money_column(&quoted_fare, "quoted_fare"),
        final_fare: final_fare
            .as_deref()
            .map(|raw| parse_money_column(raw, "final_fare")),
        commission: parse_money_column(&commission, "commission"),
        driver_earning: parse_money_column(&driver_earning, "driver_earning"),
        status,
        cancellation_reason: row.get("cancellation_reason"),
        requested_at: TimeMs::new(row.get("requested_ms")),
        accepted_at: row.get::<Option<i64>, _>("accepted_ms").map(TimeMs::new),
        started_at: row.get::<Option<i64>, _>("started_ms").map(TimeMs::new),
        completed_at: row.get::<Option<i64>, _>("completed_ms").map(TimeMs::new),
    }
}

const RIDE_COLUMNS: &str = "id, ride_code, passenger_id, driver_id, pickup_lat, pickup_lon, \
     dest_lat, dest_lon, vehicle_class, distance_km, quoted_fare, final_fare, \
     commission, driver_earning, status, cancellation_reason, requested_ms, \
     accepted_ms, started_ms, completed_ms";

impl Repository {
    /// Persist a new ride in `Requested` state and return the stored row.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_requested_ride(&self, new: &NewRide) -> Result<Ride, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO rides (
                ride_code, passenger_id, pickup_lat, pickup_lon, dest_lat, dest_lon,
                vehicle_class, distance_km, quoted_fare, commission, driver_earning,
                status, requested_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'requested', ?)
            "#,
        )
        .bind(&new.ride_code)
        .bind(new.passenger_id.as_i64())
        .bind(new.pickup.latitude())
        .bind(new.pickup.longitude())
        .bind(new.destination.latitude())
        .bind(new.destination.longitude())
        .bind(new.vehicle_class.as_str())
        .bind(new.distance_km)
        .bind(new.quoted_fare.to_canonical_string())
        .bind(new.commission.to_canonical_string())
        .bind(new.driver_earning.to_canonical_string())
        .bind(new.requested_at.as_i64())
        .execute(&self.pool)
        .await?;

        let ride_id = RideId::new(result.last_insert_rowid());
        self.get_ride(ride_id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    /// Fetch a ride by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_ride(&self, ride_id: RideId) -> Result<Option<Ride>, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT {RIDE_COLUMNS} FROM rides WHERE id = ?"))
            .bind(ride_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(ride_from_row))
    }

    /// `Requested → Offered`. Returns false if the ride is no longer in
    /// `Requested`.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn mark_offered(&self, ride_id: RideId) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE rides SET status = 'offered' WHERE id = ? AND status = 'requested'")
                .bind(ride_id.as_i64())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `Requested → NoDriversFound`. Returns false if the ride is no
    /// longer in `Requested`.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn mark_no_drivers_found(&self, ride_id: RideId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE rides SET status = 'no_drivers_found' WHERE id = ? AND status = 'requested'",
        )
        .bind(ride_id.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// The acceptance conditional write: assign the driver and move to
    /// `Accepted` only if the ride is still open and unassigned. The
    /// winner's availability flips in the same transaction; at most one
    /// caller can ever observe true for a given ride.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn try_accept_ride(
        &self,
        ride_id: RideId,
        driver_id: DriverId,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE rides SET driver_id = ?, status = 'accepted', accepted_ms = ?
            WHERE id = ?
              AND status IN ('requested', 'offered')
              AND driver_id IS NULL
            "#,
        )
        .bind(driver_id.as_i64())
        .bind(now.as_i64())
        .bind(ride_id.as_i64())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE drivers SET is_available = 0, current_ride_id = ? WHERE id = ?")
            .bind(ride_id.as_i64())
            .bind(driver_id.as_i64())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// `Accepted → InProgress`, guarded on the assigned driver. Returns
    /// false if the guard misses.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn try_start_ride(
        &self,
        ride_id: RideId,
        driver_id: DriverId,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE rides SET status = 'in_progress', started_ms = ?
            WHERE id = ? AND status = 'accepted' AND driver_id = ?
            "#,
        )
        .bind(now.as_i64())
        .bind(ride_id.as_i64())
        .bind(driver_id.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `InProgress → Completed` plus the commission posting, as one
    /// atomic unit of work. If any step fails the whole transaction
    /// rolls back and the ride stays `InProgress`.
    ///
    /// The commission amount is the split quoted at request time; a
    /// `final_fare` override is recorded but does not reprice it.
    ///
    /// # Errors
    /// See [`CompleteError`]; `BalanceConflict` is retryable.
    pub async fn complete_ride_with_commission(
        &self,
        ride_id: RideId,
        final_fare: Option<Money>,
        description: &str,
        now: TimeMs,
    ) -> Result<(Ride, DebtTransaction), CompleteError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("SELECT {RIDE_COLUMNS} FROM rides WHERE id = ?"))
            .bind(ride_id.as_i64())
            .fetch_optional(&mut *tx)
            .await?;
        let ride = match row.as_ref() {
            Some(row) => ride_from_row(row),
            None => return Err(CompleteError::NotFound),
        };

        if ride.status != RideStatus::InProgress {
            return Err(CompleteError::NotInProgress(ride.status));
        }
        let driver_id = ride.driver_id.ok_or(CompleteError::MissingDriver)?;

        let final_fare = final_fare.unwrap_or(ride.quoted_fare).round_2dp();

        let updated = sqlx::query(
            r#"
            UPDATE rides SET status = 'completed', final_fare = ?, completed_ms = ?
            WHERE id = ? AND status = 'in_progress'
            "#,
        )
        .bind(final_fare.to_canonical_string())
        .bind(now.as_i64())
        .bind(ride_id.as_i64())
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(CompleteError::NotInProgress(RideStatus::Completed));
        }

        let driver_row = sqlx::query(
            "SELECT current_debt, total_earnings FROM drivers WHERE id = ?",
        )
        .bind(driver_id.as_i64())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CompleteError::MissingDriver)?;
        let balance_before: String = driver_row.get("current_debt");
        let balance_before = parse_money_column(&balance_before, "current_debt");
        let earnings: String = driver_row.get("total_earnings");
        let earnings = parse_money_column(&earnings, "total_earnings");

        let balance_after = balance_before + ride.commission;

        let posting_id = insert_posting(
            &mut tx,
            driver_id,
            Some(ride_id),
            TransactionKind::Commission,
            ride.commission,
            description,
            balance_before,
            balance_after,
            now,
        )
        .await?;

        if !cas_driver_debt(&mut tx, driver_id, balance_before, balance_after).await? {
            return Err(CompleteError::BalanceConflict);
        }

        sqlx::query(
            r#"
            UPDATE drivers
            SET total_earnings = ?, total_rides = total_rides + 1,
                is_available = 1, current_ride_id = NULL
            WHERE id = ?
            "#,
        )
        .bind((earnings + ride.driver_earning).to_canonical_string())
        .bind(driver_id.as_i64())
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE passengers SET total_rides = total_rides + 1 WHERE id = ?")
            .bind(ride.passenger_id.as_i64())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let completed = self
            .get_ride(ride_id)
            .await?
            .ok_or(CompleteError::NotFound)?;
        let transaction = DebtTransaction {
            id: posting_id,
            driver_id,
            ride_id: Some(ride_id),
            amount: ride.commission,
            kind: TransactionKind::Commission,
            description: description.to_string(),
            balance_before,
            balance_after,
            created_at: now,
        };

        Ok((completed, transaction))
    }

    /// Cancel from any non-terminal state, recording the reason and
    /// releasing the assigned driver if one exists. Returns false if
    /// the ride was already terminal (or unknown).
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn try_cancel_ride(&self, ride_id: RideId, reason: &str) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE rides SET status = 'cancelled', cancellation_reason = ?
            WHERE id = ?
              AND status IN ('requested', 'offered', 'accepted', 'in_progress')
            "#,
        )
        .bind(reason)
        .bind(ride_id.as_i64())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let driver_id: Option<i64> =
            sqlx::query("SELECT driver_id FROM rides WHERE id = ?")
                .bind(ride_id.as_i64())
                .fetch_one(&mut *tx)
                .await?
                .get("driver_id");
        if let Some(driver_id) = driver_id {
            sqlx::query(
                "UPDATE drivers SET is_available = 1, current_ride_id = NULL WHERE id = ?",
            )
            .bind(driver_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}
