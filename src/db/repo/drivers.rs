//! Driver directory operations: registration, presence, location, and
//! the suspension flag the ledger toggles.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::warn;

use super::{parse_money_column, Repository};
use crate::domain::{
    DriverAvailability, DriverId, DriverStatus, Location, RideId, TimeMs, VehicleClass,
};

pub(crate) fn driver_from_row(row: &SqliteRow) -> DriverAvailability {
    let id: i64 = row.get("id");
    let status_str: String = row.get("status");
    let status = DriverStatus::parse(&status_str).unwrap_or_else(|| {
        warn!(driver = id, status = %status_str, "Unknown driver status in store, treating as suspended");
        DriverStatus::Suspended
    });
    let vehicle_str: String = row.get("vehicle_class");

    let latitude: Option<f64> = row.get("latitude");
    let longitude: Option<f64> = row.get("longitude");
    let location = match (latitude, longitude) {
        (Some(lat), Some(lon)) => Location::new(lat, lon).ok(),
        _ => None,
    };

    let current_debt: String = row.get("current_debt");
    let wallet_balance: String = row.get("wallet_balance");
    let total_earnings: String = row.get("total_earnings");

    DriverAvailability {
        id: DriverId::new(id),
        status,
        vehicle_class: VehicleClass::parse(&vehicle_str),
        location,
        location_updated_at: row
            .get::<Option<i64>, _>("location_updated_ms")
            .map(TimeMs::new),
        is_online: row.get::<i64, _>("is_online") != 0,
        is_available: row.get::<i64, _>("is_available") != 0,
        current_ride_id: row.get::<Option<i64>, _>("current_ride_id").map(RideId::new),
        current_debt: parse_money_column(&current_debt, "current_debt"),
        wallet_balance: parse_money_column(&wallet_balance, "wallet_balance"),
        total_earnings: parse_money_column(&total_earnings, "total_earnings"),
        total_rides: row.get("total_rides"),
    }
}

const DRIVER_COLUMNS: &str = "id, status, vehicle_class, latitude, longitude, \
     location_updated_ms, is_online, is_available, current_ride_id, \
     current_debt, wallet_balance, total_earnings, total_rides";

impl Repository {
    /// Register a driver or update the vehicle class of an existing one.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn upsert_driver(
        &self,
        driver_id: DriverId,
        vehicle_class: VehicleClass,
        now: TimeMs,
    ) -> Result<DriverAvailability, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO drivers (id, vehicle_class, created_ms)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET vehicle_class = excluded.vehicle_class
            "#,
        )
        .bind(driver_id.as_i64())
        .bind(vehicle_class.as_str())
        .bind(now.as_i64())
        .execute(&self.pool)
        .await?;

        self.get_driver(driver_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Fetch one driver's availability snapshot.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_driver(
        &self,
        driver_id: DriverId,
    ) -> Result<Option<DriverAvailability>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {DRIVER_COLUMNS} FROM drivers WHERE id = ?"
        ))
        .bind(driver_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(driver_from_row))
    }

    /// Toggle a driver's online/available flags. Returns false if the
    /// driver does not exist.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn set_driver_presence(
        &self,
        driver_id: DriverId,
        is_online: bool,
        is_available: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE drivers SET is_online = ?, is_available = ?
            WHERE id = ?
            "#,
        )
        .bind(is_online as i64)
        .bind(is_available as i64)
        .bind(driver_id.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a driver's latest location. Returns false if the driver
    /// does not exist.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn set_driver_location(
        &self,
        driver_id: DriverId,
        location: Location,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE drivers SET latitude = ?, longitude = ?, location_updated_ms = ?
            WHERE id = ?
            "#,
        )
        .bind(location.latitude())
        .bind(location.longitude())
        .bind(now.as_i64())
        .bind(driver_id.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All drivers the matcher may consider: active, online, available,
    /// with a known location. Ordered by id for deterministic iteration.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn matchable_drivers(&self) -> Result<Vec<DriverAvailability>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {DRIVER_COLUMNS} FROM drivers
            WHERE status = 'active'
              AND is_online = 1
              AND is_available = 1
              AND latitude IS NOT NULL
              AND longitude IS NOT NULL
            ORDER BY id ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(driver_from_row).collect())
    }

    /// Take a driver offline and mark the account suspended.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn suspend_driver(&self, driver_id: DriverId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE drivers SET status = 'suspended', is_online = 0 WHERE id = ?")
            .bind(driver_id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Restore a suspended driver to active and re-enable online mode.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn reactivate_driver(&self, driver_id: DriverId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE drivers SET status = 'active', is_online = 1 WHERE id = ?")
            .bind(driver_id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
