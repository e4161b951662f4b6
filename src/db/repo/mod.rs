//! Repository layer for database operations.
//!
//! Methods are organized across submodules by domain:
//! - `drivers.rs` - driver directory: presence, location, suspension
//! - `rides.rs` - ride records and atomic status transitions
//! - `ledger.rs` - append-only debt transactions and balance updates

mod drivers;
mod ledger;
mod rides;

pub use ledger::{LedgerPosting, PostError};
pub use rides::{CompleteError, NewRide};

use crate::domain::{Money, PassengerId, TimeMs};
use sqlx::sqlite::SqlitePool;
use tracing::warn;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").finish_non_exhaustive()
    }
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Ensure a passenger row exists, creating it on first contact.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn ensure_passenger(
        &self,
        passenger_id: PassengerId,
        now: TimeMs,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO passengers (id, created_ms)
            VALUES (?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(passenger_id.as_i64())
        .bind(now.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Total completed rides recorded for a passenger.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn passenger_ride_count(
        &self,
        passenger_id: PassengerId,
    ) -> Result<Option<i64>, sqlx::Error> {
        use sqlx::Row;
        let row = sqlx::query("SELECT total_rides FROM passengers WHERE id = ?")
            .bind(passenger_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("total_rides")))
    }
}

/// Parse a TEXT decimal column, falling back to zero with a warning on
/// corrupt data rather than failing the whole query.
pub(crate) fn parse_money_column(raw: &str, column: &str) -> Money {
    Money::from_str_canonical(raw).unwrap_or_else(|e| {
        warn!(
            column = %column,
            value = %raw,
            error = %e,
            "Failed to parse stored decimal, using zero"
        );
        Money::zero()
    })
}
