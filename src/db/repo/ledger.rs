//! Debt ledger persistence: append-only postings and the compare-and-swap
//! balance update that keeps the running balance consistent with the
//! transaction chain.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};

use super::{parse_money_column, Repository};
use crate::domain::{DebtTransaction, DriverId, Money, RideId, TimeMs, TransactionKind};

/// A posting to apply to one driver's ledger.
#[derive(Debug, Clone)]
pub struct LedgerPosting {
    pub driver_id: DriverId,
    pub ride_id: Option<RideId>,
    pub kind: TransactionKind,
    /// Signed: positive increases debt, negative decreases it.
    pub amount: Money,
    pub description: String,
    /// Clamp a negative amount so the balance never goes below zero.
    pub clamp_to_balance: bool,
    /// Credit the driver's wallet by the applied magnitude (payments).
    pub credit_wallet: bool,
}

/// Failure modes of a ledger posting.
#[derive(Debug)]
pub enum PostError {
    DriverNotFound,
    /// The balance moved between read and write; retryable.
    BalanceConflict,
    Db(sqlx::Error),
}

impl From<sqlx::Error> for PostError {
    fn from(err: sqlx::Error) -> Self {
        PostError::Db(err)
    }
}

/// Append one ledger row inside an open transaction. Returns the row id.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn insert_posting(
    tx: &mut Transaction<'_, Sqlite>,
    driver_id: DriverId,
    ride_id: Option<RideId>,
    kind: TransactionKind,
    amount: Money,
    description: &str,
    balance_before: Money,
    balance_after: Money,
    now: TimeMs,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO debt_transactions (
            driver_id, ride_id, amount, kind, description,
            balance_before, balance_after, created_ms
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(driver_id.as_i64())
    .bind(ride_id.map(|r| r.as_i64()))
    .bind(amount.to_canonical_string())
    .bind(kind.as_str())
    .bind(description)
    .bind(balance_before.to_canonical_string())
    .bind(balance_after.to_canonical_string())
    .bind(now.as_i64())
    .execute(&mut **tx)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Write the new running balance only if the stored one still equals
/// the snapshot this posting was computed from.
pub(crate) async fn cas_driver_debt(
    tx: &mut Transaction<'_, Sqlite>,
    driver_id: DriverId,
    before: Money,
    after: Money,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE drivers SET current_debt = ? WHERE id = ? AND current_debt = ?")
        .bind(after.to_canonical_string())
        .bind(driver_id.as_i64())
        .bind(before.to_canonical_string())
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn transaction_from_row(row: &SqliteRow) -> DebtTransaction {
    let amount: String = row.get("amount");
    let balance_before: String = row.get("balance_before");
    let balance_after: String = row.get("balance_after");
    let kind_str: String = row.get("kind");

    DebtTransaction {
        id: row.get("id"),
        driver_id: DriverId::new(row.get("driver_id")),
        ride_id: row.get::<Option<i64>, _>("ride_id").map(RideId::new),
        amount: parse_money_column(&amount, "amount"),
        kind: TransactionKind::parse(&kind_str).unwrap_or(TransactionKind::Adjustment),
        description: row.get("description"),
        balance_before: parse_money_column(&balance_before, "balance_before"),
        balance_after: parse_money_column(&balance_after, "balance_after"),
        created_at: TimeMs::new(row.get("created_ms")),
    }
}

impl Repository {
    /// Apply one posting: read the balance, append the transaction with
    /// before/after snapshots, and compare-and-swap the running balance,
    /// all in one database transaction. A CAS miss rolls everything back.
    ///
    /// # Errors
    /// See [`PostError`]; `BalanceConflict` is retryable.
    pub async fn post_ledger_transaction(
        &self,
        posting: &LedgerPosting,
    ) -> Result<DebtTransaction, PostError> {
        let now = TimeMs::now();
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query("SELECT current_debt, wallet_balance FROM drivers WHERE id = ?")
            .bind(posting.driver_id.as_i64())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(PostError::DriverNotFound)?;
        let balance_before: String = row.get("current_debt");
        let balance_before = parse_money_column(&balance_before, "current_debt");
        let wallet: String = row.get("wallet_balance");
        let wallet = parse_money_column(&wallet, "wallet_balance");

        let mut amount = posting.amount;
        if posting.clamp_to_balance && amount.is_negative() {
            let floor = if balance_before.is_negative() {
                Money::zero()
            } else {
                balance_before
            };
            amount = -amount.abs().min(floor);
        }
        let balance_after = balance_before + amount;

        let posting_id = insert_posting(
            &mut tx,
            posting.driver_id,
            posting.ride_id,
            posting.kind,
            amount,
            &posting.description,
            balance_before,
            balance_after,
            now,
        )
        .await?;

        if !cas_driver_debt(&mut tx, posting.driver_id, balance_before, balance_after).await? {
            return Err(PostError::BalanceConflict);
        }

        if posting.credit_wallet {
            sqlx::query("UPDATE drivers SET wallet_balance = ? WHERE id = ?")
                .bind((wallet + amount.abs()).to_canonical_string())
                .bind(posting.driver_id.as_i64())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(DebtTransaction {
            id: posting_id,
            driver_id: posting.driver_id,
            ride_id: posting.ride_id,
            amount,
            kind: posting.kind,
            description: posting.description.clone(),
            balance_before,
            balance_after,
            created_at: now,
        })
    }

    /// All postings for a driver at or after `since`, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn ledger_transactions_since(
        &self,
        driver_id: DriverId,
        since: TimeMs,
    ) -> Result<Vec<DebtTransaction>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, driver_id, ride_id, amount, kind, description,
                   balance_before, balance_after, created_ms
            FROM debt_transactions
            WHERE driver_id = ? AND created_ms >= ?
            ORDER BY created_ms ASC, id ASC
            "#,
        )
        .bind(driver_id.as_i64())
        .bind(since.as_i64())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(transaction_from_row).collect())
    }
}
