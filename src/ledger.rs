//! Debt ledger management: postings, thresholds, suspension.
//!
//! Every debt-affecting event is an append-only transaction with
//! balance snapshots; the running balance on the driver row is always
//! the sum of the chain. Concurrent postings for one driver serialize
//! through the repository's compare-and-swap, retried here with bounded
//! exponential backoff.

use backoff::future::retry;
use backoff::ExponentialBackoff;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DebtConfig;
use crate::db::repo::{LedgerPosting, PostError};
use crate::db::Repository;
use crate::domain::{DebtTransaction, DriverId, DriverStatus, Money, RideId, TimeMs, TransactionKind};
use crate::error::AppError;
use crate::notify::{NotificationDispatcher, Recipient};

const THIRTY_DAYS_MS: i64 = 30 * 24 * 60 * 60 * 1000;

/// What threshold evaluation decided after a balance increase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdAction {
    None,
    Warned,
    Suspended,
}

/// Trailing 30-day aggregates, by transaction kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyStats {
    pub total_commission: Money,
    pub total_payments: Money,
    pub transaction_count: i64,
}

/// Snapshot of a driver's debt standing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebtSummary {
    pub driver_id: DriverId,
    pub current_debt: Money,
    pub debt_limit: Money,
    pub warning_threshold: Money,
    pub is_suspended: bool,
    pub can_work: bool,
    pub monthly: MonthlyStats,
}

pub struct LedgerManager {
    repo: Arc<Repository>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    config: DebtConfig,
}

impl LedgerManager {
    pub fn new(
        repo: Arc<Repository>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: DebtConfig,
    ) -> Self {
        LedgerManager {
            repo,
            dispatcher,
            config,
        }
    }

    fn limit(&self) -> Result<Money, AppError> {
        money_from(self.config.max_debt_limit)
    }

    fn warning_threshold(&self) -> Result<Money, AppError> {
        money_from(self.config.warning_threshold)
    }

    /// Accrue a ride commission against the driver's debt and evaluate
    /// thresholds on the post-transaction balance.
    ///
    /// # Errors
    /// `NotFound` for an unknown driver, `Validation` for a non-positive
    /// amount, `Conflict` if the retry budget is exhausted.
    pub async fn post_commission(
        &self,
        driver_id: DriverId,
        ride_id: RideId,
        amount: Money,
        description: &str,
    ) -> Result<DebtTransaction, AppError> {
        if !amount.is_positive() {
            return Err(AppError::Validation(
                "commission amount must be positive".to_string(),
            ));
        }

        let transaction = self
            .post_with_retry(LedgerPosting {
                driver_id,
                ride_id: Some(ride_id),
                kind: TransactionKind::Commission,
                amount,
                description: description.to_string(),
                clamp_to_balance: false,
                credit_wallet: false,
            })
            .await?;

        self.evaluate_thresholds(driver_id, transaction.balance_after)
            .await?;
        Ok(transaction)
    }

    /// Record a payment, clamped so the balance never drops below zero,
    /// and credit the driver's wallet by the applied amount. Reactivates
    /// a suspended driver whose balance falls under the suspend limit.
    ///
    /// # Errors
    /// `NotFound` for an unknown driver, `Validation` for a non-positive
    /// amount, `Conflict` if the retry budget is exhausted.
    pub async fn post_payment(
        &self,
        driver_id: DriverId,
        amount: Money,
        method: &str,
        reference: Option<&str>,
    ) -> Result<DebtTransaction, AppError> {
        if !amount.is_positive() {
            return Err(AppError::Validation(
                "payment amount must be positive".to_string(),
            ));
        }

        let description = match reference {
            Some(reference) => format!("Payment via {} (ref {})", method, reference),
            None => format!("Payment via {}", method),
        };

        let transaction = self
            .post_with_retry(LedgerPosting {
                driver_id,
                ride_id: None,
                kind: TransactionKind::Payment,
                amount: -amount,
                description,
                clamp_to_balance: true,
                credit_wallet: true,
            })
            .await?;

        if transaction.balance_after < self.limit()? {
            let driver = self
                .repo
                .get_driver(driver_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("driver {}", driver_id)))?;
            if driver.status == DriverStatus::Suspended {
                self.repo.reactivate_driver(driver_id).await?;
                self.dispatcher
                    .dispatch(
                        Recipient::Driver(driver_id),
                        &format!(
                            "Your account is active again. Outstanding balance: {}",
                            transaction.balance_after
                        ),
                    )
                    .await;
            }
        }

        Ok(transaction)
    }

    /// Manual ledger correction: a signed adjustment or a penalty.
    /// Thresholds are evaluated only when the balance went up.
    ///
    /// # Errors
    /// `NotFound` for an unknown driver, `Validation` for a zero amount
    /// or a non-positive penalty, `Conflict` on retry exhaustion.
    pub async fn post_adjustment(
        &self,
        driver_id: DriverId,
        amount: Money,
        kind: TransactionKind,
        description: &str,
    ) -> Result<DebtTransaction, AppError> {
        match kind {
            TransactionKind::Adjustment => {
                if amount.is_zero() {
                    return Err(AppError::Validation(
                        "adjustment amount must be non-zero".to_string(),
                    ));
                }
            }
            TransactionKind::Penalty => {
                if !amount.is_positive() {
                    return Err(AppError::Validation(
                        "penalty amount must be positive".to_string(),
                    ));
                }
            }
            other => {
                return Err(AppError::Validation(format!(
                    "unsupported manual posting kind: {}",
                    other
                )));
            }
        }

        let transaction = self
            .post_with_retry(LedgerPosting {
                driver_id,
                ride_id: None,
                kind,
                amount,
                description: description.to_string(),
                clamp_to_balance: amount.is_negative(),
                credit_wallet: false,
            })
            .await?;

        if transaction.amount.is_positive() {
            self.evaluate_thresholds(driver_id, transaction.balance_after)
                .await?;
        }
        Ok(transaction)
    }

    /// Evaluate warning/suspension thresholds against a post-transaction
    /// balance. Warning leaves the driver untouched; crossing the
    /// suspend limit takes them offline when auto-suspend is on.
    ///
    /// # Errors
    /// Returns an error if the suspension write fails.
    pub async fn evaluate_thresholds(
        &self,
        driver_id: DriverId,
        balance: Money,
    ) -> Result<ThresholdAction, AppError> {
        let limit = self.limit()?;
        let warning = self.warning_threshold()?;

        if balance >= limit && self.config.auto_suspend {
            self.repo.suspend_driver(driver_id).await?;
            self.dispatcher
                .dispatch(
                    Recipient::Driver(driver_id),
                    &format!(
                        "Your account has been suspended: outstanding balance {} reached the {} limit. Settle your balance to resume driving.",
                        balance, limit
                    ),
                )
                .await;
            return Ok(ThresholdAction::Suspended);
        }

        if balance >= warning {
            self.dispatcher
                .dispatch(
                    Recipient::Driver(driver_id),
                    &format!(
                        "Warning: your outstanding balance has reached {}. Please settle soon.",
                        balance
                    ),
                )
                .await;
            return Ok(ThresholdAction::Warned);
        }

        Ok(ThresholdAction::None)
    }

    /// Current standing plus trailing 30-day aggregates.
    ///
    /// # Errors
    /// `NotFound` for an unknown driver.
    pub async fn debt_summary(&self, driver_id: DriverId) -> Result<DebtSummary, AppError> {
        let driver = self
            .repo
            .get_driver(driver_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("driver {}", driver_id)))?;

        let since = TimeMs::new(TimeMs::now().as_i64() - THIRTY_DAYS_MS);
        let transactions = self.repo.ledger_transactions_since(driver_id, since).await?;

        let mut total_commission = Money::zero();
        let mut total_payments = Money::zero();
        for t in &transactions {
            match t.kind {
                TransactionKind::Commission if t.amount.is_positive() => {
                    total_commission = total_commission + t.amount;
                }
                TransactionKind::Payment if t.amount.is_negative() => {
                    total_payments = total_payments + t.amount.abs();
                }
                _ => {}
            }
        }

        let limit = self.limit()?;
        let is_suspended = driver.status == DriverStatus::Suspended;
        let can_work = driver.current_debt < limit && driver.status == DriverStatus::Active;

        Ok(DebtSummary {
            driver_id,
            current_debt: driver.current_debt,
            debt_limit: limit,
            warning_threshold: self.warning_threshold()?,
            is_suspended,
            can_work,
            monthly: MonthlyStats {
                total_commission,
                total_payments,
                transaction_count: transactions.len() as i64,
            },
        })
    }

    /// Apply a posting, retrying transient balance conflicts with
    /// bounded exponential backoff before surfacing `Conflict`.
    async fn post_with_retry(&self, posting: LedgerPosting) -> Result<DebtTransaction, AppError> {
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(20),
            max_interval: Duration::from_millis(100),
            max_elapsed_time: Some(Duration::from_millis(300)),
            ..ExponentialBackoff::default()
        };

        retry(policy, || async {
            match self.repo.post_ledger_transaction(&posting).await {
                Ok(transaction) => Ok(transaction),
                Err(PostError::BalanceConflict) => Err(backoff::Error::transient(
                    AppError::Conflict("concurrent ledger update".to_string()),
                )),
                Err(PostError::DriverNotFound) => Err(backoff::Error::permanent(
                    AppError::NotFound(format!("driver {}", posting.driver_id)),
                )),
                Err(PostError::Db(e)) => Err(backoff::Error::permanent(e.into())),
            }
        })
        .await
    }
}

fn money_from(value: f64) -> Result<Money, AppError> {
    Money::from_f64(value)
        .ok_or_else(|| AppError::Internal(format!("non-finite amount in debt config: {value}")))
}
