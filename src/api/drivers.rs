use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{AppState, LocationDto};
use crate::domain::{
    DebtTransaction, DriverAvailability, DriverId, Location, Money, TimeMs, TransactionKind,
    VehicleClass,
};
use crate::error::AppError;
use crate::ledger::DebtSummary;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDriverBody {
    pub driver_id: i64,
    pub vehicle_class: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceBody {
    pub is_online: bool,
    pub is_available: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBody {
    pub amount: f64,
    pub method: String,
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentBody {
    pub amount: f64,
    pub kind: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverDto {
    pub id: i64,
    pub status: String,
    pub vehicle_class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationDto>,
    pub is_online: bool,
    pub is_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_ride_id: Option<i64>,
    pub current_debt: String,
    pub wallet_balance: String,
    pub total_earnings: String,
    pub total_rides: i64,
}

impl From<&DriverAvailability> for DriverDto {
    fn from(driver: &DriverAvailability) -> Self {
        DriverDto {
            id: driver.id.as_i64(),
            status: driver.status.as_str().to_string(),
            vehicle_class: driver.vehicle_class.as_str().to_string(),
            location: driver.location.map(|l| LocationDto {
                latitude: l.latitude(),
                longitude: l.longitude(),
            }),
            is_online: driver.is_online,
            is_available: driver.is_available,
            current_ride_id: driver.current_ride_id.map(|r| r.as_i64()),
            current_debt: driver.current_debt.to_canonical_string(),
            wallet_balance: driver.wallet_balance.to_canonical_string(),
            total_earnings: driver.total_earnings.to_canonical_string(),
            total_rides: driver.total_rides,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    pub id: i64,
    pub driver_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ride_id: Option<i64>,
    pub amount: String,
    pub kind: String,
    pub description: String,
    pub balance_before: String,
    pub balance_after: String,
    pub created_ms: i64,
}

impl From<&DebtTransaction> for TransactionDto {
    fn from(t: &DebtTransaction) -> Self {
        TransactionDto {
            id: t.id,
            driver_id: t.driver_id.as_i64(),
            ride_id: t.ride_id.map(|r| r.as_i64()),
            amount: t.amount.to_canonical_string(),
            kind: t.kind.as_str().to_string(),
            description: t.description.clone(),
            balance_before: t.balance_before.to_canonical_string(),
            balance_after: t.balance_after.to_canonical_string(),
            created_ms: t.created_at.as_i64(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtSummaryDto {
    pub driver_id: i64,
    pub current_debt: String,
    pub debt_limit: String,
    pub warning_threshold: String,
    pub is_suspended: bool,
    pub can_work: bool,
    pub monthly_commission: String,
    pub monthly_payments: String,
    pub monthly_transaction_count: i64,
}

impl From<&DebtSummary> for DebtSummaryDto {
    fn from(summary: &DebtSummary) -> Self {
        DebtSummaryDto {
            driver_id: summary.driver_id.as_i64(),
            current_debt: summary.current_debt.to_canonical_string(),
            debt_limit: summary.debt_limit.to_canonical_string(),
            warning_threshold: summary.warning_threshold.to_canonical_string(),
            is_suspended: summary.is_suspended,
            can_work: summary.can_work,
            monthly_commission: summary.monthly.total_commission.to_canonical_string(),
            monthly_payments: summary.monthly.total_payments.to_canonical_string(),
            monthly_transaction_count: summary.monthly.transaction_count,
        }
    }
}

pub async fn register_driver(
    State(state): State<AppState>,
    Json(body): Json<RegisterDriverBody>,
) -> Result<Json<DriverDto>, AppError> {
    let vehicle_class = body
        .vehicle_class
        .as_deref()
        .map(VehicleClass::parse)
        .unwrap_or(VehicleClass::Standard);

    let driver = state
        .repo
        .upsert_driver(DriverId::new(body.driver_id), vehicle_class, TimeMs::now())
        .await?;
    Ok(Json(DriverDto::from(&driver)))
}

pub async fn set_presence(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<PresenceBody>,
) -> Result<Json<DriverDto>, AppError> {
    let driver_id = DriverId::new(id);
    let updated = state
        .repo
        .set_driver_presence(driver_id, body.is_online, body.is_available)
        .await?;
    if !updated {
        return Err(AppError::NotFound(format!("driver {}", driver_id)));
    }

    let driver = state
        .repo
        .get_driver(driver_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("driver {}", driver_id)))?;
    Ok(Json(DriverDto::from(&driver)))
}

pub async fn set_location(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<LocationDto>,
) -> Result<Json<DriverDto>, AppError> {
    let driver_id = DriverId::new(id);
    let location = Location::new(body.latitude, body.longitude)?;
    let updated = state
        .repo
        .set_driver_location(driver_id, location, TimeMs::now())
        .await?;
    if !updated {
        return Err(AppError::NotFound(format!("driver {}", driver_id)));
    }

    let driver = state
        .repo
        .get_driver(driver_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("driver {}", driver_id)))?;
    Ok(Json(DriverDto::from(&driver)))
}

pub async fn post_payment(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<PaymentBody>,
) -> Result<Json<TransactionDto>, AppError> {
    let amount = Money::from_f64(body.amount)
        .ok_or_else(|| AppError::Validation("payment amount must be a number".to_string()))?
        .round_2dp();

    let transaction = state
        .ledger
        .post_payment(
            DriverId::new(id),
            amount,
            &body.method,
            body.reference.as_deref(),
        )
        .await?;
    Ok(Json(TransactionDto::from(&transaction)))
}

pub async fn post_adjustment(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<AdjustmentBody>,
) -> Result<Json<TransactionDto>, AppError> {
    let kind = TransactionKind::parse(&body.kind).ok_or_else(|| {
        AppError::Validation(format!("unknown transaction kind: {}", body.kind))
    })?;
    let amount = Money::from_f64(body.amount)
        .ok_or_else(|| AppError::Validation("adjustment amount must be a number".to_string()))?
        .round_2dp();

    let transaction = state
        .ledger
        .post_adjustment(DriverId::new(id), amount, kind, &body.description)
        .await?;
    Ok(Json(TransactionDto::from(&transaction)))
}

pub async fn get_debt_summary(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<DebtSummaryDto>, AppError> {
    let summary = state.ledger.debt_summary(DriverId::new(id)).await?;
    Ok(Json(DebtSummaryDto::from(&summary)))
}
