use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{AppState, LocationDto};
use crate::domain::{Location, Money, PassengerId, Ride, RideId, VehicleClass};
use crate::error::AppError;
use crate::geo::TravelTimeEstimate;
use crate::lifecycle::RideRequestOutcome;
use crate::pricing::FareBreakdown;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRideBody {
    pub passenger_id: i64,
    pub pickup: LocationDto,
    pub destination: LocationDto,
    pub vehicle_class: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptRideBody {
    pub driver_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRideBody {
    pub driver_id: i64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRideBody {
    pub final_fare: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRideBody {
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RideDto {
    pub id: i64,
    pub ride_code: String,
    pub passenger_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<i64>,
    pub pickup: LocationDto,
    pub destination: LocationDto,
    pub vehicle_class: String,
    pub distance_km: f64,
    pub quoted_fare: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_fare: Option<String>,
    pub commission: String,
    pub driver_earning: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    pub requested_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_ms: Option<i64>,
}

impl From<&Ride> for RideDto {
    fn from(ride: &Ride) -> Self {
        RideDto {
            id: ride.id.as_i64(),
            ride_code: ride.ride_code.clone(),
            passenger_id: ride.passenger_id.as_i64(),
            driver_id: ride.driver_id.map(|d| d.as_i64()),
            pickup: LocationDto {
                latitude: ride.pickup.latitude(),
                longitude: ride.pickup.longitude(),
            },
            destination: LocationDto {
                latitude: ride.destination.latitude(),
                longitude: ride.destination.longitude(),
            },
            vehicle_class: ride.vehicle_class.as_str().to_string(),
            distance_km: ride.distance_km,
            quoted_fare: ride.quoted_fare.to_canonical_string(),
            final_fare: ride.final_fare.map(|f| f.to_canonical_string()),
            commission: ride.commission.to_canonical_string(),
            driver_earning: ride.driver_earning.to_canonical_string(),
            status: ride.status.as_str().to_string(),
            cancellation_reason: ride.cancellation_reason.clone(),
            requested_ms: ride.requested_at.as_i64(),
            accepted_ms: ride.accepted_at.map(|t| t.as_i64()),
            started_ms: ride.started_at.map(|t| t.as_i64()),
            completed_ms: ride.completed_at.map(|t| t.as_i64()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FareDto {
    pub distance_km: f64,
    pub base_fare: String,
    pub distance_fare: String,
    pub total_fare: String,
    pub commission_rate: f64,
    pub commission: String,
    pub driver_earning: String,
    pub time_multiplier: f64,
    pub demand_multiplier: f64,
    pub vehicle_multiplier: f64,
}

impl From<&FareBreakdown> for FareDto {
    fn from(fare: &FareBreakdown) -> Self {
        FareDto {
            distance_km: fare.distance_km,
            base_fare: fare.base_fare.to_canonical_string(),
            distance_fare: fare.distance_fare.to_canonical_string(),
            total_fare: fare.total_fare.to_canonical_string(),
            commission_rate: fare.commission_rate,
            commission: fare.commission.to_canonical_string(),
            driver_earning: fare.driver_earning.to_canonical_string(),
            time_multiplier: fare.time_multiplier,
            demand_multiplier: fare.demand_multiplier,
            vehicle_multiplier: fare.vehicle_multiplier,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaDto {
    pub base_minutes: f64,
    pub traffic_factor: f64,
    pub total_minutes: f64,
}

impl From<&TravelTimeEstimate> for EtaDto {
    fn from(eta: &TravelTimeEstimate) -> Self {
        EtaDto {
            base_minutes: eta.base_minutes,
            traffic_factor: eta.traffic_factor,
            total_minutes: eta.total_minutes,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRideResponse {
    pub ride: RideDto,
    pub fare: FareDto,
    pub eta: EtaDto,
    pub drivers_notified: usize,
}

impl From<&RideRequestOutcome> for RequestRideResponse {
    fn from(outcome: &RideRequestOutcome) -> Self {
        RequestRideResponse {
            ride: RideDto::from(&outcome.ride),
            fare: FareDto::from(&outcome.fare),
            eta: EtaDto::from(&outcome.eta),
            drivers_notified: outcome.drivers_notified,
        }
    }
}

pub async fn request_ride(
    State(state): State<AppState>,
    Json(body): Json<RequestRideBody>,
) -> Result<Json<RequestRideResponse>, AppError> {
    let pickup = Location::new(body.pickup.latitude, body.pickup.longitude)?;
    let destination = Location::new(body.destination.latitude, body.destination.longitude)?;
    let vehicle_class = body
        .vehicle_class
        .as_deref()
        .map(VehicleClass::parse)
        .unwrap_or(VehicleClass::Standard);

    let outcome = state
        .lifecycle
        .request_ride(
            PassengerId::new(body.passenger_id),
            pickup,
            destination,
            vehicle_class,
        )
        .await?;

    Ok(Json(RequestRideResponse::from(&outcome)))
}

pub async fn get_ride(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<RideDto>, AppError> {
    let ride = state.lifecycle.ride_status(RideId::new(id)).await?;
    Ok(Json(RideDto::from(&ride)))
}

pub async fn accept_ride(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<AcceptRideBody>,
) -> Result<Json<RideDto>, AppError> {
    let ride = state
        .lifecycle
        .accept_ride(RideId::new(id), crate::domain::DriverId::new(body.driver_id))
        .await?;
    Ok(Json(RideDto::from(&ride)))
}

pub async fn start_ride(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<StartRideBody>,
) -> Result<Json<RideDto>, AppError> {
    let ride = state
        .lifecycle
        .start_ride(RideId::new(id), crate::domain::DriverId::new(body.driver_id))
        .await?;
    Ok(Json(RideDto::from(&ride)))
}

pub async fn complete_ride(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<CompleteRideBody>,
) -> Result<Json<RideDto>, AppError> {
    let final_fare = match body.final_fare {
        Some(raw) => Some(
            Money::from_f64(raw)
                .ok_or_else(|| AppError::Validation("final fare must be a number".to_string()))?,
        ),
        None => None,
    };

    let ride = state
        .lifecycle
        .complete_ride(RideId::new(id), final_fare)
        .await?;
    Ok(Json(RideDto::from(&ride)))
}

pub async fn cancel_ride(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<CancelRideBody>,
) -> Result<Json<RideDto>, AppError> {
    let ride = state
        .lifecycle
        .cancel_ride(RideId::new(id), &body.reason)
        .await?;
    Ok(Json(RideDto::from(&ride)))
}
