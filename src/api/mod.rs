pub mod drivers;
pub mod health;
pub mod rides;

use crate::db::Repository;
use crate::ledger::LedgerManager;
use crate::lifecycle::RideLifecycle;
use axum::{
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub lifecycle: Arc<RideLifecycle>,
    pub ledger: Arc<LedgerManager>,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        lifecycle: Arc<RideLifecycle>,
        ledger: Arc<LedgerManager>,
    ) -> Self {
        Self {
            repo,
            lifecycle,
            ledger,
        }
    }
}

/// Latitude/longitude pair as it appears on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocationDto {
    pub latitude: f64,
    pub longitude: f64,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/v1/rides", post(rides::request_ride))
        .route("/v1/rides/:id", get(rides::get_ride))
        .route("/v1/rides/:id/accept", post(rides::accept_ride))
        .route("/v1/rides/:id/start", post(rides::start_ride))
        .route("/v1/rides/:id/complete", post(rides::complete_ride))
        .route("/v1/rides/:id/cancel", post(rides::cancel_ride))
        .route("/v1/drivers", post(drivers::register_driver))
        .route("/v1/drivers/:id/presence", post(drivers::set_presence))
        .route("/v1/drivers/:id/location", post(drivers::set_location))
        .route("/v1/drivers/:id/payments", post(drivers::post_payment))
        .route("/v1/drivers/:id/adjustments", post(drivers::post_adjustment))
        .route("/v1/drivers/:id/debt", get(drivers::get_debt_summary))
        .layer(cors)
        .with_state(state)
}
