//! Candidate driver search for a pickup point.

use std::sync::Arc;

use serde::Serialize;

use crate::db::Repository;
use crate::domain::{DriverId, Location, VehicleClass};
use crate::error::AppError;
use crate::geo;

/// A driver eligible for an offer, with the pickup distance used for
/// ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateDriver {
    pub driver_id: DriverId,
    pub vehicle_class: VehicleClass,
    pub location: Location,
    pub distance_km: f64,
}

/// Finds and ranks candidate drivers near a pickup point.
#[derive(Debug, Clone)]
pub struct RideMatcher {
    repo: Arc<Repository>,
}

impl RideMatcher {
    pub fn new(repo: Arc<Repository>) -> Self {
        RideMatcher { repo }
    }

    /// Drivers that are active, online, available, and within
    /// `radius_km` of `pickup`, sorted ascending by distance with ties
    /// broken by driver id, truncated to `limit`.
    ///
    /// An empty result means "no drivers nearby", not a failure.
    ///
    /// # Errors
    /// Returns an error only if the directory query fails.
    pub async fn find_candidates(
        &self,
        pickup: Location,
        radius_km: f64,
        limit: usize,
    ) -> Result<Vec<CandidateDriver>, AppError> {
        let drivers = self.repo.matchable_drivers().await?;

        let mut candidates: Vec<CandidateDriver> = drivers
            .into_iter()
            .filter_map(|driver| {
                let location = driver.location?;
                let distance_km = geo::distance_km(pickup, location);
                if distance_km <= radius_km {
                    Some(CandidateDriver {
                        driver_id: driver.id,
                        vehicle_class: driver.vehicle_class,
                        location,
                        distance_km,
                    })
                } else {
                    None
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.distance_km
                .total_cmp(&b.distance_km)
                .then_with(|| a.driver_id.as_i64().cmp(&b.driver_id.as_i64()))
        });
        candidates.truncate(limit);

        Ok(candidates)
    }
}
