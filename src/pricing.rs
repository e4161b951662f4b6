//! Fare computation: distance, time-of-day, and vehicle class.

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;

use crate::config::PricingConfig;
use crate::domain::{Location, Money, VehicleClass};
use crate::error::AppError;
use crate::geo;

/// Quoted price split for one trip.
///
/// Monetary fields are rounded to two decimal places; the multipliers
/// record how the quote was derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FareBreakdown {
    pub distance_km: f64,
    pub base_fare: Money,
    pub distance_fare: Money,
    pub total_fare: Money,
    pub commission_rate: f64,
    pub commission: Money,
    pub driver_earning: Money,
    pub time_multiplier: f64,
    pub demand_multiplier: f64,
    pub vehicle_multiplier: f64,
    pub vehicle_class: VehicleClass,
}

/// Computes trip quotes from pricing constants. Pure: identical inputs
/// (including `at_time`) give identical breakdowns.
#[derive(Debug, Clone, Copy)]
pub struct FareEngine {
    config: PricingConfig,
}

impl FareEngine {
    pub fn new(config: PricingConfig) -> Self {
        FareEngine { config }
    }

    /// Quote a trip.
    ///
    /// `raw = base + distance * rate`, scaled multiplicatively by the
    /// time-of-day, demand, and vehicle multipliers, then clamped to the
    /// minimum fare. Rounding happens once, at the end, so intermediate
    /// error does not compound.
    ///
    /// # Errors
    /// Returns an internal error if the computed fare is not a finite
    /// number, which indicates broken pricing constants.
    pub fn quote(
        &self,
        pickup: Location,
        destination: Location,
        vehicle_class: VehicleClass,
        at_time: DateTime<Utc>,
    ) -> Result<FareBreakdown, AppError> {
        let distance_km = geo::distance_km(pickup, destination);

        let time_multiplier = time_of_day_multiplier(at_time.hour());
        // Demand is a fixed extension point until a live signal exists.
        let demand_multiplier = 1.0;
        let vehicle_multiplier = vehicle_class.fare_multiplier();

        let distance_fare = distance_km * self.config.rate_per_km;
        let mut total = (self.config.base_fare + distance_fare)
            * time_multiplier
            * demand_multiplier
            * vehicle_multiplier;
        if total < self.config.minimum_fare {
            total = self.config.minimum_fare;
        }

        let total_fare = money_from(total)?.round_2dp();
        let rate = money_from(self.config.commission_rate)?;
        let commission = (total_fare * rate).round_2dp();
        let driver_earning = total_fare - commission;

        Ok(FareBreakdown {
            distance_km,
            base_fare: money_from(self.config.base_fare)?.round_2dp(),
            distance_fare: money_from(distance_fare)?.round_2dp(),
            total_fare,
            commission_rate: self.config.commission_rate,
            commission,
            driver_earning,
            time_multiplier,
            demand_multiplier,
            vehicle_multiplier,
            vehicle_class,
        })
    }
}

fn money_from(value: f64) -> Result<Money, AppError> {
    Money::from_f64(value)
        .ok_or_else(|| AppError::Internal(format!("non-finite amount in fare computation: {value}")))
}

/// Peak-hour multiplier: morning rush 07–09 ×1.3, evening rush 16–19
/// ×1.4, night 22–05 ×1.2, otherwise ×1.0.
fn time_of_day_multiplier(hour: u32) -> f64 {
    match hour {
        7..=8 => 1.3,
        16..=18 => 1.4,
        22..=23 | 0..=4 => 1.2,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn engine() -> FareEngine {
        FareEngine::new(PricingConfig {
            base_fare: 5.0,
            rate_per_km: 2.0,
            commission_rate: 0.2,
            minimum_fare: 10.0,
        })
    }

    fn loc(lat: f64, lon: f64) -> Location {
        Location::new(lat, lon).expect("valid test coordinates")
    }

    fn off_peak() -> DateTime<Utc> {
        // 12:00 noon, multiplier 1.0.
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn riyadh_crosstown_standard_off_peak() {
        let quote = engine()
            .quote(
                loc(24.7136, 46.6753),
                loc(24.6408, 46.7728),
                VehicleClass::Standard,
                off_peak(),
            )
            .unwrap();

        // Haversine distance is ~12.7506 km, so 5 + 12.7506*2 = 30.50.
        assert!((quote.distance_km - 12.7506).abs() < 0.001);
        assert_eq!(quote.total_fare.to_canonical_string(), "30.5");
        assert_eq!(quote.commission.to_canonical_string(), "6.1");
        assert_eq!(quote.driver_earning.to_canonical_string(), "24.4");
        assert_eq!(quote.time_multiplier, 1.0);
    }

    #[test]
    fn commission_and_earning_partition_the_fare() {
        let quote = engine()
            .quote(
                loc(24.7136, 46.6753),
                loc(24.6408, 46.7728),
                VehicleClass::Premium,
                off_peak(),
            )
            .unwrap();
        assert_eq!(quote.commission + quote.driver_earning, quote.total_fare);
    }

    #[test]
    fn short_trip_clamped_to_minimum_fare() {
        let quote = engine()
            .quote(
                loc(24.7136, 46.6753),
                loc(24.7137, 46.6754),
                VehicleClass::Standard,
                off_peak(),
            )
            .unwrap();
        assert_eq!(quote.total_fare.to_canonical_string(), "10");
        assert_eq!(quote.commission.to_canonical_string(), "2");
        assert_eq!(quote.driver_earning.to_canonical_string(), "8");
    }

    #[test]
    fn morning_rush_applies_1_3x() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap();
        let quote = engine()
            .quote(
                loc(24.7136, 46.6753),
                loc(24.6408, 46.7728),
                VehicleClass::Standard,
                at,
            )
            .unwrap();
        assert_eq!(quote.time_multiplier, 1.3);
        // 30.501... * 1.3 = 39.6517 -> 39.65
        assert_eq!(quote.total_fare.to_canonical_string(), "39.65");
    }

    #[test]
    fn time_windows() {
        assert_eq!(time_of_day_multiplier(7), 1.3);
        assert_eq!(time_of_day_multiplier(8), 1.3);
        assert_eq!(time_of_day_multiplier(9), 1.0);
        assert_eq!(time_of_day_multiplier(16), 1.4);
        assert_eq!(time_of_day_multiplier(18), 1.4);
        assert_eq!(time_of_day_multiplier(19), 1.0);
        assert_eq!(time_of_day_multiplier(22), 1.2);
        assert_eq!(time_of_day_multiplier(0), 1.2);
        assert_eq!(time_of_day_multiplier(4), 1.2);
        assert_eq!(time_of_day_multiplier(5), 1.0);
        assert_eq!(time_of_day_multiplier(12), 1.0);
    }

    #[test]
    fn vehicle_class_scales_fare() {
        let a = loc(24.7136, 46.6753);
        let b = loc(24.6408, 46.7728);
        let standard = engine()
            .quote(a, b, VehicleClass::Standard, off_peak())
            .unwrap();
        let luxury = engine()
            .quote(a, b, VehicleClass::Luxury, off_peak())
            .unwrap();
        assert_eq!(luxury.vehicle_multiplier, 2.0);
        assert_eq!(luxury.total_fare.to_canonical_string(), "61");
        assert!(luxury.total_fare > standard.total_fare);
    }

    #[test]
    fn quote_is_deterministic() {
        let a = loc(24.7136, 46.6753);
        let b = loc(24.6408, 46.7728);
        let at = off_peak();
        let first = engine().quote(a, b, VehicleClass::Van, at).unwrap();
        let second = engine().quote(a, b, VehicleClass::Van, at).unwrap();
        assert_eq!(first, second);
    }
}
