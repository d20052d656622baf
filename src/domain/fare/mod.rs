//! Fare and revenue-split calculator.
//!
//! Pure and deterministic: the same `RateEntry` and `TripMetrics` always
//! produce the same breakdown. Every consumer of fare figures (initial
//! pricing, capture-time split persistence, refund quoting) goes through
//! `compute_fare`, so the operator share can never drift between call sites.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Money;
use crate::domain::ride::{RateEntry, TripMetrics};

/// Full decomposition of a ride fare.
///
/// Invariant: `driver_amount + operator_amount + extras + multi_vehicle_tip
/// == total`, exactly. Each component is rounded to minor units before the
/// total is summed, so the decomposition cannot drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareBreakdown {
    pub vehicle_count: u32,
    /// Driver-visible earnings across all vehicles.
    pub driver_amount: Money,
    /// Operator per-minute share. Never itemized to the customer.
    pub operator_amount: Money,
    /// Per-person and per-pet fees.
    pub extras: Money,
    /// Fixed per-vehicle bonus applied when more than one vehicle is needed.
    pub multi_vehicle_tip: Money,
    pub total: Money,
}

/// Computes the total price of a ride and its driver/operator decomposition.
///
/// Negative or non-finite distance/duration inputs are clamped to zero
/// before any fee multiplication.
pub fn compute_fare(rate: &RateEntry, metrics: &TripMetrics) -> FareBreakdown {
    let currency = rate.currency;
    let distance = clamp_metric(metrics.distance_miles);
    let duration = clamp_metric(metrics.duration_minutes);

    let capacity = rate.vehicle_capacity.max(1);
    let vehicle_count = metrics.passenger_count.div_ceil(capacity).max(1);

    // Per-vehicle driver earnings: mileage plus the tip floor, which
    // protects drivers on very short trips.
    let mileage = round_minor(rate.driver_rate_per_mile_minor, distance);
    let driver_per_vehicle = mileage + rate.min_tip_minor;
    let driver_minor = driver_per_vehicle * i64::from(vehicle_count);

    let operator_minor =
        round_minor(rate.operator_rate_per_minute_minor, duration) * i64::from(vehicle_count);

    let extras_minor = rate.per_person_fee_minor * i64::from(metrics.passenger_count)
        + rate.per_pet_fee_minor * i64::from(metrics.pet_count);

    let multi_vehicle_tip_minor = if vehicle_count > 1 {
        rate.min_tip_minor * i64::from(vehicle_count)
    } else {
        0
    };

    let total_minor = driver_minor + operator_minor + extras_minor + multi_vehicle_tip_minor;

    FareBreakdown {
        vehicle_count,
        driver_amount: Money::new(driver_minor, currency),
        operator_amount: Money::new(operator_minor, currency),
        extras: Money::new(extras_minor, currency),
        multi_vehicle_tip: Money::new(multi_vehicle_tip_minor, currency),
        total: Money::new(total_minor, currency),
    }
}

/// Operator per-minute share in isolation.
///
/// Exposed separately because the refund quote needs only this component;
/// it delegates to `compute_fare` so the figure is identical everywhere.
pub fn operator_share(rate: &RateEntry, metrics: &TripMetrics) -> Money {
    compute_fare(rate, metrics).operator_amount
}

fn clamp_metric(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

fn round_minor(rate_minor: i64, units: f64) -> i64 {
    (rate_minor as f64 * units).round() as i64
}
