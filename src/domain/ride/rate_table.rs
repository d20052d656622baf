//! Rate table entries per ride category.
//!
//! A `RateEntry` is immutable once a ride's fare has been computed against
//! it; editing the table only affects future rides.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Currency;

/// Pricing parameters for one ride category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    /// Ride category key, e.g. "standard", "xl", "pet_friendly".
    pub ride_type: String,

    /// Driver-visible rate per mile, minor units.
    pub driver_rate_per_mile_minor: i64,

    /// Operator per-minute rate, minor units. Never itemized to customers.
    pub operator_rate_per_minute_minor: i64,

    /// Fee per passenger, minor units.
    pub per_person_fee_minor: i64,

    /// Fee per pet, minor units.
    pub per_pet_fee_minor: i64,

    /// Minimum tip floor per vehicle, minor units. Protects drivers on very
    /// short trips and doubles as the per-vehicle bonus on multi-vehicle rides.
    pub min_tip_minor: i64,

    /// Maximum accepted tip, minor units.
    pub max_tip_minor: i64,

    /// Seats per vehicle for this category.
    pub vehicle_capacity: u32,

    pub currency: Currency,
}

impl RateEntry {
    /// Default rate applied when a ride references an unknown category.
    ///
    /// Booking availability wins over pricing precision: a missing rate
    /// entry must never fail the booking. Callers log
    /// "fare computed from fallback rate" when this entry is used.
    pub fn fallback() -> Self {
        Self {
            ride_type: "fallback".to_string(),
            driver_rate_per_mile_minor: 150,
            operator_rate_per_minute_minor: 25,
            per_person_fee_minor: 100,
            per_pet_fee_minor: 300,
            min_tip_minor: 300,
            max_tip_minor: 10_000,
            vehicle_capacity: 4,
            currency: Currency::Usd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_rate_is_priced() {
        let rate = RateEntry::fallback();
        assert_eq!(rate.ride_type, "fallback");
        assert!(rate.driver_rate_per_mile_minor > 0);
        assert!(rate.vehicle_capacity > 0);
    }
}
