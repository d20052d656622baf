//! Ride aggregate and rate table entries.

mod rate_table;
#[allow(clippy::module_inception)]
mod ride;

pub use rate_table::RateEntry;
pub use ride::{Ride, RideStatus, TripMetrics};
