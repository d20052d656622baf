//! Domain layer - pure settlement logic, no I/O.

pub mod fare;
pub mod foundation;
pub mod payment;
pub mod payout;
pub mod ride;
pub mod webhook;
