//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, and error types that form the
//! vocabulary of the Fareline settlement domain.

mod errors;
mod ids;
mod money;
mod timestamp;

pub use errors::{DomainError, ErrorCode};
pub use ids::{
    BeneficiaryId, CustomerId, DriverId, PaymentId, PayoutId, RideId, WebhookEventId,
};
pub use money::{Currency, Money};
pub use timestamp::Timestamp;
