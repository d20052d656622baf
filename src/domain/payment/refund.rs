//! Refund quote engine.
//!
//! One pure function produces the refund figures for both the read-only
//! quote endpoint and the execute-refund write path. Quoting and executing
//! must agree to the cent, so there is exactly one formula.

use serde::{Deserialize, Serialize};

use crate::domain::fare::compute_fare;
use crate::domain::foundation::{DomainError, ErrorCode, Money};
use crate::domain::payment::Payment;
use crate::domain::ride::{RateEntry, Ride};

/// Refund figures for a captured ride payment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefundQuote {
    /// Amount the customer can get back.
    pub refundable: Money,
    /// Operator per-minute share withheld from the refund.
    pub operator_share: Money,
    /// Provider processing fee withheld, zero when settlement data is absent.
    pub provider_fee: Money,
}

/// Computes the refundable amount for a ride with a captured payment.
///
/// The operator share is always recomputed from the rate table; the ride's
/// stored `total_fare` is only a cache of the original total. The result is
/// capped at the amount actually captured.
pub fn refund_quote(
    ride: &Ride,
    rate: &RateEntry,
    captured: &Payment,
) -> Result<RefundQuote, DomainError> {
    if !captured.is_captured() {
        return Err(DomainError::new(
            ErrorCode::ValidationFailed,
            format!(
                "Payment {} is {} - only captured payments can be refunded",
                captured.id,
                captured.status.as_str()
            ),
        ));
    }

    let breakdown = compute_fare(rate, &ride.metrics);
    let operator_share = breakdown.operator_amount;
    let total = ride.total_fare.unwrap_or(breakdown.total);
    let provider_fee = captured
        .provider_fee
        .unwrap_or_else(|| Money::zero(total.currency()));

    let refundable = total
        .saturating_sub(&operator_share)?
        .saturating_sub(&provider_fee)?;

    // Never refund more than was captured.
    let refundable = if refundable.minor() > captured.amount.minor() {
        captured.amount
    } else {
        refundable
    };

    Ok(RefundQuote {
        refundable,
        operator_share,
        provider_fee,
    })
}
