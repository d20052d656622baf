//! Payment records, splits, and refund quoting.

#[allow(clippy::module_inception)]
mod payment;
mod refund;

pub use payment::{Payment, PaymentSplit, PaymentStatus, ProviderKind};
pub use refund::{refund_quote, RefundQuote};
