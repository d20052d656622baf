//! Application command handlers.
//!
//! One file per operation: a command struct, a result struct, and a handler
//! holding its ports behind `Arc<dyn Trait>`.

pub mod assign_driver;
pub mod authorize_ride_payment;
pub mod cancel_ride;
pub mod complete_ride;
pub mod execute_refund;
pub mod handle_provider_webhook;
pub mod quote_refund;
pub mod run_payout_batch;
pub mod transitions;

pub use assign_driver::{AssignDriverCommand, AssignDriverHandler, AssignDriverResult};
pub use authorize_ride_payment::{
    AuthorizeRidePaymentCommand, AuthorizeRidePaymentHandler, AuthorizeRidePaymentResult,
};
pub use cancel_ride::{CancelRideCommand, CancelRideHandler, CancelRideResult};
pub use complete_ride::{CompleteRideCommand, CompleteRideHandler, CompleteRideResult};
pub use execute_refund::{ExecuteRefundCommand, ExecuteRefundHandler, ExecuteRefundResult};
pub use handle_provider_webhook::{
    Disposition, HandleProviderWebhookCommand, HandleProviderWebhookHandler,
};
pub use quote_refund::{QuoteRefundHandler, QuoteRefundQuery, QuoteRefundResult};
pub use run_payout_batch::{BatchSummary, RunPayoutBatchCommand, RunPayoutBatchHandler};
pub use transitions::SettlementTransitions;
