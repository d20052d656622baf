//! Shared application state for the HTTP surface.

use std::sync::Arc;

use crate::application::handlers::{
    AssignDriverHandler, AuthorizeRidePaymentHandler, CancelRideHandler, CompleteRideHandler,
    ExecuteRefundHandler, HandleProviderWebhookHandler, QuoteRefundHandler, RunPayoutBatchHandler,
};

/// Handler bundle cloned into every request.
///
/// Handlers are built once at composition time (with the retry-wrapped
/// provider registry already inside) and shared behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub authorize_ride_payment: Arc<AuthorizeRidePaymentHandler>,
    pub assign_driver: Arc<AssignDriverHandler>,
    pub complete_ride: Arc<CompleteRideHandler>,
    pub cancel_ride: Arc<CancelRideHandler>,
    pub quote_refund: Arc<QuoteRefundHandler>,
    pub execute_refund: Arc<ExecuteRefundHandler>,
    pub handle_webhook: Arc<HandleProviderWebhookHandler>,
    pub run_payout_batch: Arc<RunPayoutBatchHandler>,
}
