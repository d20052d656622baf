//! QuoteRefundHandler - read-only refund quote.

use std::sync::Arc;

use crate::application::handlers::transitions::SettlementTransitions;
use crate::domain::foundation::{DomainError, ErrorCode, RideId};
use crate::domain::payment::{refund_quote, Payment, RefundQuote};
use crate::domain::ride::Ride;
use crate::ports::{PaymentRepository, RideRepository};

#[derive(Debug, Clone, Copy)]
pub struct QuoteRefundQuery {
    pub ride_id: RideId,
}

#[derive(Debug, Clone)]
pub struct QuoteRefundResult {
    pub quote: RefundQuote,
    pub payment: Payment,
}

/// Produces the refund figures for a captured ride payment.
///
/// Uses the same formula as the execute path, so the quote a support agent
/// reads is the amount the customer receives.
pub struct QuoteRefundHandler {
    rides: Arc<dyn RideRepository>,
    payments: Arc<dyn PaymentRepository>,
    transitions: Arc<SettlementTransitions>,
}

impl QuoteRefundHandler {
    pub fn new(
        rides: Arc<dyn RideRepository>,
        payments: Arc<dyn PaymentRepository>,
        transitions: Arc<SettlementTransitions>,
    ) -> Self {
        Self {
            rides,
            payments,
            transitions,
        }
    }

    pub async fn handle(&self, query: QuoteRefundQuery) -> Result<QuoteRefundResult, DomainError> {
        let (ride, payment) = self.load(query.ride_id).await?;
        let rate = self.transitions.rate_for(&ride.ride_type).await?;
        let quote = refund_quote(&ride, &rate, &payment)?;
        Ok(QuoteRefundResult { quote, payment })
    }

    pub(crate) async fn load(&self, ride_id: RideId) -> Result<(Ride, Payment), DomainError> {
        let ride = self.rides.find(ride_id).await?.ok_or_else(|| {
            DomainError::new(ErrorCode::RideNotFound, format!("Ride {} not found", ride_id))
        })?;
        let payment = self
            .payments
            .find_captured_by_ride(ride_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::PaymentNotFound,
                    format!("Ride {} has no captured payment", ride_id),
                )
            })?;
        Ok((ride, payment))
    }
}
