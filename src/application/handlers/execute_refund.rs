//! ExecuteRefundHandler - refund a captured ride payment.

use std::sync::Arc;

use tracing::info;

use crate::application::handlers::quote_refund::QuoteRefundHandler;
use crate::application::handlers::transitions::SettlementTransitions;
use crate::application::providers::ProviderRegistry;
use crate::domain::foundation::{DomainError, ErrorCode, Money, RideId};
use crate::domain::payment::{refund_quote, RefundQuote};
use crate::ports::ResultCode;

/// Command to return money to the customer.
#[derive(Debug, Clone, Copy)]
pub struct ExecuteRefundCommand {
    pub ride_id: RideId,
    /// Amount to refund in minor units of the payment's currency. `None`
    /// refunds the full quoted amount.
    pub amount_minor: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ExecuteRefundResult {
    pub refunded: Money,
    pub quote: RefundQuote,
}

/// Executes a refund through the same formula the quote endpoint uses.
///
/// Validation happens entirely before the provider call: a request above
/// the quoted refundable amount never leaves this process.
pub struct ExecuteRefundHandler {
    quotes: Arc<QuoteRefundHandler>,
    registry: ProviderRegistry,
    transitions: Arc<SettlementTransitions>,
}

impl ExecuteRefundHandler {
    pub fn new(
        quotes: Arc<QuoteRefundHandler>,
        registry: ProviderRegistry,
        transitions: Arc<SettlementTransitions>,
    ) -> Self {
        Self {
            quotes,
            registry,
            transitions,
        }
    }

    pub async fn handle(&self, cmd: ExecuteRefundCommand) -> Result<ExecuteRefundResult, DomainError> {
        // 1. Quote with the shared formula.
        let (ride, payment) = self.quotes.load(cmd.ride_id).await?;
        let rate = self.transitions.rate_for(&ride.ride_type).await?;
        let quote = refund_quote(&ride, &rate, &payment)?;

        // 2. Validate the requested amount against the quote, before any
        //    provider traffic.
        let amount = cmd
            .amount_minor
            .map(|minor| Money::new(minor, quote.refundable.currency()))
            .unwrap_or(quote.refundable);
        if !amount.is_positive() {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                "Refund amount must be positive",
            ));
        }
        if amount.minor() > quote.refundable.minor() {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!(
                    "Refund of {} exceeds refundable {} for ride {}",
                    amount.minor(),
                    quote.refundable.minor(),
                    ride.id
                ),
            ));
        }

        // 3. Refund at the provider.
        let external_ref = payment.external_ref.clone().ok_or_else(|| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Captured payment {} has no external reference", payment.id),
            )
        })?;
        let provider = self.registry.get(payment.provider)?;
        let code = provider
            .refund(&external_ref, amount, &format!("ref-{}", payment.id))
            .await
            .map_err(DomainError::from)?;
        if code != ResultCode::Refunded {
            return Err(DomainError::new(
                ErrorCode::ProviderDeclined,
                format!("Refund of payment {} returned {:?}", payment.id, code),
            ));
        }

        // 4. Settle locally; the refund webhook takes over if it won.
        self.transitions.settle_refund(&payment, amount).await?;

        info!(
            ride_id = %ride.id,
            payment_id = %payment.id,
            amount_minor = amount.minor(),
            "Refund executed"
        );
        Ok(ExecuteRefundResult {
            refunded: amount,
            quote,
        })
    }
}
