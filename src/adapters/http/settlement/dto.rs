//! JSON request/response shapes for the settlement endpoints.

use serde::{Deserialize, Serialize};

use crate::application::handlers::{
    AuthorizeRidePaymentResult, CancelRideResult, CompleteRideResult, ExecuteRefundResult,
    QuoteRefundResult,
};
use crate::domain::foundation::Currency;
use crate::domain::payment::{PaymentStatus, ProviderKind};
use crate::domain::ride::RideStatus;

/// Request to authorize a ride's fare.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeRequest {
    pub provider: ProviderKind,
    /// Tokenized payment method from the booking flow.
    pub method_token: String,
    /// Customer tip in minor units, bounded by the ride type's rate entry.
    #[serde(default)]
    pub tip_minor: Option<i64>,
}

/// Request handed over by driver matching.
#[derive(Debug, Clone, Deserialize)]
pub struct AssignDriverRequest {
    pub driver_id: uuid::Uuid,
}

/// Request to refund a captured ride payment.
#[derive(Debug, Clone, Deserialize)]
pub struct RefundRequest {
    /// Partial refund amount in minor units. Omit for a full refund of the
    /// quoted amount.
    #[serde(default)]
    pub amount_minor: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FareBreakdownResponse {
    pub vehicle_count: u32,
    pub driver_minor: i64,
    pub operator_minor: i64,
    pub extras_minor: i64,
    pub multi_vehicle_tip_minor: i64,
    pub total_minor: i64,
    pub currency: Currency,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorizeResponse {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub breakdown: FareBreakdownResponse,
}

impl From<AuthorizeRidePaymentResult> for AuthorizeResponse {
    fn from(result: AuthorizeRidePaymentResult) -> Self {
        Self {
            payment_id: result.payment.id.to_string(),
            status: result.payment.status,
            breakdown: FareBreakdownResponse {
                vehicle_count: result.breakdown.vehicle_count,
                driver_minor: result.breakdown.driver_amount.minor(),
                operator_minor: result.breakdown.operator_amount.minor(),
                extras_minor: result.breakdown.extras.minor(),
                multi_vehicle_tip_minor: result.breakdown.multi_vehicle_tip.minor(),
                total_minor: result.breakdown.total.minor(),
                currency: result.breakdown.total.currency(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RideResponse {
    pub ride_id: String,
    pub status: RideStatus,
    pub driver_id: Option<String>,
    pub total_fare_minor: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteRideResponse {
    pub payment_id: String,
    pub status: PaymentStatus,
}

impl From<CompleteRideResult> for CompleteRideResponse {
    fn from(result: CompleteRideResult) -> Self {
        Self {
            payment_id: result.payment.id.to_string(),
            status: result.payment.status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelRideResponse {
    pub ride_id: String,
    pub status: RideStatus,
    pub refunded_minor: Option<i64>,
}

impl From<CancelRideResult> for CancelRideResponse {
    fn from(result: CancelRideResult) -> Self {
        Self {
            ride_id: result.ride.id.to_string(),
            status: result.ride.status,
            refunded_minor: result.refunded.map(|m| m.minor()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundQuoteResponse {
    pub refundable_minor: i64,
    pub operator_share_minor: i64,
    pub provider_fee_minor: i64,
    pub currency: Currency,
}

impl From<QuoteRefundResult> for RefundQuoteResponse {
    fn from(result: QuoteRefundResult) -> Self {
        Self {
            refundable_minor: result.quote.refundable.minor(),
            operator_share_minor: result.quote.operator_share.minor(),
            provider_fee_minor: result.quote.provider_fee.minor(),
            currency: result.quote.refundable.currency(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundResponse {
    pub refunded_minor: i64,
    pub currency: Currency,
}

impl From<ExecuteRefundResult> for RefundResponse {
    fn from(result: ExecuteRefundResult) -> Self {
        Self {
            refunded_minor: result.refunded.minor(),
            currency: result.refunded.currency(),
        }
    }
}
