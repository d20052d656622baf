//! Ports - interfaces between the application core and the outside world.

mod earnings_ledger;
mod payment_provider;
mod payment_repository;
mod payout_repository;
mod rate_table_reader;
mod ride_repository;
mod webhook_event_repository;

pub use earnings_ledger::EarningsLedger;
pub use payment_provider::{
    AuthorizeRequest, AuthorizeResponse, PaymentProvider, PayoutResponse, ProviderError,
    ProviderErrorKind, ResultCode,
};
pub use payment_repository::PaymentRepository;
pub use payout_repository::{BeneficiaryRepository, PayoutRepository};
pub use rate_table_reader::RateTableReader;
pub use ride_repository::RideRepository;
pub use webhook_event_repository::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookEventStatus,
};
