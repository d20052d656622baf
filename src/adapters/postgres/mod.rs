//! PostgreSQL adapters.
//!
//! One repository per aggregate, all sharing a [`sqlx::PgPool`]. Status
//! enums are stored as text; money as minor-unit bigints next to a
//! currency column.

mod earnings_ledger;
mod payment_repository;
mod payout_repository;
mod rate_table_reader;
mod ride_repository;
mod webhook_event_repository;

pub use earnings_ledger::PostgresEarningsLedger;
pub use payment_repository::PostgresPaymentRepository;
pub use payout_repository::{PostgresBeneficiaryRepository, PostgresPayoutRepository};
pub use rate_table_reader::PostgresRateTableReader;
pub use ride_repository::PostgresRideRepository;
pub use webhook_event_repository::PostgresWebhookEventRepository;
