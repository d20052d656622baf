//! In-memory adapters.
//!
//! HashMap-backed implementations of every persistence port, used by unit
//! and integration tests. Lock scopes mirror the atomicity the postgres
//! adapters get from single statements.

mod earnings_ledger;
mod payment_repository;
mod payout_repository;
mod rate_table;
mod ride_repository;
mod webhook_events;

pub use earnings_ledger::InMemoryEarningsLedger;
pub use payment_repository::InMemoryPaymentRepository;
pub use payout_repository::{InMemoryBeneficiaryRepository, InMemoryPayoutRepository};
pub use rate_table::InMemoryRateTable;
pub use ride_repository::InMemoryRideRepository;
pub use webhook_events::InMemoryWebhookEventRepository;
