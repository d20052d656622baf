//! Application layer: command handlers, provider registry, and the payout
//! scheduler.

pub mod handlers;
pub mod providers;
pub mod scheduler;

pub use providers::ProviderRegistry;
