//! Payment provider adapters.
//!
//! One module per processor, each translating its native protocol into the
//! [`PaymentProvider`](crate::ports::PaymentProvider) port, plus the retry
//! decorator applied to all of them at composition time and a scriptable
//! mock for tests.

mod cardpoint;
mod marketpay;
mod mock;
mod retry;
mod transglobal;

pub use cardpoint::{CardPointConfig, CardPointProvider};
pub use marketpay::{MarketPayConfig, MarketPayProvider};
pub use mock::{MockOutcome, MockProvider, RecordedCall};
pub use retry::{RetryPolicy, RetryingProvider};
pub use transglobal::{TransGlobalConfig, TransGlobalProvider};
