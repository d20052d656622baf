//! Webhook normalization, signature verification, and errors.

mod errors;
mod event;
mod signature;

pub use errors::WebhookError;
pub use event::{EventKind, NormalizedEvent};
pub use signature::{
    hmac_sha256_hex, hmac_sha512_hex, verify_hmac_sha256_hex, verify_hmac_sha512_hex,
    verify_timestamp, SignatureHeader, MAX_CLOCK_SKEW_SECS, MAX_EVENT_AGE_SECS,
};
