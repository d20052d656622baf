//! Canonical webhook event shape.
//!
//! Every provider's native payload is parsed by its adapter into this one
//! normalized form before any state is touched.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::domain::foundation::Money;
use crate::domain::payment::ProviderKind;

/// The settlement operations a webhook can report on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Authorisation,
    Capture,
    Refund,
    Payout,
    /// Event types this service does not know yet. Logged and ignored so
    /// providers can roll out new types without breaking reconciliation.
    Unknown(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Authorisation => "authorisation",
            EventKind::Capture => "capture",
            EventKind::Refund => "refund",
            EventKind::Payout => "payout",
            EventKind::Unknown(s) => s.as_str(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, EventKind::Unknown(_))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        match s {
            "authorisation" => EventKind::Authorisation,
            "capture" => EventKind::Capture,
            "refund" => EventKind::Refund,
            "payout" => EventKind::Payout,
            other => EventKind::Unknown(other.to_string()),
        }
    }
}

/// Provider-agnostic webhook notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub provider: ProviderKind,
    pub kind: EventKind,
    /// Provider-side reference of the object the event concerns.
    pub external_ref: String,
    /// Reference of the originating object, e.g. the authorization a
    /// capture or refund belongs to.
    pub original_ref: Option<String>,
    pub amount: Option<Money>,
    pub success: bool,
    pub metadata: HashMap<String, String>,
}

impl NormalizedEvent {
    /// The tuple applied at most once to downstream state.
    pub fn dedup_key(&self) -> (ProviderKind, &str, &str) {
        (self.provider, self.external_ref.as_str(), self.kind.as_str())
    }
}
