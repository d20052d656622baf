//! Monetary value object in minor currency units.
//!
//! All settlement arithmetic happens on integer minor units (cents) to keep
//! the fare decomposition exact. Fractional intermediate values only appear
//! inside the fare calculator, which rounds each component before summing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{DomainError, ErrorCode};

/// Supported settlement currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::Usd
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Currency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            other => Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Unsupported currency: {}", other),
            )),
        }
    }
}

/// An amount of money in minor units of a currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor: i64,
    currency: Currency,
}

impl Money {
    /// Creates an amount from minor units.
    pub fn new(minor: i64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    /// Creates a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self { minor: 0, currency }
    }

    /// Returns the amount in minor units.
    pub fn minor(&self) -> i64 {
        self.minor
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }

    pub fn is_positive(&self) -> bool {
        self.minor > 0
    }

    /// Adds two amounts of the same currency.
    pub fn checked_add(&self, other: &Money) -> Result<Money, DomainError> {
        self.assert_same_currency(other)?;
        Ok(Money::new(self.minor + other.minor, self.currency))
    }

    /// Subtracts another amount, flooring the result at zero.
    pub fn saturating_sub(&self, other: &Money) -> Result<Money, DomainError> {
        self.assert_same_currency(other)?;
        Ok(Money::new((self.minor - other.minor).max(0), self.currency))
    }

    fn assert_same_currency(&self, other: &Money) -> Result<(), DomainError> {
        if self.currency != other.currency {
            return Err(DomainError::new(
                ErrorCode::CurrencyMismatch,
                format!(
                    "Cannot combine {} with {}",
                    self.currency, other.currency
                ),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02} {}", self.minor / 100, (self.minor % 100).abs(), self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_add_same_currency() {
        let a = Money::new(2500, Currency::Usd);
        let b = Money::new(500, Currency::Usd);
        assert_eq!(a.checked_add(&b).unwrap().minor(), 3000);
    }

    #[test]
    fn checked_add_rejects_mixed_currencies() {
        let a = Money::new(100, Currency::Usd);
        let b = Money::new(100, Currency::Eur);
        let err = a.checked_add(&b).unwrap_err();
        assert_eq!(err.code, ErrorCode::CurrencyMismatch);
    }

    #[test]
    fn saturating_sub_floors_at_zero() {
        let a = Money::new(100, Currency::Usd);
        let b = Money::new(250, Currency::Usd);
        assert_eq!(a.saturating_sub(&b).unwrap().minor(), 0);
    }

    #[test]
    fn displays_as_decimal() {
        assert_eq!(Money::new(8700, Currency::Usd).to_string(), "87.00 USD");
        assert_eq!(Money::new(5, Currency::Usd).to_string(), "0.05 USD");
    }

    #[test]
    fn currency_round_trips() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!(Currency::Gbp.as_str(), "GBP");
        assert!("CAD".parse::<Currency>().is_err());
    }
}
