//! Type-safe price representation using decimal arithmetic.
//!
//! Prices arrive from forms as text and are coerced to a number before they
//! are written; in documents they are stored as plain JSON numbers.

use core::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors that can occur when parsing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input string is empty.
    #[error("Price is required")]
    Empty,
    /// The input is not a number.
    #[error("Must be a number")]
    NotANumber,
    /// The value is below zero.
    #[error("Price cannot be negative")]
    Negative,
}

/// A non-negative catalog price in rupees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(Decimal);

impl Price {
    /// Zero price, used when a stored document has no price.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if the amount is below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        Ok(Self(amount))
    }

    /// Coerce form input into a price.
    ///
    /// Surrounding whitespace is ignored; scientific notation is accepted the
    /// same way a numeric form field would accept it.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is blank, not numeric, or negative.
    pub fn parse(s: &str) -> Result<Self, PriceError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PriceError::Empty);
        }
        let amount = Decimal::from_str(s)
            .or_else(|_| Decimal::from_scientific(s))
            .map_err(|_| PriceError::NotANumber)?;
        Self::new(amount)
    }

    /// Returns the decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Format with Indian digit grouping, e.g. `1,25,000.50`.
    #[must_use]
    pub fn display_inr(&self) -> String {
        let rounded = self.0.round_dp(2).normalize();
        let text = rounded.to_string();
        let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));

        let digits: Vec<char> = whole.chars().collect();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 2);
        let len = digits.len();
        for (i, c) in digits.iter().enumerate() {
            let remaining = len - i;
            if i > 0 && (remaining == 3 || (remaining > 3 && (remaining - 3) % 2 == 0)) {
                grouped.push(',');
            }
            grouped.push(*c);
        }

        if fraction.is_empty() {
            grouped
        } else {
            format!("{grouped}.{fraction}")
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = rust_decimal::serde::float::deserialize(deserializer)?;
        Self::new(amount).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_prices() {
        assert_eq!(
            Price::parse("1500").map(|p| p.amount()),
            Ok(Decimal::new(1500, 0))
        );
        assert_eq!(
            Price::parse(" 99.95 ").map(|p| p.amount()),
            Ok(Decimal::new(9995, 2))
        );
        assert_eq!(Price::parse("0").map(|p| p.amount()), Ok(Decimal::ZERO));
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert_eq!(Price::parse(""), Err(PriceError::Empty));
        assert_eq!(Price::parse("   "), Err(PriceError::Empty));
        assert_eq!(Price::parse("abc"), Err(PriceError::NotANumber));
        assert_eq!(Price::parse("-5"), Err(PriceError::Negative));
    }

    #[test]
    fn test_serializes_as_number() {
        let price = Price::parse("2500.5").unwrap();
        let json = serde_json::to_value(price).unwrap();
        assert!(json.is_number());
        assert_eq!(json.as_f64(), Some(2500.5));
    }

    #[test]
    fn test_deserialize_rejects_negative() {
        let result: Result<Price, _> = serde_json::from_str("-1.0");
        assert!(result.is_err());
    }

    #[test]
    fn test_display_inr_grouping() {
        let fmt = |s: &str| Price::parse(s).unwrap().display_inr();
        assert_eq!(fmt("0"), "0");
        assert_eq!(fmt("999"), "999");
        assert_eq!(fmt("1000"), "1,000");
        assert_eq!(fmt("125000.5"), "1,25,000.5");
        assert_eq!(fmt("12345678"), "1,23,45,678");
    }
}
