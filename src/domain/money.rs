use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use crate::domain::Error;

/// A strictly positive amount of money, held at cent precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    pub const DECIMALS: u32 = 2;

    /// Rounds half to even at [`Money::DECIMALS`] and rejects anything that
    /// does not end up above zero.
    pub fn new(value: Decimal) -> Result<Self, Error> {
        let rounded = value.round_dp(Self::DECIMALS);
        if rounded <= Decimal::ZERO {
            return Err(Error::InvalidAmount(format!(
                "{} must be a positive number",
                value
            )));
        }
        Ok(Self(rounded))
    }

    pub fn from_decimal_str(s: &str) -> Result<Self, Error> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidAmount("amount is required".to_string()));
        }
        let value = Decimal::from_str(s)
            .map_err(|_| Error::InvalidAmount(format!("'{}' is not a number", s)))?;
        Self::new(value)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Money {
    type Error = Error;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for Money {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_decimal_str(s)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Money::from_decimal_str(&s).map_err(serde::de::Error::custom)
    }
}
