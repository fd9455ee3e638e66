//! Decimal money amounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Minimum number of fraction digits carried by every amount.
pub const MIN_SCALE: u32 = 2;

/// A non-negative decimal amount with at least two fraction digits.
///
/// Serialized as a decimal string (e.g. `"12.50"`) so no precision is lost on
/// the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Accept any amount `>= 0`.
    pub fn new(amount: Decimal) -> DomainResult<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::validation("amount cannot be negative"));
        }
        Ok(Self(normalize(amount)))
    }

    /// Accept only amounts `> 0` (unit prices).
    pub fn positive(amount: Decimal) -> DomainResult<Self> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation("amount must be greater than zero"));
        }
        Ok(Self(normalize(amount)))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// `self * quantity`, failing instead of overflowing.
    pub fn times(&self, quantity: i64) -> DomainResult<Money> {
        if quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(|v| Money(normalize(v)))
            .ok_or_else(|| DomainError::validation("total price overflows"))
    }
}

impl TryFrom<Decimal> for Money {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

fn normalize(mut amount: Decimal) -> Decimal {
    if amount.is_zero() {
        amount.set_sign_positive(true);
    }
    if amount.scale() < MIN_SCALE {
        amount.rescale(MIN_SCALE);
    }
    amount
}
