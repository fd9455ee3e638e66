//! Transaction type: the closed two-value enumeration shared by both services.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Kind of inventory movement.
///
/// A purchase adds stock; a sale removes it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Purchase,
    Sale,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Purchase => "purchase",
            TransactionType::Sale => "sale",
        }
    }

    /// Signed stock delta for `quantity` units of this movement.
    pub fn signed(&self, quantity: i64) -> i64 {
        match self {
            TransactionType::Purchase => quantity,
            TransactionType::Sale => -quantity,
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "purchase" => Ok(TransactionType::Purchase),
            "sale" => Ok(TransactionType::Sale),
            other => Err(DomainError::validation(format!(
                "type must be one of: purchase, sale (got '{other}')"
            ))),
        }
    }
}
