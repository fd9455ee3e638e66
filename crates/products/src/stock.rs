//! Stock mutation intent sent from the Transaction service to the Product service.

use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, IntentToken, ProductId, TransactionType, ValueObject};

/// An instruction to move `quantity` units of a product's stock.
///
/// Derived from a recorded transaction and never persisted on its own. The
/// `intent_token` is what makes re-sending it safe: the product store applies a
/// given token at most once.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDelta {
    pub product_id: ProductId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub quantity: i64,
    pub intent_token: IntentToken,
}

impl ValueObject for StockDelta {}

impl StockDelta {
    pub fn new(
        product_id: ProductId,
        kind: TransactionType,
        quantity: i64,
        intent_token: IntentToken,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        Ok(Self {
            product_id,
            kind,
            quantity,
            intent_token,
        })
    }

    /// `+quantity` for a purchase, `-quantity` for a sale.
    pub fn signed(&self) -> i64 {
        self.kind.signed(self.quantity)
    }
}
