use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, Money, ProductId, TransactionId, TransactionType};

/// Request to record a purchase or sale.
///
/// There is deliberately no `total_price` here: the total is derived, never
/// taken from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    #[serde(default)]
    pub details: Option<String>,
}

/// A recorded purchase or sale. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl NewTransaction {
    /// Check the request without touching any store.
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        if self.unit_price == Money::ZERO {
            return Err(DomainError::validation("unit_price must be greater than zero"));
        }
        self.unit_price.times(self.quantity)?;
        Ok(())
    }
}

impl Transaction {
    /// Build the immutable record for `input`, computing `total_price`.
    pub fn record(
        id: TransactionId,
        date: DateTime<Utc>,
        input: NewTransaction,
    ) -> DomainResult<Self> {
        input.validate()?;
        let total_price = input.unit_price.times(input.quantity)?;
        let details = input
            .details
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        Ok(Self {
            id,
            date,
            kind: input.kind,
            product_id: input.product_id,
            quantity: input.quantity,
            unit_price: input.unit_price,
            total_price,
            details,
        })
    }

    /// Signed stock effect of this transaction.
    pub fn stock_effect(&self) -> i64 {
        self.kind.signed(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sale(quantity: i64, unit: rust_decimal::Decimal) -> NewTransaction {
        NewTransaction {
            kind: TransactionType::Sale,
            product_id: ProductId::new(),
            quantity,
            unit_price: Money::new(unit).unwrap(),
            details: Some("  counter sale ".to_string()),
        }
    }

    #[test]
    fn record_computes_total() {
        let tx = Transaction::record(TransactionId::new(), Utc::now(), sale(3, dec!(2.50))).unwrap();
        assert_eq!(tx.total_price.amount(), dec!(7.50));
        assert_eq!(tx.details.as_deref(), Some("counter sale"));
        assert_eq!(tx.stock_effect(), -3);
    }

    #[test]
    fn record_rejects_zero_quantity() {
        let err = Transaction::record(TransactionId::new(), Utc::now(), sale(0, dec!(1))).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn record_rejects_zero_unit_price() {
        let err = Transaction::record(TransactionId::new(), Utc::now(), sale(1, dec!(0))).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn blank_details_are_dropped() {
        let mut input = sale(1, dec!(1));
        input.details = Some("   ".to_string());
        let tx = Transaction::record(TransactionId::new(), Utc::now(), input).unwrap();
        assert_eq!(tx.details, None);
    }

    #[test]
    fn total_price_in_request_json_is_ignored() {
        let body = serde_json::json!({
            "type": "purchase",
            "product_id": ProductId::new(),
            "quantity": 2,
            "unit_price": "4.00",
            "total_price": "999.00",
        });
        let input: NewTransaction = serde_json::from_value(body).unwrap();
        let tx = Transaction::record(TransactionId::new(), Utc::now(), input).unwrap();
        assert_eq!(tx.total_price.amount(), dec!(8.00));
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let body = serde_json::json!({
            "type": "refund",
            "product_id": ProductId::new(),
            "quantity": 2,
            "unit_price": "4.00",
        });
        assert!(serde_json::from_value::<NewTransaction>(body).is_err());
    }
}
