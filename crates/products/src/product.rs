use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, Money, ProductId, TransactionType};

/// A catalog product and its current stock level.
///
/// Owned exclusively by the Product service. Other services only ever see a
/// transient, possibly stale copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Money,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub stock: i64,
}

/// Full replacement of a product's mutable fields.
pub type ProductUpdate = NewProduct;

impl NewProduct {
    fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        if self.stock < 0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }
        Ok(())
    }
}

impl Product {
    /// Build a new product from validated input.
    pub fn create(id: ProductId, input: NewProduct, now: DateTime<Utc>) -> DomainResult<Self> {
        input.validate()?;
        Ok(Self {
            id,
            name: input.name.trim().to_string(),
            category: input.category.trim().to_string(),
            description: input.description,
            price: input.price,
            stock: input.stock,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace name, category, description, price and stock.
    pub fn update(&mut self, input: ProductUpdate, now: DateTime<Utc>) -> DomainResult<()> {
        input.validate()?;
        self.name = input.name.trim().to_string();
        self.category = input.category.trim().to_string();
        self.description = input.description;
        self.price = input.price;
        self.stock = input.stock;
        self.updated_at = now;
        Ok(())
    }

    /// Stock level after moving `quantity` units of `kind`, without mutating.
    ///
    /// Sales may never take stock below zero.
    pub fn stock_after(&self, kind: TransactionType, quantity: i64) -> DomainResult<i64> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        let next = self
            .stock
            .checked_add(kind.signed(quantity))
            .ok_or_else(|| DomainError::invariant("stock overflows"))?;
        if next < 0 {
            return Err(DomainError::insufficient_stock(quantity, self.stock));
        }
        Ok(next)
    }

    /// Apply a stock movement in place.
    pub fn move_stock(
        &mut self,
        kind: TransactionType,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<i64> {
        let next = self.stock_after(kind, quantity)?;
        self.stock = next;
        self.updated_at = now;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn input(stock: i64) -> NewProduct {
        NewProduct {
            name: "Widget".to_string(),
            category: "Hardware".to_string(),
            description: None,
            price: Money::new(dec!(9.99)).unwrap(),
            stock,
        }
    }

    fn product(stock: i64) -> Product {
        Product::create(ProductId::new(), input(stock), Utc::now()).unwrap()
    }

    #[test]
    fn create_rejects_blank_name() {
        let mut i = input(1);
        i.name = "   ".to_string();
        let err = Product::create(ProductId::new(), i, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_rejects_negative_stock() {
        let err = Product::create(ProductId::new(), input(-1), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn update_replaces_fields() {
        let mut p = product(4);
        let mut i = input(11);
        i.name = "Gadget".to_string();
        p.update(i, Utc::now()).unwrap();
        assert_eq!(p.name, "Gadget");
        assert_eq!(p.stock, 11);
    }

    #[test]
    fn sale_decrements_stock() {
        let mut p = product(10);
        assert_eq!(p.move_stock(TransactionType::Sale, 3, Utc::now()).unwrap(), 7);
        assert_eq!(p.stock, 7);
    }

    #[test]
    fn purchase_increments_stock() {
        let mut p = product(0);
        assert_eq!(p.move_stock(TransactionType::Purchase, 5, Utc::now()).unwrap(), 5);
    }

    #[test]
    fn oversell_is_rejected_without_mutation() {
        let mut p = product(2);
        let err = p.move_stock(TransactionType::Sale, 5, Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(5, 2));
        assert_eq!(p.stock, 2);
    }

    #[test]
    fn zero_quantity_is_invalid() {
        let p = product(2);
        assert!(matches!(
            p.stock_after(TransactionType::Purchase, 0),
            Err(DomainError::Validation(_))
        ));
    }

    proptest! {
        #[test]
        fn stock_never_goes_negative(
            start in 0i64..1_000,
            moves in proptest::collection::vec((any::<bool>(), 1i64..200), 0..50),
        ) {
            let mut p = product(start);
            for (is_sale, qty) in moves {
                let kind = if is_sale { TransactionType::Sale } else { TransactionType::Purchase };
                let _ = p.move_stock(kind, qty, Utc::now());
                prop_assert!(p.stock >= 0);
            }
        }
    }
}
