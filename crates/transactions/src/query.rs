//! Read-side filtering and ordering.

use core::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{ProductId, TransactionType};

use crate::transaction::Transaction;

/// Optional query filters; `None` means "don't filter on this field".
///
/// Date bounds are inclusive on both ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub product_id: Option<ProductId>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
}

impl TransactionFilter {
    pub fn for_product(product_id: ProductId) -> Self {
        Self {
            product_id: Some(product_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(p) = self.product_id {
            if tx.product_id != p {
                return false;
            }
        }
        if let Some(start) = self.start_date {
            if tx.date < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if tx.date > end {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if tx.kind != kind {
                return false;
            }
        }
        true
    }

    /// Filter and order in one pass over an unordered source.
    pub fn apply<'a>(&self, source: impl IntoIterator<Item = &'a Transaction>) -> Vec<Transaction> {
        let mut out: Vec<Transaction> = source
            .into_iter()
            .filter(|tx| self.matches(tx))
            .cloned()
            .collect();
        sort_most_recent_first(&mut out);
        out
    }
}

/// Total order used by every listing: `date` descending, then `id` descending.
pub fn most_recent_first(a: &Transaction, b: &Transaction) -> Ordering {
    b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id))
}

pub fn sort_most_recent_first(txs: &mut [Transaction]) {
    txs.sort_by(most_recent_first);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use stockflow_core::{Money, TransactionId};

    use crate::transaction::NewTransaction;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn tx(product_id: ProductId, kind: TransactionType, secs: i64) -> Transaction {
        Transaction::record(
            TransactionId::new(),
            at(secs),
            NewTransaction {
                kind,
                product_id,
                quantity: 1,
                unit_price: Money::new(dec!(1.00)).unwrap(),
                details: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let p = ProductId::new();
        let all = vec![
            tx(p, TransactionType::Sale, 0),
            tx(p, TransactionType::Sale, 10),
            tx(p, TransactionType::Sale, 20),
        ];
        let filter = TransactionFilter {
            start_date: Some(at(10)),
            end_date: Some(at(20)),
            ..Default::default()
        };
        let out = filter.apply(&all);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].date, at(20));
        assert_eq!(out[1].date, at(10));
    }

    #[test]
    fn filters_by_product_and_type() {
        let p = ProductId::new();
        let other = ProductId::new();
        let all = vec![
            tx(p, TransactionType::Sale, 0),
            tx(p, TransactionType::Purchase, 1),
            tx(other, TransactionType::Sale, 2),
        ];
        let filter = TransactionFilter {
            kind: Some(TransactionType::Sale),
            ..TransactionFilter::for_product(p)
        };
        let out = filter.apply(&all);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].product_id, p);
        assert_eq!(out[0].kind, TransactionType::Sale);
    }

    #[test]
    fn equal_dates_fall_back_to_id_descending() {
        let p = ProductId::new();
        let first = tx(p, TransactionType::Sale, 5);
        let second = tx(p, TransactionType::Sale, 5);
        let out = TransactionFilter::default().apply([&first, &second]);
        assert_eq!(out[0].id, second.id);
        assert_eq!(out[1].id, first.id);
    }

    proptest! {
        #[test]
        fn listing_is_non_increasing_by_date_then_id(offsets in proptest::collection::vec(0i64..5, 0..40)) {
            let p = ProductId::new();
            let all: Vec<Transaction> = offsets
                .iter()
                .map(|s| tx(p, TransactionType::Purchase, *s))
                .collect();
            let out = TransactionFilter::default().apply(&all);
            prop_assert_eq!(out.len(), all.len());
            for pair in out.windows(2) {
                prop_assert!(pair[0].date >= pair[1].date);
                if pair[0].date == pair[1].date {
                    prop_assert!(pair[0].id > pair[1].id);
                }
            }
        }
    }
}
