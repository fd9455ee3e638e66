use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal_macros::dec;
use stockflow_core::{IntentToken, Money, ProductId, TransactionId, TransactionType};
use stockflow_infra::coordinator::{CoordinatorConfig, InventoryMutationCoordinator};
use stockflow_infra::product_client::InProcessProductClient;
use stockflow_infra::product_store::{InMemoryProductStore, ProductStore};
use stockflow_infra::reconciliation::InMemoryReconciliationLog;
use stockflow_infra::retry::RetryPolicy;
use stockflow_infra::transaction_store::InMemoryTransactionStore;
use stockflow_products::{NewProduct, StockDelta};
use stockflow_transactions::{NewTransaction, Transaction, TransactionFilter};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn seeded_store(rt: &tokio::runtime::Runtime, stock: i64) -> (Arc<InMemoryProductStore>, ProductId) {
    let store = Arc::new(InMemoryProductStore::new());
    let product = rt
        .block_on(store.create(NewProduct {
            name: "Widget".to_string(),
            category: "Hardware".to_string(),
            description: None,
            price: Money::new(dec!(3.00)).unwrap(),
            stock,
        }))
        .unwrap();
    (store, product.id)
}

fn bench_apply_delta(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_delta");
    let rt = runtime();

    // Benchmark: every call carries a new token
    group.bench_function("fresh_token", |b| {
        let (store, id) = seeded_store(&rt, 0);
        b.iter(|| {
            let delta = StockDelta::new(id, TransactionType::Purchase, 1, IntentToken::new()).unwrap();
            rt.block_on(store.apply_delta(black_box(&delta))).unwrap();
        });
    });

    // Benchmark: replay of an already applied token
    group.bench_function("replayed_token", |b| {
        let (store, id) = seeded_store(&rt, 0);
        let delta = StockDelta::new(id, TransactionType::Purchase, 1, IntentToken::new()).unwrap();
        rt.block_on(store.apply_delta(&delta)).unwrap();
        b.iter(|| {
            rt.block_on(store.apply_delta(black_box(&delta))).unwrap();
        });
    });

    group.finish();
}

fn bench_coordinator_purchase(c: &mut Criterion) {
    let mut group = c.benchmark_group("coordinator");
    let rt = runtime();

    group.bench_function("purchase_in_process", |b| {
        let (store, id) = seeded_store(&rt, 0);
        let coordinator = InventoryMutationCoordinator::new(
            InProcessProductClient::new(store),
            InMemoryTransactionStore::new(),
            InMemoryReconciliationLog::new(),
            CoordinatorConfig {
                retry: RetryPolicy::no_retry(),
                workflow_timeout: Duration::from_secs(5),
            },
        );
        b.iter(|| {
            let input = NewTransaction {
                kind: TransactionType::Purchase,
                product_id: id,
                quantity: black_box(2),
                unit_price: Money::new(dec!(2.50)).unwrap(),
                details: None,
            };
            rt.block_on(coordinator.create_transaction(input)).unwrap();
        });
    });

    group.finish();
}

fn bench_history_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("history_filter");

    for size in [1_000usize, 10_000, 100_000] {
        let product_ids: Vec<ProductId> = (0..16).map(|_| ProductId::new()).collect();
        let now = Utc::now();
        let records: Vec<Transaction> = (0..size)
            .map(|i| {
                Transaction::record(
                    TransactionId::new(),
                    now - chrono::Duration::minutes(i as i64),
                    NewTransaction {
                        kind: if i % 2 == 0 {
                            TransactionType::Purchase
                        } else {
                            TransactionType::Sale
                        },
                        product_id: product_ids[i % product_ids.len()],
                        quantity: 1,
                        unit_price: Money::new(dec!(1.00)).unwrap(),
                        details: None,
                    },
                )
                .unwrap()
            })
            .collect();
        let filter = TransactionFilter {
            product_id: Some(product_ids[0]),
            kind: Some(TransactionType::Purchase),
            ..Default::default()
        };

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("product_and_type", size), &records, |b, records| {
            b.iter(|| black_box(filter.apply(records.iter())));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_apply_delta,
    bench_coordinator_purchase,
    bench_history_filter
);
criterion_main!(benches);
