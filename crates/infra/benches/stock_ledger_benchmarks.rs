use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use uuid::Uuid;

use shopkeeper_core::{AggregateId, TenantId};
use shopkeeper_events::{EventEnvelope, InMemoryEventBus};
use shopkeeper_infra::command_dispatcher::CommandDispatcher;
use shopkeeper_infra::event_store::InMemoryEventStore;
use shopkeeper_infra::projections::stock_levels::StockLevelsProjection;
use shopkeeper_infra::read_model::InMemoryStockLevelStore;
use shopkeeper_inventory::{
    ApplyMovement, MovementReference, MovementType, ProductId, ProductStock, StockCommand,
};
use shopkeeper_warehousing::WarehouseId;

/// Naive CRUD baseline: direct key-value updates (no ledger, no history).
#[derive(Debug, Clone)]
struct NaiveCrudStore {
    inner: Arc<RwLock<HashMap<(TenantId, AggregateId), CrudLevel>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CrudLevel {
    quantity: i64,
    version: u64,
}

impl NaiveCrudStore {
    fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn receive(&self, tenant_id: TenantId, product_id: AggregateId, quantity: i64) {
        let mut map = self.inner.write().unwrap();
        let level = map.entry((tenant_id, product_id)).or_insert(CrudLevel {
            quantity: 0,
            version: 0,
        });
        level.quantity += quantity;
        level.version += 1;
    }
}

type Dispatcher = CommandDispatcher<
    Arc<InMemoryEventStore>,
    Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>,
>;

fn setup_ledger() -> (Dispatcher, Arc<InMemoryEventStore>, TenantId, ProductId, WarehouseId) {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>> =
        Arc::new(InMemoryEventBus::new());
    let dispatcher = CommandDispatcher::new(store.clone(), bus);
    (
        dispatcher,
        store,
        TenantId::new(),
        ProductId::new(AggregateId::new()),
        WarehouseId::new(AggregateId::new()),
    )
}

fn purchase(
    tenant_id: TenantId,
    product_id: ProductId,
    warehouse_id: WarehouseId,
    quantity: i64,
) -> ApplyMovement {
    ApplyMovement {
        tenant_id,
        product_id,
        movement_id: Uuid::now_v7(),
        movement_type: MovementType::Purchase,
        warehouse_id,
        related_warehouse_id: None,
        quantity,
        reference: MovementReference::default(),
        recorded_by: None,
        occurred_at: Utc::now(),
    }
}

fn dispatch_purchase(dispatcher: &Dispatcher, cmd: ApplyMovement) {
    dispatcher
        .dispatch(
            cmd.tenant_id,
            cmd.product_id.0,
            shopkeeper_inventory::AGGREGATE_TYPE,
            StockCommand::ApplyMovement(cmd.clone()),
            |_, id| ProductStock::empty(ProductId::new(id)),
        )
        .expect("dispatch failed");
}

fn bench_movement_apply_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("movement_apply_latency");

    group.bench_function("ledger_dispatch", |b| {
        // Fresh product per iteration batch keeps stream depth bounded.
        b.iter_batched(
            setup_ledger,
            |(dispatcher, _store, tenant_id, product_id, warehouse_id)| {
                dispatch_purchase(
                    &dispatcher,
                    purchase(tenant_id, product_id, warehouse_id, black_box(10)),
                );
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.bench_function("naive_crud_update", |b| {
        let store = NaiveCrudStore::new();
        let tenant_id = TenantId::new();
        let product_id = AggregateId::new();
        b.iter(|| {
            store.receive(tenant_id, product_id, black_box(10));
        });
    });

    group.finish();
}

fn bench_rehydration_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("rehydration_depth");

    for depth in [10u64, 100, 500] {
        let (dispatcher, _store, tenant_id, product_id, warehouse_id) = setup_ledger();
        for _ in 0..depth {
            dispatch_purchase(&dispatcher, purchase(tenant_id, product_id, warehouse_id, 1));
        }

        group.throughput(Throughput::Elements(depth));
        group.bench_with_input(
            BenchmarkId::from_parameter(depth),
            &depth,
            |b, _| {
                // Each dispatch replays the whole stream before deciding.
                b.iter(|| {
                    dispatch_purchase(
                        &dispatcher,
                        purchase(tenant_id, product_id, warehouse_id, black_box(1)),
                    );
                });
            },
        );
    }

    group.finish();
}

fn bench_projection_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection_replay");

    let (dispatcher, store, tenant_id, product_id, warehouse_id) = setup_ledger();
    for _ in 0..1000 {
        dispatch_purchase(&dispatcher, purchase(tenant_id, product_id, warehouse_id, 1));
    }
    let stream = store.load_stream(tenant_id, product_id.0).unwrap();

    group.throughput(Throughput::Elements(stream.len() as u64));
    group.bench_function("rebuild_1000_events", |b| {
        b.iter(|| {
            let projection =
                StockLevelsProjection::new(Arc::new(InMemoryStockLevelStore::new()));
            projection
                .rebuild_from_scratch(stream.iter().map(|e| e.to_envelope()))
                .unwrap();
            black_box(projection.list(tenant_id).len())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_movement_apply_latency,
    bench_rehydration_depth,
    bench_projection_replay
);
criterion_main!(benches);
