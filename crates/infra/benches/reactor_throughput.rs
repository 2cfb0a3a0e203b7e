use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;
use std::time::Duration;

use comanda_auth::{Caller, GroupId, Membership, features};
use comanda_core::{CommandId, CompanyId, Money, SystemClock, UserId};
use comanda_dining::{Order, command_total};
use comanda_infra::services::AddOrderInput;
use comanda_infra::{Engine, EngineConfig};

fn engine_with_waiter(workers: usize) -> (Engine, Caller) {
    let config = EngineConfig {
        reactor_workers: workers,
        ..EngineConfig::default()
    };
    let engine = Engine::start(config, Arc::new(SystemClock)).expect("engine starts");
    let user = UserId::new();
    let group = GroupId::new();
    engine.grants.add_membership(Membership::new(user, group)).expect("membership");
    engine
        .grants
        .grant_all(
            group,
            [features::COMMAND_MANAGE, features::ORDER_MANAGE, features::TABLE_MANAGE],
        )
        .expect("grants");
    (engine, Caller::new(user, CompanyId::new()))
}

fn order(command_id: CommandId, cents: i64) -> AddOrderInput {
    AddOrderInput {
        command_id,
        product_ref: "bench".to_string(),
        base_price: Money::from_cents(cents),
        modifiers_price: Money::ZERO,
        notes: None,
    }
}

/// Use case latency up to commit (reactors run off the caller's thread).
fn bench_add_order_latency(c: &mut Criterion) {
    let (engine, waiter) = engine_with_waiter(4);
    let table = engine.dining.create_table(&waiter, "B1", None).expect("table");
    let command = engine.dining.open_command(&waiter, table, "bench", None).expect("command");

    let mut group = c.benchmark_group("add_order");
    group.sample_size(200);
    group.bench_function("commit_only", |b| {
        b.iter(|| {
            engine
                .dining
                .add_order(&waiter, black_box(order(command, 1_000)))
                .expect("order added")
        })
    });
    group.finish();
    engine.bus.wait_idle(Duration::from_secs(30));
}

/// Orders committed, then the reactor pool drained until totals converge.
fn bench_convergence(c: &mut Criterion) {
    let mut group = c.benchmark_group("total_convergence");
    for workers in [1usize, 4] {
        for orders in [10usize, 100] {
            group.throughput(Throughput::Elements(orders as u64));
            group.bench_with_input(
                BenchmarkId::new(format!("workers_{workers}"), orders),
                &orders,
                |b, &orders| {
                    let (engine, waiter) = engine_with_waiter(workers);
                    let table = engine.dining.create_table(&waiter, "B2", None).expect("table");
                    b.iter(|| {
                        let command = engine
                            .dining
                            .open_command(&waiter, table, "bench", None)
                            .expect("command");
                        for _ in 0..orders {
                            engine.dining.add_order(&waiter, order(command, 250)).expect("order");
                        }
                        engine.bus.wait_idle(Duration::from_secs(30))
                    })
                },
            );
        }
    }
    group.finish();
}

/// The pure recomputation the total reactor runs per event.
fn bench_command_total(c: &mut Criterion) {
    let company = CompanyId::new();
    let command = CommandId::new();
    let mut group = c.benchmark_group("command_total");
    for size in [10usize, 1_000] {
        let orders: Vec<Order> = (0..size)
            .map(|i| {
                Order::place(
                    comanda_core::OrderId::new(),
                    company,
                    command,
                    "bench",
                    Money::from_cents(i as i64 + 1),
                    Money::ZERO,
                    None,
                    chrono::Utc::now(),
                )
                .expect("order")
            })
            .collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &orders, |b, orders| {
            b.iter(|| command_total(black_box(orders), Money::ZERO))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_add_order_latency,
    bench_convergence,
    bench_command_total
);
criterion_main!(benches);
