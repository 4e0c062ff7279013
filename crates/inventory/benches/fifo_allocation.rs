use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{Days, NaiveDate};
use lotkeeper_core::{LotId, ProductId};
use lotkeeper_inventory::{InventoryLot, StockPool, apply_plan, plan_fifo};

fn lots(count: usize) -> Vec<InventoryLot> {
    let product_id = ProductId::parse("BENCH-1").expect("valid product id");
    let base = NaiveDate::from_ymd_opt(2030, 1, 1).expect("valid date");
    (0..count)
        .map(|i| {
            // Reverse expiration order so the sort does real work.
            let expires = base + Days::new((count - i) as u64);
            InventoryLot::from_parts(LotId::new(), product_id.clone(), 10, 0, expires, None, 1)
        })
        .collect()
}

fn bench_plan_fifo(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_fifo");

    for count in [4usize, 64, 1024] {
        let candidates = lots(count);
        let requested = (count as u64 * 10) / 2;
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &candidates, |b, candidates| {
            b.iter(|| plan_fifo(black_box(requested), black_box(candidates), StockPool::Available))
        });
    }

    group.finish();
}

fn bench_plan_and_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_and_apply");

    for count in [4usize, 64, 1024] {
        let candidates = lots(count);
        let requested = (count as u64 * 10) / 2;
        group.bench_with_input(BenchmarkId::from_parameter(count), &candidates, |b, candidates| {
            b.iter(|| {
                let mut working = candidates.clone();
                let plan = plan_fifo(requested, &working, StockPool::Available).expect("enough stock");
                apply_plan(&mut working, &plan).expect("plan fits");
                black_box(working)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_plan_fifo, bench_plan_and_apply);
criterion_main!(benches);
