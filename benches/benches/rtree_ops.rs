// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};

use canopy_rtree::{Aabb2D, RTree};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

/// Random boxes of roughly `size` side length inside a 100x100 world.
fn gen_random_boxes(count: usize, size: f64, seed: u64) -> Vec<(Aabb2D<f64>, u32)> {
    let mut rng = Rng::new(seed);
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let x = rng.next_f64() * (100.0 - size);
        let y = rng.next_f64() * (100.0 - size);
        let w = size * rng.next_f64();
        let h = size * rng.next_f64();
        out.push((Aabb2D::new(x, y, x + w, y + h), i as u32));
    }
    out
}

fn bench_bulk_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_load");
    for &n in &[1_000usize, 10_000, 100_000] {
        let items = gen_random_boxes(n, 1.0, 0xCAFE_F00D_DEAD_BEEF);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("load_n{}", n), |b| {
            b.iter_batched(
                || items.clone(),
                |items| {
                    let mut tree: RTree<f64, u32> = RTree::with_max_entries(16);
                    let ids = tree.load(&items);
                    black_box(ids.len());
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_insert_one_by_one(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_one_by_one");
    for &n in &[1_000usize, 10_000] {
        let items = gen_random_boxes(n, 1.0, 0xBADC_F00D_1234_5678);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("insert_n{}", n), |b| {
            b.iter_batched(
                || items.clone(),
                |items| {
                    let mut tree: RTree<f64, u32> = RTree::with_max_entries(16);
                    for (aabb, payload) in items {
                        let _ = tree.insert(aabb, payload);
                    }
                    black_box(tree.height());
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    let items = gen_random_boxes(100_000, 1.0, 0xC1A5_7E55_9999_ABCD);
    let mut tree: RTree<f64, u32> = RTree::with_max_entries(16);
    tree.load(&items);

    // Query windows covering ~10%, ~1%, and ~0.01% of the world.
    for &(label, side) in &[("10pct", 31.6), ("1pct", 10.0), ("0_01pct", 1.0)] {
        let queries = gen_random_boxes(1_000, side, 0xFACE_FEED_CAFE_BABE);
        group.bench_function(format!("windows_{}", label), |b| {
            b.iter(|| {
                let mut total = 0usize;
                for (q, _) in &queries {
                    total += tree.search(*q).count();
                }
                black_box(total);
            })
        });
    }

    let queries = gen_random_boxes(1_000, 10.0, 0xFACE_FEED_CAFE_BABE);
    group.bench_function("collides_1pct", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for (q, _) in &queries {
                hits += usize::from(tree.collides(*q));
            }
            black_box(hits);
        })
    });
    group.finish();
}

fn bench_remove_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("remove");
    let items = gen_random_boxes(10_000, 1.0, 0xDEAD_10CC_0123_4567);
    group.bench_function("remove_1000_then_reload", |b| {
        b.iter_batched(
            || {
                let mut tree: RTree<f64, u32> = RTree::with_max_entries(16);
                let ids = tree.load(&items);
                (tree, ids)
            },
            |(mut tree, ids)| {
                for id in &ids[..1_000] {
                    tree.remove(*id);
                }
                let more = tree.load(&items[..1_000]);
                black_box((tree.len(), more.len()));
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_bulk_load,
    bench_insert_one_by_one,
    bench_search,
    bench_remove_churn,
);
criterion_main!(benches);
