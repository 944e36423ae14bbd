// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Sort throughput: `fastsort64`'s dispatch decision
//! trades radix sort's linear pass count against quicksort's lower memory
//! footprint, so both need a baseline at a realistic collision-test size.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use smokerand::sort::{quicksort_u64, radix_sort_u64};
use smokerand_core::GenState;
use smokerand_refgen::XorShift64Star;

fn sample(n: usize, seed: u64) -> Vec<u64> {
    let mut g = XorShift64Star::new(seed);
    (0..n).map(|_| g.next().as_u64()).collect()
}

fn bench_sorts(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort_u64");
    for &n in &[1_000usize, 100_000, 1_000_000] {
        let data = sample(n, 7);
        group.bench_with_input(BenchmarkId::new("radix", n), &data, |b, data| {
            b.iter_batched(
                || data.clone(),
                |mut v| radix_sort_u64(black_box(&mut v)),
                criterion::BatchSize::LargeInput,
            )
        });
        group.bench_with_input(BenchmarkId::new("quicksort", n), &data, |b, data| {
            b.iter_batched(
                || data.clone(),
                |mut v| quicksort_u64(black_box(&mut v)),
                criterion::BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sorts);
criterion_main!(benches);
