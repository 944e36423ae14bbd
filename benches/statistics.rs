// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Per-test throughput for a representative handful of the statistical
//! test library: these bound how large a sample size
//! a battery can afford for a given wall-clock budget.

use criterion::{criterion_group, criterion_main, Criterion};
use smokerand::statistics;
use smokerand_core::GenState;
use smokerand_refgen::XorShift64Star;

fn bench_freq(c: &mut Criterion) {
    c.bench_function("monobit_freq_1e5", |b| {
        b.iter(|| {
            let mut g = XorShift64Star::new(1);
            statistics::monobit_freq(&mut g as &mut dyn GenState, 100_000)
        })
    });
}

fn bench_gap(c: &mut Criterion) {
    c.bench_function("gap8_5e3", |b| {
        b.iter(|| {
            let mut g = XorShift64Star::new(2);
            statistics::gap(&mut g as &mut dyn GenState, 8, 5_000)
        })
    });
}

fn bench_ising(c: &mut Criterion) {
    c.bench_function("ising2d_metropolis_4x100", |b| {
        b.iter(|| {
            let mut g = XorShift64Star::new(3);
            statistics::ising2d(&mut g as &mut dyn GenState, statistics::IsingAlgorithm::Metropolis, 4, 100)
        })
    });
}

fn bench_matrixrank(c: &mut Criterion) {
    c.bench_function("matrixrank_32x32_500", |b| {
        b.iter(|| {
            let mut g = XorShift64Star::new(4);
            statistics::matrixrank(&mut g as &mut dyn GenState, 32, 32, 500, false)
        })
    });
}

criterion_group!(benches, bench_freq, bench_gap, bench_ising, bench_matrixrank);
criterion_main!(benches);
