// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Special-function evaluation cost: these run once per test observation
//! in a battery, so a slow `chi2_ccdf` or `norm_inv` shows up directly in
//! wall-clock per test.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use smokerand::specfn;

fn bench_norm(c: &mut Criterion) {
    c.bench_function("norm_cdf", |b| {
        b.iter(|| specfn::norm_cdf(black_box(1.2345)))
    });
    c.bench_function("norm_inv", |b| {
        b.iter(|| specfn::norm_inv(black_box(0.975)))
    });
}

fn bench_chi2(c: &mut Criterion) {
    c.bench_function("chi2_ccdf_small_dof", |b| {
        b.iter(|| specfn::chi2_ccdf(black_box(12.5), black_box(6.0)))
    });
    c.bench_function("chi2_ccdf_large_dof", |b| {
        b.iter(|| specfn::chi2_ccdf(black_box(1.0e5), black_box(1.0e5)))
    });
}

fn bench_lgamma(c: &mut Criterion) {
    c.bench_function("lgamma", |b| b.iter(|| specfn::lgamma(black_box(37.5))));
}

criterion_group!(benches, bench_norm, bench_chi2, bench_lgamma);
criterion_main!(benches);
