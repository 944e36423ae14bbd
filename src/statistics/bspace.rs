// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `bspace_nd` and `bspace8_8d_decimated`: Marsaglia's birthday-spacings
//! test.

use smokerand_core::GenState;

use super::BitSource;
use crate::sort::radix_sort_u64;
use crate::specfn;

/// Sort `points` and count how many consecutive spacings repeat, the
/// collision statistic Marsaglia's birthday-spacings test is built on.
fn spacing_collisions(points: &mut [u64]) -> u64 {
    radix_sort_u64(points);
    let mut spacings: Vec<u64> = points.windows(2).map(|w| w[1] - w[0]).collect();
    radix_sort_u64(&mut spacings);
    spacings.windows(2).filter(|w| w[0] == w[1]).count() as u64
}

/// Two-sided p-value from a Poisson-distributed collision count, following
/// the same "fold the smaller tail" convention used across this module for
/// statistics whose null distribution is one-sided by construction.
fn two_sided_poisson_p(observed: u64, lambda: f64) -> f64 {
    let lower = specfn::poisson_cdf(observed, lambda);
    2.0 * lower.min(1.0 - lower)
}

/// Birthday-spacings in `d` dimensions, `b` bits per dimension, `n` points
/// (requires `d * b <= 64`). Sorts the resulting keys (via [`radix_sort_u64`])
/// and applies a Poisson approximation to the spacing-collision count.
pub fn bspace_nd(gen: &mut dyn GenState, d: u32, b: u32, n: u64) -> (f64, f64) {
    debug_assert!(d * b <= 64);
    let mut bits = BitSource::new(gen);
    let mut points: Vec<u64> = (0..n)
        .map(|_| {
            let mut key = 0u64;
            for _ in 0..d {
                key = (key << b) | bits.next_bits(b);
            }
            key
        })
        .collect();

    let collisions = spacing_collisions(&mut points);
    let k = 2f64.powi((d * b) as i32);
    let lambda = (n as f64).powi(3) / (4.0 * k);
    (collisions as f64, two_sided_poisson_p(collisions, lambda))
}

/// The fixed 8-dimensional, 8-bit-per-dimension variant, decimated: only
/// every `decimation`-th generator word contributes a coordinate byte, the
/// rest are drawn and discarded.
pub fn bspace8_8d_decimated(gen: &mut dyn GenState, n: u64, decimation: u64) -> (f64, f64) {
    const D: u32 = 8;
    const B: u32 = 8;
    let mut points = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let mut key = 0u64;
        for _ in 0..D {
            let word = gen.next().as_u64();
            for _ in 1..decimation {
                gen.next();
            }
            key = (key << B) | (word & 0xFF);
        }
        points.push(key);
    }
    let collisions = spacing_collisions(&mut points);
    let k = 2f64.powi((D * B) as i32);
    let lambda = (n as f64).powi(3) / (4.0 * k);
    (collisions as f64, two_sided_poisson_p(collisions, lambda))
}
