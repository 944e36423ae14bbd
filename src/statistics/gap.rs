// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `gap`: Knuth's gap test.

use smokerand_core::GenState;

use super::BitSource;
use crate::specfn;

/// Number of individually-tabulated gap lengths; longer gaps all fall into
/// one overflow cell, matching Knuth's own truncation of the tail.
const TABULATED_GAPS: usize = 20;

/// Knuth's gap test on the sub-interval `[0, 2^-shl)`: the length of the
/// run between successive draws landing in that sub-interval is compared,
/// over `n_gaps` observed gaps, against its geometric distribution via a
/// chi-squared statistic with `TABULATED_GAPS` degrees of freedom.
pub fn gap(gen: &mut dyn GenState, shl: u32, n_gaps: u64) -> (f64, f64) {
    let alpha = 0.5f64.powi(shl as i32);
    let mut bits = BitSource::new(gen);
    let mut counts = [0u64; TABULATED_GAPS + 1];
    let mut collected = 0u64;
    let mut gap_len = 0u64;

    while collected < n_gaps {
        if bits.next_unit_f64() < alpha {
            counts[gap_len.min(TABULATED_GAPS as u64) as usize] += 1;
            collected += 1;
            gap_len = 0;
        } else {
            gap_len += 1;
        }
    }

    let mut expected = [0f64; TABULATED_GAPS + 1];
    for (r, e) in expected.iter_mut().enumerate().take(TABULATED_GAPS) {
        *e = n_gaps as f64 * alpha * (1.0 - alpha).powi(r as i32);
    }
    expected[TABULATED_GAPS] = n_gaps as f64 * (1.0 - alpha).powi(TABULATED_GAPS as i32);

    let x: f64 = counts.iter().zip(expected.iter()).map(|(&c, &e)| {
        let d = c as f64 - e;
        d * d / e
    }).sum();
    let p = specfn::chi2_ccdf(x, TABULATED_GAPS as f64);
    (x, p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smokerand_refgen::XorShift64Star;

    #[test]
    fn gap_p_in_unit_interval() {
        let mut g = XorShift64Star::new(55);
        let (_x, p) = gap(&mut g, 8, 5_000);
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn smaller_sub_interval_collects_same_gap_count() {
        let mut g = XorShift64Star::new(56);
        let (x, _p) = gap(&mut g, 10, 500);
        assert!(x.is_finite());
    }
}
