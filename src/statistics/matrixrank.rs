// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `matrixrank` (low/high variants): distribution of the rank of random
//! GF(2) matrices built from bit slices.

use std::collections::HashMap;

use smokerand_core::GenState;

use crate::specfn;

/// Gaussian elimination over GF(2), `matrix` given as one `u64` bitmask per
/// row (bit `cols-1` is the leading column). Destroys `matrix` in place and
/// returns its rank.
fn gf2_rank(matrix: &mut [u64], cols: usize) -> usize {
    let mut rank = 0usize;
    for col in (0..cols).rev() {
        let bit = 1u64 << col;
        if let Some(pivot) = (rank..matrix.len()).find(|&r| matrix[r] & bit != 0) {
            matrix.swap(rank, pivot);
            for r in 0..matrix.len() {
                if r != rank && matrix[r] & bit != 0 {
                    matrix[r] ^= matrix[rank];
                }
            }
            rank += 1;
        }
    }
    rank
}

/// Probability a random `rows x cols` GF(2) matrix has full rank
/// `min(rows, cols)`, via the standard product formula.
fn gf2_full_rank_probability(rows: usize, cols: usize) -> f64 {
    let n = rows.min(cols);
    let m = rows.max(cols);
    (1..=n).map(|i| 1.0 - 2f64.powi(-((m - i + 1) as i32))).product()
}

/// Build `n_matrices` random `rows x cols` GF(2) matrices (`cols <= 64`)
/// from successive generator words — the low `cols` bits of each word if
/// `use_high_bits` is `false`, else the high `cols` bits — and compare the
/// observed full-rank fraction against [`gf2_full_rank_probability`] with a
/// one-degree-of-freedom chi-squared statistic.
pub fn matrixrank(
    gen: &mut dyn GenState,
    rows: usize,
    cols: usize,
    n_matrices: u64,
    use_high_bits: bool,
) -> (f64, f64) {
    debug_assert!(cols <= 64);
    let full_rank = rows.min(cols);
    let mut rank_counts: HashMap<usize, u64> = HashMap::new();

    for _ in 0..n_matrices {
        let mut matrix = vec![0u64; rows];
        for row in matrix.iter_mut() {
            let word = gen.next().as_u64();
            *row = if use_high_bits { word >> (64 - cols) } else { word & ((1u64 << cols) - 1) };
        }
        let rank = gf2_rank(&mut matrix, cols);
        *rank_counts.entry(rank).or_insert(0) += 1;
    }

    let p_full = gf2_full_rank_probability(rows, cols);
    let observed_full = *rank_counts.get(&full_rank).unwrap_or(&0) as f64;
    let observed_not = n_matrices as f64 - observed_full;
    let expected_full = n_matrices as f64 * p_full;
    let expected_not = n_matrices as f64 * (1.0 - p_full);

    let x = (observed_full - expected_full).powi(2) / expected_full
        + (observed_not - expected_not).powi(2) / expected_not;
    let p = specfn::chi2_ccdf(x, 1.0);
    (x, p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smokerand_refgen::XorShift64Star;

    #[test]
    fn full_rank_probability_is_in_unit_interval() {
        assert!((0.0..=1.0).contains(&gf2_full_rank_probability(32, 32)));
        assert!((0.0..=1.0).contains(&gf2_full_rank_probability(8, 32)));
    }

    #[test]
    fn matrixrank_low_p_in_unit_interval() {
        let mut g = XorShift64Star::new(41);
        let (_x, p) = matrixrank(&mut g, 32, 32, 400, false);
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn matrixrank_high_p_in_unit_interval() {
        let mut g = XorShift64Star::new(42);
        let (_x, p) = matrixrank(&mut g, 32, 32, 400, true);
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn identity_like_matrix_has_full_rank() {
        let mut matrix: Vec<u64> = (0..8).map(|i| 1u64 << i).collect();
        assert_eq!(gf2_rank(&mut matrix, 8), 8);
    }
}
