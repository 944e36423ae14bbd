// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `unitsphere`: Monte-Carlo volume of the unit ball in `d` dimensions.

use smokerand_core::GenState;

use super::BitSource;
use crate::specfn;

/// Exact volume of the unit ball in `d` dimensions, `V_d = pi^(d/2) /
/// Gamma(d/2 + 1)`, evaluated in log-space via [`specfn::lgamma`].
fn exact_ball_volume(d: u32) -> f64 {
    let half_d = d as f64 / 2.0;
    (half_d * std::f64::consts::PI.ln() - specfn::lgamma(half_d + 1.0)).exp()
}

/// Estimate the volume of the unit ball in `d` dimensions by sampling `n`
/// points uniformly in `[-1, 1]^d` and scaling the fraction landing inside
/// the ball by the cube's volume `2^d`. The deviation of that Monte-Carlo
/// estimate from [`exact_ball_volume`] is scored via the normal
/// approximation to the underlying Bernoulli count.
pub fn unitsphere(gen: &mut dyn GenState, d: u32, n: u64) -> (f64, f64) {
    let mut bits = BitSource::new(gen);
    let mut inside = 0u64;
    for _ in 0..n {
        let mut sum_sq = 0f64;
        for _ in 0..d {
            let u = 2.0 * bits.next_unit_f64() - 1.0;
            sum_sq += u * u;
        }
        if sum_sq <= 1.0 {
            inside += 1;
        }
    }

    let cube_volume = 2f64.powi(d as i32);
    let p_hat = inside as f64 / n as f64;
    let estimate = p_hat * cube_volume;
    let exact = exact_ball_volume(d);

    // Var(estimate) = cube_volume^2 * p(1-p)/n, using the true inside
    // probability p = exact/cube_volume as the variance's plug-in estimate
    // (standard normal-approximation treatment of a Bernoulli proportion).
    let p0 = (exact / cube_volume).clamp(1e-12, 1.0 - 1e-12);
    let variance = cube_volume * cube_volume * p0 * (1.0 - p0) / n as f64;
    let x = (estimate - exact) / variance.sqrt();
    let p = 2.0 * specfn::norm_ccdf(x.abs());
    (x, p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smokerand_refgen::XorShift64Star;

    #[test]
    fn exact_volume_matches_known_values() {
        // V_1 = 2 (the interval [-1,1]), V_2 = pi, V_3 = 4/3 pi.
        assert!((exact_ball_volume(1) - 2.0).abs() < 1e-9);
        assert!((exact_ball_volume(2) - std::f64::consts::PI).abs() < 1e-9);
        assert!((exact_ball_volume(3) - 4.0 / 3.0 * std::f64::consts::PI).abs() < 1e-9);
    }

    #[test]
    fn unitsphere_p_in_unit_interval() {
        let mut g = XorShift64Star::new(71);
        let (_x, p) = unitsphere(&mut g, 3, 20_000);
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn higher_dimension_still_produces_a_probability() {
        let mut g = XorShift64Star::new(72);
        let (_x, p) = unitsphere(&mut g, 8, 20_000);
        assert!((0.0..=1.0).contains(&p));
    }
}
