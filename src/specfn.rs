// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Special functions: the numerical foundation every
//! statistical test builds its p-value on. Target relative error is
//! `1e-10` within each function's stated valid range.

use std::f64::consts::PI;

/// `expm1(x) = e^x - 1`, accurate for small `x` where direct evaluation of
/// `exp(x) - 1` would cancel. Delegates to the platform libm (`f64::exp_m1`),
/// which already implements this with full precision; kept as a named
/// wrapper so every special function in this module goes through the same
/// vocabulary.
#[inline]
pub fn expm1(x: f64) -> f64 {
    x.exp_m1()
}

#[inline]
pub fn log2(x: f64) -> f64 {
    x.log2()
}

/// Round half away from zero (as opposed to `f64::round_ties_even`).
#[inline]
pub fn round_half_away_from_zero(x: f64) -> f64 {
    if x >= 0.0 {
        (x + 0.5).floor()
    } else {
        (x - 0.5).ceil()
    }
}

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEF: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
]; // Lanczos g=7, n=9, standard reference coefficients.

/// `ln(Gamma(x))` via the Lanczos approximation, valid for `x > 0`.
pub fn lgamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection formula: Gamma(x)Gamma(1-x) = pi / sin(pi x).
        let pi_x = PI * x;
        (PI / pi_x.sin()).ln() - lgamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let mut acc = LANCZOS_COEF[0];
        for (i, c) in LANCZOS_COEF.iter().enumerate().skip(1) {
            acc += c / (x + i as f64);
        }
        let t = x + LANCZOS_G + 0.5;
        0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + acc.ln()
    }
}

/// Standard normal PDF.
#[inline]
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Standard normal CDF `Phi(x)`, via the complementary error function so
/// both tails stay accurate.
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Standard normal upper tail `1 - Phi(x)`.
pub fn norm_ccdf(x: f64) -> f64 {
    0.5 * erfc(x / std::f64::consts::SQRT_2)
}

/// Complementary error function, Abramowitz & Stegun 7.1.26 rational
/// approximation composed with a continued-fraction tail for large `|x|`
/// to keep relative error bounded as `erfc(x) -> 0`.
fn erfc(x: f64) -> f64 {
    let ax = x.abs();
    let result = if ax < 2.5 {
        1.0 - erf_series(ax)
    } else {
        erfc_continued_fraction(ax)
    };
    if x >= 0.0 {
        result
    } else {
        2.0 - result
    }
}

fn erf_series(x: f64) -> f64 {
    // Converging Taylor series: erf(x) = (2/sqrt(pi)) sum (-1)^n x^(2n+1) / (n! (2n+1))
    let mut term = x;
    let mut sum = x;
    let mut n = 0f64;
    loop {
        n += 1.0;
        term *= -x * x / n;
        let add = term / (2.0 * n + 1.0);
        sum += add;
        if add.abs() < 1e-18 * sum.abs().max(1e-300) {
            break;
        }
        if n > 200.0 {
            break;
        }
    }
    sum * 2.0 / PI.sqrt()
}

fn erfc_continued_fraction(x: f64) -> f64 {
    // erfc(x) = exp(-x^2)/(x sqrt(pi)) * 1/(1 + 0.5/(x^2 + 1/(1 + 1/(x^2 + 1.5/(...)))))
    // evaluated via Lentz's algorithm, backward recurrence over a fixed
    // number of terms is ample at the x >= 2.5 switch point.
    const TERMS: usize = 60;
    let mut f = 0.0;
    for k in (1..=TERMS).rev() {
        f = (k as f64 / 2.0) / (x + f);
    }
    (-x * x).exp() / ((x + f) * PI.sqrt())
}

/// Inverse standard normal CDF via Acklam's rational approximation,
/// refined with one step of Halley's method for full double precision.
pub fn norm_inv(p: f64) -> f64 {
    debug_assert!(p > 0.0 && p < 1.0);
    const A: [f64; 6] = [
        -3.969_683_028_665_376e+01,
        2.209_460_984_245_205e+02,
        -2.759_285_104_469_687e+02,
        1.383_577_518_672_690e+02,
        -3.066_479_806_614_716e+01,
        2.506_628_277_459_239e+00,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e+01,
        1.615_858_368_580_409e+02,
        -1.556_989_798_598_866e+02,
        6.680_131_188_771_972e+01,
        -1.328_068_155_288_572e+01,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-03,
        -3.223_964_580_411_365e-01,
        -2.400_758_277_161_838e+00,
        -2.549_732_539_343_734e+00,
        4.374_664_141_464_968e+00,
        2.938_163_982_698_783e+00,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-03,
        3.224_671_290_700_398e-01,
        2.445_134_137_142_996e+00,
        3.754_408_661_907_416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    let x = if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    // One Halley refinement step to push relative error near machine epsilon.
    let e = 0.5 * erfc(-x / std::f64::consts::SQRT_2) - p;
    let u = e * (2.0 * PI).sqrt() * (x * x / 2.0).exp();
    x - u / (1.0 + x * u / 2.0)
}

/// Regularised lower incomplete gamma `P(a, x)`, via series for `x < a+1`
/// and a continued fraction otherwise (Numerical Recipes §6.2).
pub fn gamma_p(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x < a + 1.0 {
        gamma_series(a, x)
    } else {
        1.0 - gamma_cf(a, x)
    }
}

/// Regularised upper incomplete gamma `Q(a, x) = 1 - P(a, x)`.
pub fn gamma_q(a: f64, x: f64) -> f64 {
    1.0 - gamma_p(a, x)
}

fn gamma_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut sum = 1.0 / a;
    let mut del = sum;
    for _ in 0..500 {
        ap += 1.0;
        del *= x / ap;
        sum += del;
        if del.abs() < sum.abs() * 1e-16 {
            break;
        }
    }
    sum * (-x + a * x.ln() - lgamma(a)).exp()
}

fn gamma_cf(a: f64, x: f64) -> f64 {
    const TINY: f64 = 1e-300;
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / TINY;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..500 {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < TINY {
            d = TINY;
        }
        c = b + an / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < 1e-16 {
            break;
        }
    }
    (-x + a * x.ln() - lgamma(a)).exp() * h
}

/// `chi^2` CDF with `f` degrees of freedom, with a Wilson-Hilferty
/// normal-approximation fallback for very large `f` where the incomplete
/// gamma series/CF would need too many terms to converge cleanly.
pub fn chi2_cdf(x: f64, f: f64) -> f64 {
    if f >= 1.0e5 {
        wilson_hilferty_cdf(x, f)
    } else {
        gamma_p(f / 2.0, x / 2.0)
    }
}

pub fn chi2_ccdf(x: f64, f: f64) -> f64 {
    if f >= 1.0e5 {
        1.0 - wilson_hilferty_cdf(x, f)
    } else {
        gamma_q(f / 2.0, x / 2.0)
    }
}

fn wilson_hilferty_cdf(x: f64, f: f64) -> f64 {
    let z = ((x / f).powf(1.0 / 3.0) - (1.0 - 2.0 / (9.0 * f))) / (2.0 / (9.0 * f)).sqrt();
    norm_cdf(z)
}

/// Poisson CDF `P(X <= k)` for rate `lambda`, via the incomplete gamma
/// identity `P(X <= k; lambda) = Q(k+1, lambda)`.
pub fn poisson_cdf(k: u64, lambda: f64) -> f64 {
    gamma_q(k as f64 + 1.0, lambda)
}

pub fn poisson_ccdf(k: u64, lambda: f64) -> f64 {
    gamma_p(k as f64 + 1.0, lambda)
}

/// Binomial pmf, evaluated in log-space to avoid overflow for large `n`.
pub fn binomial_pmf(k: u64, n: u64, p: f64) -> f64 {
    if p <= 0.0 {
        return if k == 0 { 1.0 } else { 0.0 };
    }
    if p >= 1.0 {
        return if k == n { 1.0 } else { 0.0 };
    }
    let log_coef = lgamma(n as f64 + 1.0) - lgamma(k as f64 + 1.0) - lgamma((n - k) as f64 + 1.0);
    (log_coef + k as f64 * p.ln() + (n - k) as f64 * (1.0 - p).ln()).exp()
}

/// Binomial CDF `P(X <= k)`, direct coefficient-product summation guarded
/// by the log-space pmf above.
pub fn binomial_cdf(k: u64, n: u64, p: f64) -> f64 {
    (0..=k).map(|i| binomial_pmf(i, n, p)).sum::<f64>().min(1.0)
}

/// Kolmogorov distribution upper tail `P(K > x)`, switching at `x = 1`
/// between the small-x and large-x series (both converge quickly on
/// either side of the switch point, but slowly or not at all past it).
pub fn kolmogorov_ccdf(x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if x < 1.0 {
        1.0 - kolmogorov_cdf_small_x(x)
    } else {
        kolmogorov_ccdf_large_x(x)
    }
}

fn kolmogorov_cdf_small_x(x: f64) -> f64 {
    // P(K <= x) = (sqrt(2 pi)/x) * sum_{k=1}^inf exp(-(2k-1)^2 pi^2 / (8 x^2))
    let mut sum = 0.0;
    for k in 1..200u64 {
        let term = (-((2 * k - 1) as f64).powi(2) * PI * PI / (8.0 * x * x)).exp();
        sum += term;
        if term < 1e-300 {
            break;
        }
    }
    (2.0 * PI).sqrt() / x * sum
}

fn kolmogorov_ccdf_large_x(x: f64) -> f64 {
    // P(K > x) = 2 sum_{k=1}^inf (-1)^(k-1) exp(-2 k^2 x^2)
    let mut sum = 0.0;
    let mut sign = 1.0;
    for k in 1..200u64 {
        let term = sign * (-2.0 * (k as f64).powi(2) * x * x).exp();
        sum += term;
        sign = -sign;
        if term.abs() < 1e-300 {
            break;
        }
    }
    (2.0 * sum).clamp(0.0, 1.0)
}

/// Two-sided Student's t CDF with `nu` degrees of freedom, via the
/// incomplete beta function expressed through the regularised incomplete
/// gamma for the half-integer case that linear-complexity-style tests
/// reduce to (`nu` here is always a positive real).
pub fn student_t_cdf_two_sided(t: f64, nu: f64) -> f64 {
    1.0 - student_t_ccdf_two_sided(t, nu)
}

pub fn student_t_ccdf_two_sided(t: f64, nu: f64) -> f64 {
    let x = nu / (nu + t * t);
    incomplete_beta(x, nu / 2.0, 0.5)
}

fn incomplete_beta(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let bt = (lgamma(a + b) - lgamma(a) - lgamma(b) + a * x.ln() + b * (1.0 - x).ln()).exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        bt * beta_cf(x, a, b) / a
    } else {
        1.0 - bt * beta_cf(1.0 - x, b, a) / b
    }
}

fn beta_cf(x: f64, a: f64, b: f64) -> f64 {
    const TINY: f64 = 1e-300;
    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;
    for m in 1..300i64 {
        let m2 = 2 * m;
        let mf = m as f64;
        let aa = mf * (b - mf) * x / ((qam + m2 as f64) * (a + m2 as f64));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + mf) * (qab + mf) * x / ((a + m2 as f64) * (qap + m2 as f64));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < 1e-15 {
            break;
        }
    }
    h
}

/// Half-normal upper tail `2 * Phi(-x)`.
pub fn half_normal_ccdf(x: f64) -> f64 {
    2.0 * norm_cdf(-x)
}

/// The 7-cell piecewise distribution for the linear-complexity test
/// statistic. Cell boundaries and probabilities
/// follow the standard NIST SP 800-22 linear complexity test table for the
/// normalised statistic `T`; `pi_cdf` returns the cumulative probability
/// up to and including cell `cell_index` (0..=6).
pub const LINEAR_COMPLEXITY_CELL_PROBS: [f64; 7] =
    [0.010_417, 0.031_250, 0.125_000, 0.500_000, 0.250_000, 0.062_500, 0.020_833];

pub fn linear_complexity_cell(t: f64) -> usize {
    if t <= -2.5 {
        0
    } else if t <= -1.5 {
        1
    } else if t <= -0.5 {
        2
    } else if t <= 0.5 {
        3
    } else if t <= 1.5 {
        4
    } else if t <= 2.5 {
        5
    } else {
        6
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn lgamma_matches_known_values() {
        // lgamma(5) = ln(4!) = ln(24)
        assert!((lgamma(5.0) - 24f64.ln()).abs() < 1e-9);
        // lgamma(1) = lgamma(2) = 0
        assert!(lgamma(1.0).abs() < 1e-9);
        assert!(lgamma(2.0).abs() < 1e-9);
    }

    #[test]
    fn norm_inv_antisymmetric() {
        for &delta in &[1e-6, 0.01, 0.1, 0.3, 0.49999] {
            let lo = norm_inv(0.5 - delta);
            let hi = norm_inv(0.5 + delta);
            assert!((lo + hi).abs() < 1e-9, "delta={delta} lo={lo} hi={hi}");
        }
    }

    #[test]
    fn norm_cdf_ccdf_sum_to_one() {
        for &x in &[-4.0, -1.0, 0.0, 0.5, 2.0, 5.0] {
            assert!((norm_cdf(x) + norm_ccdf(x) - 1.0).abs() < 1e-12);
        }
    }

    proptest! {
        #[test]
        fn chi2_cdf_plus_ccdf_is_one(
            x in 1e-8f64..1e6,
            f in 1u32..100_000,
        ) {
            let f = f as f64;
            let sum = chi2_cdf(x, f) + chi2_ccdf(x, f);
            prop_assert!((sum - 1.0).abs() < 1e-9);
        }

        #[test]
        fn gamma_p_q_complementary(a in 0.1f64..50.0, x in 0.0f64..200.0) {
            prop_assert!((gamma_p(a, x) + gamma_q(a, x) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn kolmogorov_ccdf_is_decreasing() {
        let mut prev = 1.0;
        for i in 1..50 {
            let x = i as f64 * 0.1;
            let cur = kolmogorov_ccdf(x);
            assert!(cur <= prev + 1e-9);
            prev = cur;
        }
    }

    #[test]
    fn binomial_cdf_reaches_one_at_n() {
        assert!((binomial_cdf(10, 10, 0.3) - 1.0).abs() < 1e-9);
    }
}
