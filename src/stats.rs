// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Collection of methods for statistical analysis.
//! Distribution tails and CDFs used by the test algorithms to turn
//! empirical statistics into p-values. Special functions come from statrs.

use core::f64;

use crate::utils;
use statrs::function::{
    erf::{erf, erfc},
    factorial::ln_binomial,
    gamma::{gamma_lr, gamma_ur},
};

/// Above this many degrees of freedom chi-square values are converted
/// with the Wilson-Hilferty approximation.
const CHI2_WH_DF_LIMIT: u64 = 100_000;

/// Regularized lower incomplete gamma P(a, x) with the x <= 0 and x = inf
/// edges handled here instead of inside statrs.
fn lower_gamma(a: f64, x: f64) -> f64 {
    if x.is_nan() {
        f64::NAN
    } else if x <= 0.0 {
        0.0
    } else if x.is_infinite() {
        1.0
    } else {
        gamma_lr(a, x)
    }
}

/// Regularized upper incomplete gamma Q(a, x), see `lower_gamma`.
fn upper_gamma(a: f64, x: f64) -> f64 {
    if x.is_nan() {
        f64::NAN
    } else if x <= 0.0 {
        1.0
    } else if x.is_infinite() {
        0.0
    } else {
        gamma_ur(a, x)
    }
}

/// Standard normal CDF.
pub fn stdnorm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x * utils::INV_ROOT2)
}

/// Standard normal upper tail, 1 - CDF.
pub fn stdnorm_pvalue(x: f64) -> f64 {
    0.5 * erfc(x * utils::INV_ROOT2)
}

/// Poisson upper tail P(X > x) for mean `lambda`.
pub fn poisson_pvalue(x: f64, lambda: f64) -> f64 {
    if x < 0.0 {
        return 1.0;
    }
    lower_gamma(x.floor() + 1.0, lambda)
}

/// Poisson CDF P(X <= x) for mean `lambda`.
pub fn poisson_cdf(x: f64, lambda: f64) -> f64 {
    if x < 0.0 {
        return 0.0;
    }
    upper_gamma(x.floor() + 1.0, lambda)
}

/// Converts a chi-square distributed value with `f` degrees of freedom
/// to an approximately standard normal one (Wilson-Hilferty).
pub fn chi2_to_stdnorm_approx(x: f64, f: u64) -> f64 {
    let f = f as f64;
    let s2 = 2.0 / (9.0 * f);
    ((x / f).cbrt() - (1.0 - s2)) / s2.sqrt()
}

/// Chi-square upper tail for `f` degrees of freedom.
pub fn chi2_pvalue(x: f64, f: u64) -> f64 {
    assert!(f > 0, "chi-square distribution needs at least 1 degree of freedom");
    if x.is_nan() {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 1.0;
    }
    match f {
        1 => 2.0 * stdnorm_pvalue(x.sqrt()),
        2 => (-0.5 * x).exp(),
        f if f < CHI2_WH_DF_LIMIT => upper_gamma(f as f64 / 2.0, x / 2.0),
        f => stdnorm_pvalue(chi2_to_stdnorm_approx(x, f)),
    }
}

/// Chi-square CDF for `f` degrees of freedom.
pub fn chi2_cdf(x: f64, f: u64) -> f64 {
    assert!(f > 0, "chi-square distribution needs at least 1 degree of freedom");
    if x.is_nan() {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 0.0;
    }
    match f {
        1 => erf((x / 2.0).sqrt()),
        2 => -(-0.5 * x).exp_m1(),
        f if f < CHI2_WH_DF_LIMIT => lower_gamma(f as f64 / 2.0, x / 2.0),
        f => stdnorm_cdf(chi2_to_stdnorm_approx(x, f)),
    }
}

/// Binomial probability mass P(X = k) for `n` trials with success probability `p`.
pub fn binomial_pdf(k: u64, n: u64, p: f64) -> f64 {
    if k > n {
        return 0.0;
    }
    let ln_pdf = ln_binomial(n, k) + k as f64 * p.ln() + (n - k) as f64 * (1.0 - p).ln();
    ln_pdf.exp()
}

/// Kolmogorov distribution upper tail Q(K) = P(sqrt(n) D > K).
pub fn ks_pvalue(k: f64) -> f64 {
    if k.is_nan() {
        return f64::NAN;
    }
    if k <= 0.0 {
        return 1.0;
    }
    if k < 1.18 {
        // Theta function form converges fast for small K.
        let pi2 = f64::consts::PI * f64::consts::PI;
        let mut cdf = 0.0;
        for j in 1..=8 {
            let m = (2 * j - 1) as f64;
            cdf += (-m * m * pi2 / (8.0 * k * k)).exp();
        }
        1.0 - cdf * (2.0 * f64::consts::PI).sqrt() / k
    } else {
        let mut q = 0.0;
        for j in 1..=8 {
            let sign = if j % 2 == 1 { 2.0 } else { -2.0 };
            let j = j as f64;
            q += sign * (-2.0 * j * j * k * k).exp();
        }
        q.clamp(0.0, 1.0)
    }
}

/// Kolmogorov-Smirnov distance between the sorted sample of probabilities
/// `cdf_values` (already mapped through the hypothesized CDF) and the uniform
/// distribution. Returns the corrected statistic K = sqrt(n) D + 1 / (6 sqrt(n)).
pub fn ks_uniform_statistic(cdf_values: &mut [f64]) -> f64 {
    cdf_values.sort_by(f64::total_cmp);
    let n = cdf_values.len() as f64;
    let mut d: f64 = 0.0;
    for (i, &f) in cdf_values.iter().enumerate() {
        let i = i as f64;
        d = d.max((i + 1.0) / n - f).max(f - i / n);
    }
    n.sqrt() * d + 1.0 / (6.0 * n.sqrt())
}
