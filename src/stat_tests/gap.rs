// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Knuth's gap test, good at catching lagged Fibonacci generators.

use log::{info, warn};

use super::TestResult;
use crate::generator::GeneratorState;
use crate::stats::{chi2_cdf, chi2_pvalue};

/// Minimal expected count of the last regular bin.
const EI_MIN: f64 = 10.0;
/// A gap longer than `PROBE_FACTOR / p` draws is treated as a generator
/// that cannot reach the interval at all.
const PROBE_FACTOR: u64 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct GapOptions {
    /// The interval is `[0, 2^(nbits - shl))`, hit with probability `2^-shl`.
    pub shl: u32,
    pub ngaps: u64,
}

/// Number of regular bins for geometrically distributed observations with
/// success probability `p` so the last one still expects `EI_MIN` counts.
pub(crate) fn geometric_nbins(p: f64, nobs: u64) -> usize {
    let nbins = ((EI_MIN / (nobs as f64 * p)).ln() / (1.0 - p).ln()).floor();
    if nbins.is_finite() && nbins >= 1.0 {
        nbins as usize
    } else {
        1
    }
}

/// Chi-square statistic of gap lengths against `p (1 - p)^k`. The last
/// element of `oi` is the overflow bin for all lengths `>= oi.len() - 1`.
/// Returns the statistic and its degrees of freedom.
pub(crate) fn geometric_chi2(oi: &[u64], p: f64, nobs: u64) -> (f64, u64) {
    let nbins = oi.len() - 1;
    let nobs = nobs as f64;
    let mut tail = 1.0;
    let mut chi2 = 0.0;
    for &o in &oi[..nbins] {
        let ei = nobs * p * tail;
        chi2 += (o as f64 - ei).powi(2) / ei;
        tail *= 1.0 - p;
    }
    let ei = nobs * tail;
    chi2 += (oi[nbins] as f64 - ei).powi(2) / ei;
    (chi2, nbins as u64)
}

/// Draws until a value below `beta` shows up, returns the number of misses.
fn next_gap(state: &mut GeneratorState, beta: u64, max_len: u64) -> Option<u64> {
    let mut len = 0;
    while state.next() >= beta {
        len += 1;
        if len > max_len {
            return None;
        }
    }
    Some(len)
}

pub fn gap_test(state: &mut GeneratorState, opts: &GapOptions) -> TestResult {
    assert!(
        opts.shl >= 1 && opts.shl < state.nbits(),
        "gap test: shl = {} out of range",
        opts.shl
    );
    let p = 1.0 / (1u64 << opts.shl) as f64;
    let beta = 1u64 << (state.nbits() - opts.shl);
    let max_len = PROBE_FACTOR << opts.shl;
    let nbins = geometric_nbins(p, opts.ngaps);
    info!("Gap test");
    info!("  alpha = 0.0; beta = {}; shl = {};", p, opts.shl);
    info!("  ngaps = {}; nbins = {}", opts.ngaps, nbins);
    if next_gap(state, beta, max_len).is_none() {
        warn!(
            "  generator never hit [0, 2^{}) within {} draws",
            state.nbits() - opts.shl,
            max_len
        );
        return TestResult::degenerate("gap");
    }
    let mut oi = vec![0u64; nbins + 1];
    let mut nvalues: u64 = 0;
    for _ in 0..opts.ngaps {
        match next_gap(state, beta, max_len) {
            Some(len) => {
                nvalues += len + 1;
                oi[(len as usize).min(nbins)] += 1;
            }
            None => {
                warn!("  gap longer than {} draws", max_len);
                return TestResult::degenerate("gap");
            }
        }
    }
    let (x, df) = geometric_chi2(&oi, p, opts.ngaps);
    let result = TestResult::new("gap", x, chi2_pvalue(x, df), chi2_cdf(x, df));
    info!(
        "  Values processed: {} (2^{:.1})",
        nvalues,
        (nvalues as f64).log2()
    );
    info!("  x = {}; p = {}", result.statistic, result.p_value);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::native_state;
    use crate::rngs;

    #[test]
    fn nbins_formula() {
        // ln(10 / (1e7 / 512)) / ln(1 - 1/512)
        assert_eq!(geometric_nbins(1.0 / 512.0, 10_000_000), 3875);
        assert_eq!(geometric_nbins(0.5, 1), 1);
    }

    #[test]
    fn exact_geometric_counts_give_small_chi2() {
        let p = 0.5;
        let oi = [500u64, 250, 125, 125];
        let (x, df) = geometric_chi2(&oi, p, 1000);
        assert_eq!(df, 3);
        assert!(x.abs() < 1e-12);
    }

    #[test]
    fn good_generator_passes() {
        let mut state = native_state::<rngs::ReferenceRand>(3, 64);
        let r = gap_test(&mut state, &GapOptions { shl: 4, ngaps: 100_000 });
        assert!((r.p_value + r.complement - 1.0).abs() < 1e-9);
        assert!(r.extremeness() > 1e-7, "{r:?}");
    }

    #[test]
    fn generator_missing_the_interval_is_degenerate() {
        let mut state = native_state::<rngs::testgens::OnlyOne>(0, 64);
        let r = gap_test(&mut state, &GapOptions { shl: 4, ngaps: 1000 });
        assert!(r.statistic.is_nan());
        assert!(r.p_value <= 1e-14);
    }
}
