// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Additional tests used by the full battery: sum collector, overlapping
//! ternary tuples and gaps between repeated 16 bit chunks.

use log::{info, warn};

use super::gap::{geometric_chi2, geometric_nbins};
use super::TestResult;
use crate::generator::GeneratorState;
use crate::stats::{chi2_cdf, chi2_pvalue};

/// Sums longer than this many terms land in the overflow bin, which also
/// keeps generators that never reach the threshold from looping forever.
const SUMCOLLECTOR_MAX_TERMS: usize = 64;
const SUMCOLLECTOR_EI_MIN: f64 = 10.0;
/// Threshold of the scaled sum.
const SUMCOLLECTOR_LIMIT: u32 = 3;

const MOD3_TUPLE_SIZE: usize = 9;
const MOD3_NCELLS: usize = 19683;

#[derive(Debug, Clone, PartialEq)]
pub struct SumCollectorOptions {
    pub nvalues: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mod3Options {
    pub nvalues: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gap16Options {
    pub ngaps: u64,
}

/// P(U_1 + ... + U_k <= 3) for independent uniform U_i (Irwin-Hall CDF).
fn irwin_hall_cdf3(k: usize) -> f64 {
    if k <= 3 {
        return 1.0;
    }
    let kf = k as f64;
    let ln_fact: f64 = (2..=k).map(|i| (i as f64).ln()).sum();
    let terms = 3f64.powi(k as i32) - kf * 2f64.powi(k as i32) + kf * (kf - 1.0) / 2.0;
    terms * (-ln_fact).exp()
}

/// Probabilities that exactly `k` terms are needed to exceed 3, for
/// `k = 4..=kmax`, followed by the tail probability of `k > kmax`.
pub fn sumcollector_probabilities(kmax: usize) -> Vec<f64> {
    let mut probs: Vec<f64> = (4..=kmax)
        .map(|k| irwin_hall_cdf3(k - 1) - irwin_hall_cdf3(k))
        .collect();
    probs.push(irwin_hall_cdf3(kmax));
    probs
}

/// Sum collector test: uniform outputs are added until the sum exceeds 3;
/// the number of terms needed follows from the Irwin-Hall distribution.
pub fn sumcollector_test(state: &mut GeneratorState, opts: &SumCollectorOptions) -> TestResult {
    let limit: u128 = (SUMCOLLECTOR_LIMIT as u128) << state.nbits();
    let mut counts = [0u64; SUMCOLLECTOR_MAX_TERMS + 2];
    let mut sum: u128 = 0;
    let mut nterms = 0usize;
    for _ in 0..opts.nvalues {
        sum += state.next() as u128;
        nterms += 1;
        if sum > limit || nterms > SUMCOLLECTOR_MAX_TERMS {
            counts[nterms.min(SUMCOLLECTOR_MAX_TERMS + 1)] += 1;
            sum = 0;
            nterms = 0;
        }
    }
    let nobs: u64 = counts.iter().sum();
    info!("Sum collector test");
    info!("  nvalues = {}; sums collected = {}", opts.nvalues, nobs);
    if nobs == 0 {
        warn!("  no complete sums");
        return TestResult::degenerate("sumcollector");
    }
    // Last regular bin is the largest k whose tail still expects enough counts.
    let mut kmax = 4;
    while kmax < SUMCOLLECTOR_MAX_TERMS
        && irwin_hall_cdf3(kmax + 1) * nobs as f64 >= SUMCOLLECTOR_EI_MIN
    {
        kmax += 1;
    }
    let probs = sumcollector_probabilities(kmax);
    let mut oi: Vec<u64> = counts[4..=kmax].to_vec();
    oi.push(counts[kmax + 1..].iter().sum());
    let mut x = 0.0;
    info!("  {:>5} {:>12} {:>14}", "k", "Oi", "Ei");
    for (i, (&o, &p)) in oi.iter().zip(probs.iter()).enumerate() {
        let ei = p * nobs as f64;
        x += (o as f64 - ei).powi(2) / ei;
        info!("  {:>5} {:>12} {:>14.2}", i + 4, o, ei);
    }
    let df = oi.len() as u64 - 1;
    let result = TestResult::new("sumcollector", x, chi2_pvalue(x, df), chi2_cdf(x, df));
    info!("  x = {}; df = {}; p = {}", result.statistic, df, result.p_value);
    result
}

/// Pearson statistic of the cell counts `oi` against uniform expectations.
fn uniform_psi2(oi: &[u64], nobs: u64) -> f64 {
    let ei = nobs as f64 / oi.len() as f64;
    oi.iter().map(|&o| (o as f64 - ei).powi(2) / ei).sum()
}

/// Overlapping 9-tuples of `x mod 3`, counted cyclically. Good's statistic
/// Psi2_9 - Psi2_8 is chi-square distributed with 3^9 - 3^8 degrees of
/// freedom even though the tuples overlap.
pub fn mod3_test(state: &mut GeneratorState, opts: &Mod3Options) -> TestResult {
    assert!(
        opts.nvalues >= MOD3_TUPLE_SIZE as u64,
        "mod3: at least {MOD3_TUPLE_SIZE} values are needed"
    );
    info!("mod3 test");
    info!("  nvalues = {}", opts.nvalues);
    let mut oi9 = vec![0u64; MOD3_NCELLS];
    let mut head = [0usize; MOD3_TUPLE_SIZE - 1];
    let mut idx = 0usize;
    for h in head.iter_mut() {
        *h = (state.next() % 3) as usize;
        idx = idx * 3 + *h;
    }
    for _ in 0..opts.nvalues - (MOD3_TUPLE_SIZE as u64 - 1) {
        idx = (idx * 3 + (state.next() % 3) as usize) % MOD3_NCELLS;
        oi9[idx] += 1;
    }
    // Wrap around to make the sequence cyclic.
    for &h in head.iter() {
        idx = (idx * 3 + h) % MOD3_NCELLS;
        oi9[idx] += 1;
    }
    // Dropping the newest digit gives the cyclic 8-tuple counts.
    let mut oi8 = vec![0u64; MOD3_NCELLS / 3];
    for (i, &o) in oi9.iter().enumerate() {
        oi8[i / 3] += o;
    }
    let x = uniform_psi2(&oi9, opts.nvalues) - uniform_psi2(&oi8, opts.nvalues);
    let df = (MOD3_NCELLS - MOD3_NCELLS / 3) as u64;
    let result = TestResult::new("mod3", x, chi2_pvalue(x, df), chi2_cdf(x, df));
    info!("  x = {}; df = {}; p = {}", result.statistic, df, result.p_value);
    result
}

/// Gaps between repeated 16 bit chunks of the output, lowest chunk first.
/// Every one of the first `ngaps` chunk positions starts a gap that ends at
/// the next occurrence of the same chunk; the lengths are geometric with
/// p = 2^-16. Gaps are counted by their start position, so there are
/// exactly `ngaps` observations.
pub fn gap16_test(state: &mut GeneratorState, opts: &Gap16Options) -> TestResult {
    const NCHUNKS: usize = 1 << 16;
    let p = 1.0 / NCHUNKS as f64;
    let nbins = geometric_nbins(p, opts.ngaps);
    let chunks_per_value = state.nbits() / 16;
    info!("Gap test for 16-bit chunks");
    info!("  ngaps = {}; nbins = {}", opts.ngaps, nbins);
    // Position of the last occurrence, positions start at 1.
    let mut last_seen = vec![0u64; NCHUNKS];
    let mut oi = vec![0u64; nbins + 1];
    // Gaps still open at this position are longer than the last regular bin.
    let end = opts.ngaps + nbins as u64 + 1;
    let mut pos: u64 = 0;
    while pos < end {
        let mut u = state.next();
        for _ in 0..chunks_per_value {
            let chunk = (u & 0xffff) as usize;
            u >>= 16;
            pos += 1;
            let start = last_seen[chunk];
            if start != 0 && start <= opts.ngaps {
                oi[((pos - start - 1) as usize).min(nbins)] += 1;
            }
            last_seen[chunk] = pos;
        }
    }
    oi[nbins] += last_seen
        .iter()
        .filter(|&&start| start != 0 && start <= opts.ngaps)
        .count() as u64;
    let (x, df) = geometric_chi2(&oi, p, opts.ngaps);
    let result = TestResult::new("gap16", x, chi2_pvalue(x, df), chi2_cdf(x, df));
    info!("  chunks processed: {}", pos);
    info!("  x = {}; df = {}; p = {}", result.statistic, df, result.p_value);
    result
}
