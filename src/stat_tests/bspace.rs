// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Marsaglia's birthday spacings test in n dimensions and its decimated
//! 8x4 bit variant for truncated linear generators.

use log::info;

use super::TestResult;
use crate::generator::GeneratorState;
use crate::stats::{poisson_cdf, poisson_pvalue};
use crate::utils::reverse_low_bits;

#[derive(Debug, Clone, PartialEq)]
pub struct BSpaceNdOptions {
    pub nbits_per_dim: u32,
    pub ndims: u32,
    pub nsamples: u64,
    /// Take the lowest bits of every output instead of the highest.
    pub get_lower: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BSpaceDecimatedOptions {
    /// Only every `step`-th output is used.
    pub step: u64,
    pub nsamples: u64,
}

/// Take `nbits` bits from the generator. Widths above the generator's
/// output width are served by concatenating two outputs.
pub(crate) fn draw_bits(state: &mut GeneratorState, nbits: u32, get_lower: bool) -> u64 {
    let gen_bits = state.nbits();
    let (raw, raw_bits) = if nbits <= gen_bits {
        (state.next(), gen_bits)
    } else {
        let hi = state.next();
        let lo = state.next();
        ((hi << gen_bits) | lo, 2 * gen_bits)
    };
    if get_lower {
        if nbits == 64 {
            raw
        } else {
            raw & ((1u64 << nbits) - 1)
        }
    } else {
        raw >> (raw_bits - nbits)
    }
}

/// Append `bits` (of width `nbits`) to the right of `tuple`.
#[inline]
pub(crate) fn push_bits(tuple: u64, bits: u64, nbits: u32) -> u64 {
    tuple.checked_shl(nbits).unwrap_or(0) | bits
}

/// Number of points per sample, chosen so that 4 duplicates are expected.
pub fn bspace_len(nbits_total: u32) -> usize {
    2f64.powf((nbits_total as f64 + 4.0) / 3.0) as usize
}

/// Expected number of duplicate spacings for `len` points in `2^nbits_total` cells.
pub fn bspace_lambda(len: usize, nbits_total: u32) -> f64 {
    (len as f64).powi(3) / (4.0 * 2f64.powi(nbits_total as i32))
}

/// Sort points, take spacings, sort spacings and count equal neighbours.
/// Destroys the contents of `points`.
pub fn count_duplicate_spacings(points: &mut [u64]) -> u64 {
    if points.len() < 3 {
        return 0;
    }
    points.sort_unstable();
    let len = points.len();
    for i in 0..len - 1 {
        points[i] = points[i + 1] - points[i];
    }
    let spacings = &mut points[..len - 1];
    spacings.sort_unstable();
    spacings.windows(2).filter(|w| w[0] == w[1]).count() as u64
}

pub fn bspace_nd_test(state: &mut GeneratorState, opts: &BSpaceNdOptions) -> TestResult {
    let mut opts = opts.clone();
    if opts.ndims == 1 && opts.nbits_per_dim == 64 && state.nbits() == 32 {
        info!("1-dimensional 64-bit test on a 32-bit generator: using 2 dimensions of 32 bits");
        opts.ndims = 2;
        opts.nbits_per_dim = 32;
    }
    let nbits_total = opts.ndims * opts.nbits_per_dim;
    assert!(
        nbits_total <= 64 && opts.nbits_per_dim >= 1,
        "birthday spacings: {} x {} bits do not fit into 64 bits",
        opts.ndims,
        opts.nbits_per_dim
    );
    let len = bspace_len(nbits_total);
    let lambda = bspace_lambda(len, nbits_total);
    info!("Birthday spacings test");
    info!(
        "  ndims = {}; nbits_per_dim = {}; get_lower = {}",
        opts.ndims, opts.nbits_per_dim, opts.get_lower
    );
    info!(
        "  nsamples = {}; len = {}, lambda = {}",
        opts.nsamples, len, lambda
    );
    let mut points = vec![0u64; len];
    let mut ndups_total: u64 = 0;
    for _ in 0..opts.nsamples {
        for point in points.iter_mut() {
            let mut tuple = 0u64;
            for _ in 0..opts.ndims {
                let bits = draw_bits(state, opts.nbits_per_dim, opts.get_lower);
                tuple = push_bits(tuple, bits, opts.nbits_per_dim);
            }
            *point = tuple;
        }
        ndups_total += count_duplicate_spacings(&mut points);
    }
    let x = ndups_total as f64;
    let mean = lambda * opts.nsamples as f64;
    let result = TestResult::new("bspace_nd", x, poisson_pvalue(x, mean), poisson_cdf(x, mean));
    info!("  x = {}; p = {}", result.statistic, result.p_value);
    result
}

/// Birthday spacings in 8 dimensions with 4 bits each, built from every
/// `step`-th output. Three tuples are formed in parallel from the low nibble,
/// the bit reversed high nibble and the high nibble; the most extreme of the
/// three results is reported.
pub fn bspace4_8d_decimated_test(
    state: &mut GeneratorState,
    opts: &BSpaceDecimatedOptions,
) -> TestResult {
    const NDIMS: u32 = 8;
    const NBITS_PER_DIM: u32 = 4;
    let nbits_total = NDIMS * NBITS_PER_DIM;
    let len = bspace_len(nbits_total);
    let lambda = bspace_lambda(len, nbits_total);
    let shr = state.nbits() - NBITS_PER_DIM;
    info!("Birthday spacings test with decimation");
    info!(
        "  ndims = {NDIMS}; nbits_per_dim = {NBITS_PER_DIM}; step = {}",
        opts.step
    );
    info!(
        "  nsamples = {}; len = {}, lambda = {}",
        opts.nsamples, len, lambda
    );
    let mut low = vec![0u64; len];
    let mut high_rev = vec![0u64; len];
    let mut high = vec![0u64; len];
    let mut ndups = [0u64; 3];
    for _ in 0..opts.nsamples {
        for i in 0..len {
            let (mut t_low, mut t_rev, mut t_high) = (0u64, 0u64, 0u64);
            for _ in 0..NDIMS {
                if opts.step > 1 {
                    let _ = state.sum(opts.step as usize - 1);
                }
                let x = state.next();
                let hi = x >> shr;
                t_low = push_bits(t_low, x & 0xf, NBITS_PER_DIM);
                t_rev = push_bits(t_rev, reverse_low_bits(hi, NBITS_PER_DIM), NBITS_PER_DIM);
                t_high = push_bits(t_high, hi, NBITS_PER_DIM);
            }
            low[i] = t_low;
            high_rev[i] = t_rev;
            high[i] = t_high;
        }
        ndups[0] += count_duplicate_spacings(&mut low);
        ndups[1] += count_duplicate_spacings(&mut high_rev);
        ndups[2] += count_duplicate_spacings(&mut high);
    }
    let mean = lambda * opts.nsamples as f64;
    let results: Vec<TestResult> = ["low", "high_reversed", "high"]
        .iter()
        .zip(ndups.iter())
        .map(|(label, &n)| {
            let x = n as f64;
            let r = TestResult::new(
                "bspace4_8d_dec",
                x,
                poisson_pvalue(x, mean),
                poisson_cdf(x, mean),
            );
            info!("  {label}: x = {}; p = {}", r.statistic, r.p_value);
            r
        })
        .collect();
    results
        .into_iter()
        .min_by(|a, b| a.extremeness().total_cmp(&b.extremeness()))
        .unwrap_or_else(|| TestResult::degenerate("bspace4_8d_dec"))
}
