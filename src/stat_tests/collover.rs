// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! CollisionOver, an overlapping variant of Marsaglia's monkey tests
//! proposed by the TestU01 authors.

use log::info;

use super::bspace::{draw_bits, push_bits};
use super::TestResult;
use crate::generator::GeneratorState;
use crate::stats::{poisson_cdf, poisson_pvalue};

pub const COLLOVER_DEFAULT_N: u64 = 50_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct CollOverNdOptions {
    pub nbits_per_dim: u32,
    pub ndims: u32,
    pub nsamples: u64,
    /// Values drawn per sample; `n - ndims + 1` overlapping tuples are formed.
    pub n: u64,
    pub get_lower: bool,
}

/// Fill `tuples` with overlapping tuples, one new tuple per new output.
fn make_tuples(state: &mut GeneratorState, opts: &CollOverNdOptions, tuples: &mut [u64]) {
    let mask = (1u64 << (opts.ndims * opts.nbits_per_dim)) - 1;
    let mut cur = 0u64;
    for _ in 0..opts.ndims - 1 {
        let bits = draw_bits(state, opts.nbits_per_dim, opts.get_lower);
        cur = push_bits(cur, bits, opts.nbits_per_dim);
    }
    for t in tuples.iter_mut() {
        let bits = draw_bits(state, opts.nbits_per_dim, opts.get_lower);
        cur = push_bits(cur, bits, opts.nbits_per_dim) & mask;
        *t = cur;
    }
}

/// Count cells hit exactly once, twice, and three or more times.
/// Returns `[unused, once, twice, more]` with `unused` left at zero.
fn count_occupancy(sorted: &[u64]) -> [u64; 4] {
    let mut oi = [0u64; 4];
    let mut run = 1usize;
    for i in 1..=sorted.len() {
        if i < sorted.len() && sorted[i] == sorted[i - 1] {
            run += 1;
        } else {
            oi[run.min(3)] += 1;
            run = 1;
        }
    }
    oi
}

pub fn collisionover_test(state: &mut GeneratorState, opts: &CollOverNdOptions) -> TestResult {
    let nbits_total = opts.ndims * opts.nbits_per_dim;
    assert!(
        nbits_total < 64 && opts.ndims >= 1 && opts.n >= opts.ndims as u64,
        "collisionover: invalid layout {} x {} bits, n = {}",
        opts.ndims,
        opts.nbits_per_dim,
        opts.n
    );
    let ntuples = (opts.n - opts.ndims as u64 + 1) as usize;
    let nstates = 2f64.powi(nbits_total as i32);
    let lambda = ntuples as f64 / nstates;
    let mu = nstates * (lambda - 1.0 + (-lambda).exp());
    info!("CollisionOver test");
    info!(
        "  ndims = {}; nbits_per_dim = {}; get_lower = {}",
        opts.ndims, opts.nbits_per_dim, opts.get_lower
    );
    info!(
        "  nsamples = {}; len = {}, mu = {}",
        opts.nsamples, ntuples, mu
    );
    let mut tuples = vec![0u64; ntuples];
    let mut oi = [0u64; 4];
    let mut distinct_total: u64 = 0;
    for _ in 0..opts.nsamples {
        make_tuples(state, opts, &mut tuples);
        tuples.sort_unstable();
        let sample = count_occupancy(&tuples);
        for (total, &count) in oi.iter_mut().zip(sample.iter()).skip(1) {
            *total += count;
            distinct_total += count;
        }
    }
    oi[0] = (nstates * opts.nsamples as f64) as u64 - distinct_total;
    let x = oi[2] as f64;
    let mean = mu * opts.nsamples as f64;
    info!("  {:>5} {:>16} {:>16}", "Freq", "Oi", "Ei");
    let mut ei = (-lambda).exp() * nstates * opts.nsamples as f64;
    for (i, o) in oi.iter().enumerate() {
        info!("  {:>5} {:>16} {:>16.1}", i, o, ei);
        ei *= lambda / (i as f64 + 1.0);
    }
    let result = TestResult::new("collover", x, poisson_pvalue(x, mean), poisson_cdf(x, mean));
    info!(
        "  lambda = {}, mu = {} * {}",
        lambda, mu, opts.nsamples
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
    fn occupancy_runs() {
        let sorted = [1u64, 1, 2, 3, 3, 3, 3, 4, 5, 5];
        assert_eq!(count_occupancy(&sorted), [0, 2, 2, 1]);
    }

    #[test]
    fn good_generator_passes_and_complements_sum_to_one() {
        let mut state = native_state::<rngs::ReferenceRand>(11, 64);
        // Sparse occupancy (lambda = 2^-10) keeps the Poisson mean accurate.
        let opts = CollOverNdOptions {
            nbits_per_dim: 10,
            ndims: 3,
            nsamples: 2,
            n: 1 << 20,
            get_lower: true,
        };
        let r = collisionover_test(&mut state, &opts);
        assert!((r.p_value + r.complement - 1.0).abs() < 1e-9);
        assert!(r.extremeness() > 1e-7, "{r:?}");
    }

    #[test]
    fn constant_generator_fails() {
        let mut state = native_state::<rngs::testgens::OnlyZero>(0, 64);
        let opts = CollOverNdOptions {
            nbits_per_dim: 10,
            ndims: 3,
            nsamples: 1,
            n: 1 << 20,
            get_lower: false,
        };
        let r = collisionover_test(&mut state, &opts);
        // Every tuple lands in one cell, no cell is hit exactly twice.
        assert_eq!(r.statistic, 0.0);
        assert!(r.extremeness() < 1e-10);
    }
}
