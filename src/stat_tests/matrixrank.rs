// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Binary matrix rank test.
//! Random n x n matrices over GF(2) have full rank with probability close
//! to 0.2888, rank n - 1 with probability 0.5776. Linear generators
//! produce far too many rank deficient matrices once n exceeds their state size.

use log::info;

use super::TestResult;
use crate::generator::GeneratorState;
use crate::utils::xor_in_place;

/// Lanes used by the chunked elimination, one 256 bit vector.
pub const DEFAULT_LANES: usize = 4;
/// Asymptotic probabilities of rank <= n - 2, n - 1 and n.
const RANK_PROBABILITIES: [f64; 3] = [0.1284, 0.5776, 0.2888];

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixRankOptions {
    /// Matrix size, a multiple of 64.
    pub n: usize,
    /// Bits taken from every output: 8, 32 or 64.
    pub max_nbits: u32,
    pub nmatrices: u64,
}

/// XOR `src` into `dst` in blocks of `LANES` words.
/// `LANES == 1` is the plain scalar loop.
#[inline]
fn xor_row<const LANES: usize>(dst: &mut [u64], src: &[u64]) {
    if LANES == 1 {
        xor_in_place(dst, src);
        return;
    }
    let mut dst_chunks = dst.chunks_exact_mut(LANES);
    let mut src_chunks = src.chunks_exact(LANES);
    for (d, s) in (&mut dst_chunks).zip(&mut src_chunks) {
        for k in 0..LANES {
            d[k] ^= s[k];
        }
    }
    xor_in_place(dst_chunks.into_remainder(), src_chunks.remainder());
}

/// Rank over GF(2) of the matrix whose rows are `rows`, each holding `n`
/// bits (bit `i` of the row is bit `i % 64` of word `i / 64`).
/// The rows are modified.
pub fn matrix_rank<const LANES: usize>(rows: &mut [Vec<u64>], n: usize) -> usize {
    let nrows = rows.len();
    let mut rank = 0;
    for col in 0..n {
        if rank == nrows {
            break;
        }
        let word = col / 64;
        let mask = 1u64 << (col % 64);
        let Some(pivot) = (rank..nrows).find(|&j| rows[j][word] & mask != 0) else {
            continue;
        };
        rows.swap(rank, pivot);
        let (upper, lower) = rows.split_at_mut(rank + 1);
        let pivot_row = &upper[rank][word..];
        for row in lower.iter_mut() {
            if row[word] & mask != 0 {
                xor_row::<LANES>(&mut row[word..], pivot_row);
            }
        }
        rank += 1;
    }
    rank
}

/// Refill the matrix from the generator.
fn fill_matrix(state: &mut GeneratorState, rows: &mut [Vec<u64>], max_nbits: u32) {
    let nbits = max_nbits.min(state.nbits());
    for word in rows.iter_mut().flat_map(|row| row.iter_mut()) {
        *word = match nbits {
            8 => (0..8).fold(0u64, |acc, i| acc | (state.next() & 0xff) << (8 * i)),
            32 => {
                let lo = state.next() & 0xffff_ffff;
                let hi = state.next() & 0xffff_ffff;
                lo | hi << 32
            }
            _ => state.next(),
        };
    }
}

/// Histogram of ranks `{<= n - 2, n - 1, n}` over `opts.nmatrices` matrices.
pub(crate) fn rank_histogram<const LANES: usize>(
    state: &mut GeneratorState,
    opts: &MatrixRankOptions,
) -> [u64; 3] {
    let words_per_row = opts.n / 64;
    let mut rows = vec![vec![0u64; words_per_row]; opts.n];
    let mut oi = [0u64; 3];
    for _ in 0..opts.nmatrices {
        fill_matrix(state, &mut rows, opts.max_nbits);
        let rank = matrix_rank::<LANES>(&mut rows, opts.n);
        oi[(rank + 2).saturating_sub(opts.n)] += 1;
    }
    oi
}

pub fn matrixrank_test(state: &mut GeneratorState, opts: &MatrixRankOptions) -> TestResult {
    assert!(
        opts.n >= 64 && opts.n % 64 == 0,
        "matrix rank: n = {} is not a multiple of 64",
        opts.n
    );
    assert!(
        matches!(opts.max_nbits, 8 | 32 | 64),
        "matrix rank: unsupported max_nbits = {}",
        opts.max_nbits
    );
    info!("Matrix rank test");
    info!(
        "  n = {}; max_nbits = {}; number of matrices: {}",
        opts.n, opts.max_nbits, opts.nmatrices
    );
    let oi = rank_histogram::<DEFAULT_LANES>(state, opts);
    info!("  {:>5} {:>10} {:>10}", "rank", "Oi", "Ei");
    let mut x = 0.0;
    for (i, (&o, &p)) in oi.iter().zip(RANK_PROBABILITIES.iter()).enumerate() {
        let ei = p * opts.nmatrices as f64;
        x += (o as f64 - ei).powi(2) / ei;
        info!("  {:>5} {:>10} {:>10.4}", opts.n - 2 + i, o, ei);
    }
    // Chi-square with 2 degrees of freedom has an exponential tail.
    let result = TestResult::new("mrank", x, (-0.5 * x).exp(), -(-0.5 * x).exp_m1());
    info!(
        "  x = {}; p = {}; 1-p = {}",
        result.statistic, result.p_value, result.complement
    );
    result
}
