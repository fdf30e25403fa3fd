// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Hamming weight dependency tests on overlapping tuples, modelled on the
//! DC6-9x1Bytes-1 test of PractRand.
//!
//! Every unit of the stream (a byte, an output or a long word made of
//! several outputs) is reduced to its Hamming weight, the weight to one of
//! four codes of similar probability. Nine consecutive codes form an 18 bit
//! tuple; tuple frequencies are compared with the product of the code
//! probabilities by a g-test.
//!
//! The distribution test at the end of the module compares plain histograms
//! of Hamming weights of blocks of outputs with the binomial distribution.

use log::info;

use super::TestResult;
use crate::generator::GeneratorState;
use crate::histogram::AdaptiveHistogram;
use crate::stats::{binomial_pdf, chi2_to_stdnorm_approx, stdnorm_cdf, stdnorm_pvalue};
use crate::stream::{ByteStream, UseBits};

const CODE_NBITS: u32 = 2;
const TUPLE_SIZE: u32 = 9;
const TUPLE_MASK: usize = (1 << (CODE_NBITS * TUPLE_SIZE)) - 1;
const EI_MIN: f64 = 250.0;
const MAX_BINS: usize = 250_000;
/// Expected count below which weight histogram bins are merged.
const DISTR_EI_MIN: f64 = 25.0;

/// Units the Hamming weights are taken of.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HammingOtMode {
    /// Whole 32 or 64 bit outputs.
    Values,
    /// Every byte of the output stream.
    Bytes,
    /// Bytes made of the lowest 8 bits of every output.
    Low8,
    /// Bytes made of the lowest bit of every output.
    Low1,
}

impl HammingOtMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "values" => Some(HammingOtMode::Values),
            "bytes" => Some(HammingOtMode::Bytes),
            "low8" => Some(HammingOtMode::Low8),
            "low1" => Some(HammingOtMode::Low1),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HammingOtOptions {
    /// Sample size in bytes of generator output.
    pub nbytes: u64,
    pub mode: HammingOtMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HammingOtLongOptions {
    /// Number of generator outputs consumed.
    pub nvalues: u64,
    /// 128, 256, 512 or 1024 bits.
    pub wordsize: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HammingDistrOptions {
    /// Number of generator outputs consumed.
    pub nvalues: u64,
    /// Blocks of 1, 2, ..., 2^(nlevels - 1) outputs are analysed.
    pub nlevels: u32,
}

/// Mapping of Hamming weights to codes and the code probabilities under
/// a binomial weight distribution.
#[derive(Debug, Clone)]
struct CodeTable {
    hw_to_code: Vec<u8>,
    code_to_prob: [f64; 4],
}

impl CodeTable {
    fn from_codes(hw_to_code: Vec<u8>) -> Self {
        let nbits = hw_to_code.len() as u64 - 1;
        let mut code_to_prob = [0.0; 4];
        for (hw, &code) in hw_to_code.iter().enumerate() {
            code_to_prob[code as usize] += binomial_pdf(hw as u64, nbits, 0.5);
        }
        CodeTable {
            hw_to_code,
            code_to_prob,
        }
    }

    /// Codes 1, 2 and 3 start at the weights in `starts`.
    fn from_thresholds(nbits: u32, starts: [u32; 3]) -> Self {
        let codes = (0..=nbits)
            .map(|hw| starts.iter().filter(|&&s| hw >= s).count() as u8)
            .collect();
        Self::from_codes(codes)
    }

    /// Weight 8 shares code 0 with weight 0, taken over from PractRand.
    fn for_bytes() -> Self {
        Self::from_codes(vec![0, 0, 1, 1, 2, 2, 3, 3, 0])
    }

    fn for_word(nbits: u32) -> Self {
        let starts = match nbits {
            32 => [14, 16, 18],
            64 => [29, 32, 36],
            128 => [60, 65, 69],
            256 => [123, 128, 134],
            512 => [248, 256, 265],
            1024 => [501, 512, 524],
            _ => panic!("no Hamming weight code table for {nbits}-bit words"),
        };
        Self::from_thresholds(nbits, starts)
    }

    #[inline]
    fn code(&self, hw: u32) -> usize {
        self.hw_to_code[hw as usize] as usize
    }
}

/// Count `ntuples` overlapping tuples of codes of the weights in `weights`.
fn count_tuples(
    table: &CodeTable,
    ntuples: u64,
    mut weights: impl FnMut() -> u32,
) -> AdaptiveHistogram {
    let mut hist = AdaptiveHistogram::for_code_tuples(&table.code_to_prob, CODE_NBITS, TUPLE_SIZE);
    let mut tuple = 0usize;
    for _ in 0..TUPLE_SIZE {
        tuple = ((tuple << CODE_NBITS) | table.code(weights())) & TUPLE_MASK;
    }
    for _ in 0..ntuples {
        hist.increment(tuple);
        tuple = ((tuple << CODE_NBITS) | table.code(weights())) & TUPLE_MASK;
    }
    hist
}

/// g-test of the tuple table, converted to a standard normal value.
fn tuple_table_result(mut hist: AdaptiveHistogram) -> TestResult {
    let ntypes = hist.len();
    hist.reduce(EI_MIN, MAX_BINS);
    info!("  Number of tuple types: {}; after reduction: {}", ntypes, hist.len());
    if hist.len() < 2 {
        return TestResult::degenerate("hamming_ot");
    }
    let g = hist.g_statistic();
    let z = chi2_to_stdnorm_approx(g, hist.len() as u64 - 1);
    let result = TestResult::new("hamming_ot", z, stdnorm_pvalue(z), stdnorm_cdf(z));
    info!("  zemp = {}; p = {}", result.statistic, result.p_value);
    result
}

fn log_code_probabilities(table: &CodeTable) {
    info!("  Used probabilities for codes:");
    for (i, p) in table.code_to_prob.iter().enumerate() {
        info!("    p({}) = {:10.8}", i, p);
    }
}

/// Number of tuples, i.e. of Hamming weights, in a sample of `nbytes`.
pub fn hamming_ot_ntuples(nbytes: u64, nbits: u32, mode: HammingOtMode) -> u64 {
    match mode {
        HammingOtMode::Values | HammingOtMode::Low8 => nbytes * 8 / nbits as u64,
        HammingOtMode::Bytes => nbytes,
        HammingOtMode::Low1 => nbytes / nbits as u64,
    }
}

fn hamming_ot_histogram(state: &mut GeneratorState, opts: &HammingOtOptions) -> AdaptiveHistogram {
    let ntuples = hamming_ot_ntuples(opts.nbytes, state.nbits(), opts.mode);
    info!("Hamming weights based test (overlapping tuples)");
    info!(
        "  Sample size, bytes: {} (2^{:.2}); tuples: {} (2^{:.2})",
        opts.nbytes,
        (opts.nbytes as f64).log2(),
        ntuples,
        (ntuples as f64).log2()
    );
    match opts.mode {
        HammingOtMode::Values => {
            info!("  Mode: {}-bit outputs", state.nbits());
            let table = CodeTable::for_word(state.nbits());
            log_code_probabilities(&table);
            count_tuples(&table, ntuples, || state.next().count_ones())
        }
        mode => {
            let use_bits = match mode {
                HammingOtMode::Low8 => UseBits::Low8,
                HammingOtMode::Low1 => UseBits::Low1,
                _ => UseBits::All,
            };
            info!("  Mode: byte stream ({:?})", use_bits);
            let table = CodeTable::for_bytes();
            log_code_probabilities(&table);
            let mut stream = ByteStream::new(state, use_bits);
            count_tuples(&table, ntuples, || stream.next_byte().count_ones())
        }
    }
}

pub fn hamming_ot_test(state: &mut GeneratorState, opts: &HammingOtOptions) -> TestResult {
    let hist = hamming_ot_histogram(state, opts);
    tuple_table_result(hist)
}

/// Same test on long words made of `wordsize / nbits` consecutive outputs,
/// aimed at lagged Fibonacci generators with small lags.
pub fn hamming_ot_long_test(state: &mut GeneratorState, opts: &HammingOtLongOptions) -> TestResult {
    let values_per_word = opts.wordsize / state.nbits();
    let ntuples = opts.nvalues / values_per_word as u64;
    info!("Hamming weights based test (overlapping tuples), long version");
    info!(
        "  Sample size, values: {} (2^{:.2}); word size, bits: {}",
        opts.nvalues,
        (opts.nvalues as f64).log2(),
        opts.wordsize
    );
    let table = CodeTable::for_word(opts.wordsize);
    log_code_probabilities(&table);
    let hist = count_tuples(&table, ntuples, || {
        (0..values_per_word).map(|_| state.next().count_ones()).sum()
    });
    tuple_table_result(hist)
}

/// Weight histograms of one block size: weights of the blocks themselves
/// and of the XOR of neighbouring blocks.
struct WeightHistograms {
    block_len: usize,
    plain: AdaptiveHistogram,
    xored: AdaptiveHistogram,
}

impl WeightHistograms {
    fn new(block_len: usize, nbits: u32) -> Self {
        let block_nbits = block_len as u64 * nbits as u64;
        let binomial = move || (0..=block_nbits).map(move |k| binomial_pdf(k, block_nbits, 0.5));
        WeightHistograms {
            block_len,
            plain: AdaptiveHistogram::from_probabilities(binomial()),
            xored: AdaptiveHistogram::from_probabilities(binomial()),
        }
    }

    fn add(&mut self, values: &[u64], weights: &[u32]) {
        let b = self.block_len;
        for block in weights.chunks_exact(b) {
            self.plain.increment(block.iter().sum::<u32>() as usize);
        }
        for pair in values.chunks_exact(2 * b) {
            let (x, y) = pair.split_at(b);
            let w: u32 = x.iter().zip(y).map(|(a, c)| (a ^ c).count_ones()).sum();
            self.xored.increment(w as usize);
        }
    }
}

/// g-test of a weight histogram as a standard normal value, NaN if too
/// few bins are left after merging.
fn weight_histogram_z(hist: &mut AdaptiveHistogram) -> f64 {
    hist.merge_sparse_bins(DISTR_EI_MIN);
    if hist.len() < 2 {
        return f64::NAN;
    }
    chi2_to_stdnorm_approx(hist.g_statistic(), hist.len() as u64 - 1)
}

/// Histograms of Hamming weights of blocks of 1 to 2^(nlevels-1) outputs and
/// of XORed neighbouring blocks against the binomial distribution. The most
/// extreme of all levels is reported. The XOR variant catches 32-bit LCGs.
pub fn hamming_distr_test(state: &mut GeneratorState, opts: &HammingDistrOptions) -> TestResult {
    assert!(
        (1..=16).contains(&opts.nlevels),
        "hamming_distr: nlevels = {} out of range",
        opts.nlevels
    );
    let nbits = state.nbits();
    let chunk_len = 1usize << opts.nlevels;
    info!("Hamming weights distribution test (histogram)");
    info!(
        "  Sample size, values: {} (2^{:.2}); levels: {}",
        opts.nvalues,
        (opts.nvalues as f64).log2(),
        opts.nlevels
    );
    let mut levels: Vec<WeightHistograms> = (0..opts.nlevels)
        .map(|i| WeightHistograms::new(1 << i, nbits))
        .collect();
    let mut values = vec![0u64; chunk_len];
    let mut weights = vec![0u32; chunk_len];
    let nchunks = opts.nvalues.div_ceil(chunk_len as u64);
    for _ in 0..nchunks {
        for (x, w) in values.iter_mut().zip(weights.iter_mut()) {
            *x = state.next();
            *w = x.count_ones();
        }
        for level in levels.iter_mut() {
            level.add(&values, &weights);
        }
    }
    info!("  {:>8} | {:>8} {:>10} | {:>8} {:>10}", "bits", "z", "p", "z_xor", "p_xor");
    let mut worst = f64::NAN;
    for level in levels.iter_mut() {
        let z = weight_histogram_z(&mut level.plain);
        let z_xor = weight_histogram_z(&mut level.xored);
        info!(
            "  {:>8} | {:>8.3} {:>10.3e} | {:>8.3} {:>10.3e}",
            level.block_len as u64 * nbits as u64,
            z,
            stdnorm_pvalue(z),
            z_xor,
            stdnorm_pvalue(z_xor)
        );
        for candidate in [z, z_xor] {
            if !candidate.is_nan() && (worst.is_nan() || candidate.abs() > worst.abs()) {
                worst = candidate;
            }
        }
    }
    if worst.is_nan() {
        return TestResult::degenerate("hamming_distr");
    }
    let result = TestResult::new("hamming_distr", worst, stdnorm_pvalue(worst), stdnorm_cdf(worst));
    info!("  Final: z = {:.3}; p = {}", result.statistic, result.p_value);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::native_state;
    use crate::rngs;

    #[test]
    fn code_probabilities_sum_to_one() {
        let bytes = CodeTable::for_bytes();
        assert!((bytes.code_to_prob.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!((bytes.code_to_prob[0] - 10.0 / 256.0).abs() < 1e-12);
        for nbits in [32, 64, 128, 256, 512, 1024] {
            let table = CodeTable::for_word(nbits);
            let total: f64 = table.code_to_prob.iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
            // Word codes are roughly balanced.
            assert!(table.code_to_prob.iter().all(|&p| p > 0.15 && p < 0.4));
        }
    }

    #[test]
    fn word_thresholds() {
        let table = CodeTable::for_word(32);
        assert_eq!(table.code(13), 0);
        assert_eq!(table.code(14), 1);
        assert_eq!(table.code(17), 2);
        assert_eq!(table.code(32), 3);
        let table = CodeTable::for_word(64);
        assert_eq!(table.code(35), 2);
        assert_eq!(table.code(48), 3);
    }

    #[test]
    fn tuple_counts() {
        assert_eq!(hamming_ot_ntuples(1 << 20, 64, HammingOtMode::Values), 1 << 17);
        assert_eq!(hamming_ot_ntuples(1 << 20, 32, HammingOtMode::Bytes), 1 << 20);
        assert_eq!(hamming_ot_ntuples(1 << 20, 32, HammingOtMode::Low1), 1 << 15);
    }

    #[test]
    fn reduced_table_keeps_mass_and_counts() {
        let mut state = native_state::<rngs::ReferenceRand>(4, 64);
        let opts = HammingOtOptions {
            nbytes: 1 << 21,
            mode: HammingOtMode::Bytes,
        };
        let mut hist = hamming_ot_histogram(&mut state, &opts);
        hist.reduce(EI_MIN, MAX_BINS);
        assert_eq!(hist.total_count(), 1 << 21);
        assert!((hist.total_probability() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn good_generator_passes_byte_mode() {
        let mut state = native_state::<rngs::ReferenceRand>(8, 64);
        let opts = HammingOtOptions {
            nbytes: 1 << 22,
            mode: HammingOtMode::Bytes,
        };
        let r = hamming_ot_test(&mut state, &opts);
        assert!((r.p_value + r.complement - 1.0).abs() < 1e-9);
        assert!(r.extremeness() > 1e-7, "{r:?}");
    }

    #[test]
    fn constant_generator_fails() {
        let mut state = native_state::<rngs::testgens::OnlyZero>(0, 64);
        let opts = HammingOtOptions {
            nbytes: 1 << 20,
            mode: HammingOtMode::Values,
        };
        let r = hamming_ot_test(&mut state, &opts);
        assert!(r.p_value < 1e-10, "{r:?}");
    }

    #[test]
    fn weight_histograms_count_every_block() {
        let mut h = WeightHistograms::new(2, 64);
        let values = [0u64, u64::MAX, 1, 3, 0, 0, 7, 7];
        let weights: Vec<u32> = values.iter().map(|x| x.count_ones()).collect();
        h.add(&values, &weights);
        assert_eq!(h.plain.len(), 129);
        assert_eq!(h.plain.total_count(), 4);
        assert_eq!(h.plain.bins()[64].count, 1);
        assert_eq!(h.plain.bins()[3].count, 1);
        assert_eq!(h.plain.bins()[0].count, 1);
        assert_eq!(h.plain.bins()[6].count, 1);
        // (0 ^ 1) + (MAX ^ 3) and (0 ^ 7) + (0 ^ 7)
        assert_eq!(h.xored.total_count(), 2);
        assert_eq!(h.xored.bins()[63].count, 1);
        assert_eq!(h.xored.bins()[6].count, 1);
        assert!((h.xored.total_probability() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn weight_distribution_of_good_generator() {
        let mut state = native_state::<rngs::ReferenceRand>(12, 64);
        let opts = HammingDistrOptions {
            nvalues: 1 << 20,
            nlevels: 4,
        };
        let r = hamming_distr_test(&mut state, &opts);
        assert_eq!(r.name, "hamming_distr");
        assert!((r.p_value + r.complement - 1.0).abs() < 1e-9);
        assert!(r.extremeness() > 1e-7, "{r:?}");
    }

    #[test]
    fn constant_generator_fails_weight_distribution() {
        let mut state = native_state::<rngs::testgens::OnlyOne>(0, 64);
        let opts = HammingDistrOptions {
            nvalues: 1 << 16,
            nlevels: 2,
        };
        let r = hamming_distr_test(&mut state, &opts);
        assert!(r.p_value < 1e-10, "{r:?}");
    }

    #[test]
    fn long_words_of_good_generator() {
        let mut state = native_state::<rngs::ReferenceRand>(6, 64);
        let opts = HammingOtLongOptions {
            nvalues: 1 << 21,
            wordsize: 128,
        };
        let r = hamming_ot_long_test(&mut state, &opts);
        assert!(r.extremeness() > 1e-7, "{r:?}");
    }
}
