// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Frequency tests: bit balance and n-bit word frequencies.

use log::info;

use super::TestResult;
use crate::generator::GeneratorState;
use crate::stats::{chi2_cdf, ks_pvalue, ks_uniform_statistic};
use crate::utils::INV_ROOT2;
use statrs::function::erf::{erf, erfc};

#[derive(Debug, Clone, PartialEq)]
pub struct MonobitOptions {
    pub nvalues: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NBitWordsOptions {
    pub bits_per_word: u32,
    /// Expected count of every word value in one block.
    pub average_freq: u64,
    pub nblocks: u64,
}

impl NBitWordsOptions {
    pub fn byte_freq() -> Self {
        NBitWordsOptions {
            bits_per_word: 8,
            average_freq: 256,
            nblocks: 4096,
        }
    }

    pub fn word16_freq() -> Self {
        NBitWordsOptions {
            bits_per_word: 16,
            average_freq: 16,
            nblocks: 4096,
        }
    }
}

/// Monobit frequency test: the sum of all bits mapped to +1/-1 is
/// approximately normal with variance equal to the number of bits.
pub fn monobit_freq_test(state: &mut GeneratorState, opts: &MonobitOptions) -> TestResult {
    let nbits = state.nbits() as i64;
    let mut bitsum: i64 = 0;
    for _ in 0..opts.nvalues {
        bitsum += 2 * state.next().count_ones() as i64 - nbits;
    }
    let total_bits = opts.nvalues as f64 * nbits as f64;
    let x = (bitsum as f64).abs() / total_bits.sqrt();
    let result = TestResult::new("monobit_freq", x, erfc(x * INV_ROOT2), erf(x * INV_ROOT2));
    info!("Monobit frequency test");
    info!("  Number of bits: {}", total_bits);
    info!(
        "  sum = {}; x = {}; p = {}",
        bitsum, result.statistic, result.p_value
    );
    result
}

/// Chi-square statistic of `bits_per_word` wide words in every block,
/// blocks are compared with the chi-square distribution by a
/// Kolmogorov-Smirnov test.
pub fn nbit_words_freq_test(state: &mut GeneratorState, opts: &NBitWordsOptions) -> TestResult {
    assert!(
        opts.bits_per_word >= 1 && opts.bits_per_word <= 16 && opts.nblocks > 0,
        "n-bit words frequency: invalid options {opts:?}"
    );
    let nbins = 1usize << opts.bits_per_word;
    let mask = (nbins - 1) as u64;
    let block_len = nbins as u64 * opts.average_freq;
    let words_per_value = state.nbits() / opts.bits_per_word;
    let nwords = words_per_value as u64 * block_len;
    let ei = nwords as f64 / nbins as f64;
    let name = if opts.bits_per_word == 8 {
        info!("Byte frequency test");
        "byte_freq"
    } else {
        info!("{}-bit words frequency test", opts.bits_per_word);
        "word_freq"
    };
    info!("  nblocks = {}; block_len = {}", opts.nblocks, block_len);
    let mut wfreq = vec![0u64; nbins];
    let mut cdf_values = Vec::with_capacity(opts.nblocks as usize);
    for _ in 0..opts.nblocks {
        wfreq.fill(0);
        for _ in 0..block_len {
            let mut u = state.next();
            for _ in 0..words_per_value {
                wfreq[(u & mask) as usize] += 1;
                u >>= opts.bits_per_word;
            }
        }
        let chi2: f64 = wfreq
            .iter()
            .map(|&o| (o as f64 - ei).powi(2) / ei)
            .sum();
        cdf_values.push(chi2_cdf(chi2, nbins as u64 - 1));
    }
    let k = ks_uniform_statistic(&mut cdf_values);
    let p = ks_pvalue(k);
    let result = TestResult::new(name, k, p, 1.0 - p);
    info!("  K = {}; p = {}", result.statistic, result.p_value);
    result
}
