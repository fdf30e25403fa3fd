// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Test units and the built-in batteries.
//!
//! A [`Battery`] is an ordered list of [`TestUnit`]s. Every unit couples a
//! display name with a [`TestSpec`], the algorithm and its options. The
//! cost is a rough run time hint in units of one monobit test, the RAM
//! tier a hint for memory hungry tests.

use std::fmt;

use crate::error::{Error, Result};
use crate::generator::GeneratorState;
use crate::stat_tests::bspace::{
    bspace4_8d_decimated_test, bspace_nd_test, BSpaceDecimatedOptions, BSpaceNdOptions,
};
use crate::stat_tests::collover::{collisionover_test, CollOverNdOptions, COLLOVER_DEFAULT_N};
use crate::stat_tests::extra::{
    gap16_test, mod3_test, sumcollector_test, Gap16Options, Mod3Options, SumCollectorOptions,
};
use crate::stat_tests::freq::{
    monobit_freq_test, nbit_words_freq_test, MonobitOptions, NBitWordsOptions,
};
use crate::stat_tests::gap::{gap_test, GapOptions};
use crate::stat_tests::hamming::{
    hamming_distr_test, hamming_ot_long_test, hamming_ot_test, HammingDistrOptions,
    HammingOtLongOptions, HammingOtMode, HammingOtOptions,
};
use crate::stat_tests::linearcomp::{linearcomp_test, BitPosition, LinearCompOptions};
use crate::stat_tests::matrixrank::{matrixrank_test, MatrixRankOptions};
use crate::stat_tests::TestResult;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RamTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for RamTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RamTier::Low => "lo",
            RamTier::Medium => "med",
            RamTier::High => "hi",
        })
    }
}

/// A test algorithm together with its options.
#[derive(Debug, Clone, PartialEq)]
pub enum TestSpec {
    Monobit(MonobitOptions),
    NBitWords(NBitWordsOptions),
    BSpaceNd(BSpaceNdOptions),
    BSpaceDecimated(BSpaceDecimatedOptions),
    CollOver(CollOverNdOptions),
    Gap(GapOptions),
    Gap16(Gap16Options),
    HammingOt(HammingOtOptions),
    HammingOtLong(HammingOtLongOptions),
    HammingDistr(HammingDistrOptions),
    LinearComp(LinearCompOptions),
    MatrixRank(MatrixRankOptions),
    Mod3(Mod3Options),
    SumCollector(SumCollectorOptions),
}

impl TestSpec {
    pub fn run(&self, state: &mut GeneratorState) -> TestResult {
        match self {
            TestSpec::Monobit(opts) => monobit_freq_test(state, opts),
            TestSpec::NBitWords(opts) => nbit_words_freq_test(state, opts),
            TestSpec::BSpaceNd(opts) => bspace_nd_test(state, opts),
            TestSpec::BSpaceDecimated(opts) => bspace4_8d_decimated_test(state, opts),
            TestSpec::CollOver(opts) => collisionover_test(state, opts),
            TestSpec::Gap(opts) => gap_test(state, opts),
            TestSpec::Gap16(opts) => gap16_test(state, opts),
            TestSpec::HammingOt(opts) => hamming_ot_test(state, opts),
            TestSpec::HammingOtLong(opts) => hamming_ot_long_test(state, opts),
            TestSpec::HammingDistr(opts) => hamming_distr_test(state, opts),
            TestSpec::LinearComp(opts) => linearcomp_test(state, opts),
            TestSpec::MatrixRank(opts) => matrixrank_test(state, opts),
            TestSpec::Mod3(opts) => mod3_test(state, opts),
            TestSpec::SumCollector(opts) => sumcollector_test(state, opts),
        }
    }

    /// Name of the algorithm as used by `test=` in battery files.
    pub fn kind(&self) -> &'static str {
        match self {
            TestSpec::Monobit(_) => "monobit_freq",
            TestSpec::NBitWords(_) => "nbit_words_freq",
            TestSpec::BSpaceNd(_) => "bspace_nd",
            TestSpec::BSpaceDecimated(_) => "bspace4_8d_decimated",
            TestSpec::CollOver(_) => "collover_nd",
            TestSpec::Gap(_) => "gap",
            TestSpec::Gap16(_) => "gap16",
            TestSpec::HammingOt(_) => "hamming_ot",
            TestSpec::HammingOtLong(_) => "hamming_ot_long",
            TestSpec::HammingDistr(_) => "hamming_distr",
            TestSpec::LinearComp(_) => "linearcomp",
            TestSpec::MatrixRank(_) => "matrixrank",
            TestSpec::Mod3(_) => "mod3",
            TestSpec::SumCollector(_) => "sumcollector",
        }
    }

    /// Grade points lost when a test of this kind fails.
    pub fn penalty(&self) -> f64 {
        match self {
            TestSpec::Monobit(_) | TestSpec::NBitWords(_) | TestSpec::Gap(_) => 4.0,
            TestSpec::BSpaceNd(_) | TestSpec::CollOver(_) => 3.0,
            TestSpec::Gap16(_)
            | TestSpec::HammingOt(_)
            | TestSpec::HammingOtLong(_)
            | TestSpec::HammingDistr(_)
            | TestSpec::Mod3(_)
            | TestSpec::SumCollector(_) => 2.0,
            TestSpec::BSpaceDecimated(_) => 1.0,
            TestSpec::LinearComp(_) | TestSpec::MatrixRank(_) => 0.25,
        }
    }

    /// Options in battery file syntax.
    pub fn describe(&self) -> String {
        match self {
            TestSpec::Monobit(o) => format!("nvalues={}", o.nvalues),
            TestSpec::NBitWords(o) => format!(
                "bits_per_word={} average_freq={} nblocks={}",
                o.bits_per_word, o.average_freq, o.nblocks
            ),
            TestSpec::BSpaceNd(o) => format!(
                "nbits_per_dim={} ndims={} nsamples={} get_lower={}",
                o.nbits_per_dim, o.ndims, o.nsamples, o.get_lower as u8
            ),
            TestSpec::BSpaceDecimated(o) => format!("step={} nsamples={}", o.step, o.nsamples),
            TestSpec::CollOver(o) => format!(
                "nbits_per_dim={} ndims={} nsamples={} n={} get_lower={}",
                o.nbits_per_dim, o.ndims, o.nsamples, o.n, o.get_lower as u8
            ),
            TestSpec::Gap(o) => format!("shl={} ngaps={}", o.shl, o.ngaps),
            TestSpec::Gap16(o) => format!("ngaps={}", o.ngaps),
            TestSpec::HammingOt(o) => {
                let mode = match o.mode {
                    HammingOtMode::Values => "values",
                    HammingOtMode::Bytes => "bytes",
                    HammingOtMode::Low8 => "low8",
                    HammingOtMode::Low1 => "low1",
                };
                format!("mode={} nbytes={}", mode, o.nbytes)
            }
            TestSpec::HammingOtLong(o) => {
                format!("wordsize={} nvalues={}", o.wordsize, o.nvalues)
            }
            TestSpec::HammingDistr(o) => format!("nvalues={} nlevels={}", o.nvalues, o.nlevels),
            TestSpec::LinearComp(o) => {
                let bitpos = match o.bitpos {
                    BitPosition::Low => "low".to_owned(),
                    BitPosition::Mid => "mid".to_owned(),
                    BitPosition::High => "high".to_owned(),
                    BitPosition::Index(i) => i.to_string(),
                };
                format!("nbits={} bitpos={}", o.nbits, bitpos)
            }
            TestSpec::MatrixRank(o) => format!(
                "n={} max_nbits={} nmatrices={}",
                o.n, o.max_nbits, o.nmatrices
            ),
            TestSpec::Mod3(o) => format!("nvalues={}", o.nvalues),
            TestSpec::SumCollector(o) => format!("nvalues={}", o.nvalues),
        }
    }

    /// Checks that depend on the output width of the generator under test.
    pub fn check_width(&self, unit: &str, nbits: u32) -> Result<()> {
        let invalid = |option: &str, reason: String| {
            Err(Error::InvalidOption {
                test: unit.to_owned(),
                option: option.to_owned(),
                reason,
            })
        };
        match self {
            TestSpec::LinearComp(o) => {
                let bitpos = o.bitpos.resolve(nbits);
                if bitpos >= nbits {
                    return invalid("bitpos", format!("bit {bitpos} of a {nbits}-bit generator"));
                }
            }
            TestSpec::Gap(o) if o.shl >= nbits => {
                return invalid("shl", format!("{} is not below {nbits}", o.shl));
            }
            TestSpec::HammingOtLong(o) if o.wordsize % nbits != 0 => {
                return invalid("wordsize", format!("{} is not a multiple of {nbits}", o.wordsize));
            }
            _ => {}
        }
        Ok(())
    }
}

/// One named entry of a battery.
#[derive(Debug, Clone, PartialEq)]
pub struct TestUnit {
    pub name: String,
    pub spec: TestSpec,
    pub cost: u32,
    pub ram: RamTier,
}

impl TestUnit {
    pub fn new(name: impl Into<String>, spec: TestSpec, cost: u32, ram: RamTier) -> Self {
        TestUnit {
            name: name.into(),
            spec,
            cost,
            ram,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Battery {
    pub name: String,
    pub units: Vec<TestUnit>,
}

fn bspace(nbits_per_dim: u32, ndims: u32, nsamples: u64, get_lower: bool) -> TestSpec {
    TestSpec::BSpaceNd(BSpaceNdOptions {
        nbits_per_dim,
        ndims,
        nsamples,
        get_lower,
    })
}

fn collover(nbits_per_dim: u32, ndims: u32, nsamples: u64, get_lower: bool) -> TestSpec {
    TestSpec::CollOver(CollOverNdOptions {
        nbits_per_dim,
        ndims,
        nsamples,
        n: COLLOVER_DEFAULT_N,
        get_lower,
    })
}

fn linearcomp(nbits: usize, bitpos: BitPosition) -> TestSpec {
    TestSpec::LinearComp(LinearCompOptions { nbits, bitpos })
}

fn hamming_ot(mode: HammingOtMode, nbytes: u64) -> TestSpec {
    TestSpec::HammingOt(HammingOtOptions { nbytes, mode })
}

fn hamming_ot_long(wordsize: u32) -> TestSpec {
    TestSpec::HammingOtLong(HammingOtLongOptions {
        nvalues: 1 << 30,
        wordsize,
    })
}

fn hamming_distr(nvalues: u64) -> TestSpec {
    TestSpec::HammingDistr(HammingDistrOptions { nvalues, nlevels: 8 })
}

fn matrixrank(n: usize, max_nbits: u32) -> TestSpec {
    TestSpec::MatrixRank(MatrixRankOptions {
        n,
        max_nbits,
        nmatrices: 32,
    })
}

/// Adds `{prefix}{b}_{d}d` on the lower bits and `..._high` on the upper bits.
fn push_low_high(
    units: &mut Vec<TestUnit>,
    prefix: &str,
    (nbits_per_dim, ndims): (u32, u32),
    make: impl Fn(bool) -> TestSpec,
    cost: u32,
    ram: RamTier,
) {
    let name = format!("{prefix}{nbits_per_dim}_{ndims}d");
    units.push(TestUnit::new(name.as_str(), make(true), cost, ram));
    units.push(TestUnit::new(format!("{name}_high"), make(false), cost, ram));
}

impl Battery {
    pub fn new(name: impl Into<String>, units: Vec<TestUnit>) -> Self {
        Battery {
            name: name.into(),
            units,
        }
    }

    /// A handful of quick tests, seconds per generator.
    pub fn express() -> Self {
        use RamTier::*;
        let units = vec![
            TestUnit::new(
                "byte_freq",
                TestSpec::NBitWords(NBitWordsOptions {
                    nblocks: 256,
                    ..NBitWordsOptions::byte_freq()
                }),
                1,
                Medium,
            ),
            TestUnit::new("bspace32_1d", bspace(32, 1, 1024, true), 1, High),
            TestUnit::new(
                "bspace4_8d_dec",
                TestSpec::BSpaceDecimated(BSpaceDecimatedOptions {
                    step: 1 << 7,
                    nsamples: 64,
                }),
                2,
                Low,
            ),
            TestUnit::new("linearcomp_high", linearcomp(10000, BitPosition::High), 1, Low),
            TestUnit::new("linearcomp_low", linearcomp(10000, BitPosition::Low), 1, Low),
        ];
        Battery::new("express", units)
    }

    /// About a minute per generator.
    pub fn brief() -> Self {
        use RamTier::*;
        let units = vec![
            TestUnit::new(
                "monobit_freq",
                TestSpec::Monobit(MonobitOptions { nvalues: 1 << 28 }),
                1,
                Low,
            ),
            TestUnit::new("byte_freq", TestSpec::NBitWords(NBitWordsOptions::byte_freq()), 1, Medium),
            TestUnit::new("bspace64_1d", bspace(64, 1, 40, true), 14, High),
            TestUnit::new("bspace32_1d", bspace(32, 1, 4096, true), 1, High),
            TestUnit::new("bspace32_1d_high", bspace(32, 1, 4096, false), 1, High),
            TestUnit::new("bspace32_2d", bspace(32, 2, 5, true), 2, High),
            TestUnit::new("bspace21_3d", bspace(21, 3, 5, true), 2, High),
            TestUnit::new("bspace16_4d", bspace(16, 4, 5, true), 2, High),
            TestUnit::new("bspace8_8d", bspace(8, 8, 5, true), 2, Medium),
            TestUnit::new(
                "bspace4_8d_dec",
                TestSpec::BSpaceDecimated(BSpaceDecimatedOptions {
                    step: 1 << 12,
                    nsamples: 16,
                }),
                10,
                Low,
            ),
            TestUnit::new("collover20_2d", collover(20, 2, 3, true), 4, High),
            TestUnit::new("collover13_3d", collover(13, 3, 3, true), 4, High),
            TestUnit::new("collover8_5d", collover(8, 5, 3, true), 4, Medium),
            TestUnit::new("collover5_8d", collover(5, 8, 3, true), 4, Medium),
            TestUnit::new(
                "gap_inv512",
                TestSpec::Gap(GapOptions {
                    shl: 9,
                    ngaps: 10_000_000,
                }),
                14,
                Low,
            ),
            TestUnit::new(
                "gap16_count0",
                TestSpec::Gap16(Gap16Options { ngaps: 100_000_000 }),
                2,
                Medium,
            ),
            TestUnit::new(
                "hamming_ot_values",
                hamming_ot(HammingOtMode::Values, 1 << 28),
                2,
                Medium,
            ),
            TestUnit::new("hamming_ot_low1", hamming_ot(HammingOtMode::Low1, 1 << 30), 5, Medium),
            TestUnit::new("linearcomp_high", linearcomp(50000, BitPosition::High), 1, Low),
            TestUnit::new("linearcomp_mid", linearcomp(50000, BitPosition::Mid), 1, Low),
            TestUnit::new("linearcomp_low", linearcomp(50000, BitPosition::Low), 1, Low),
        ];
        Battery::new("brief", units)
    }

    /// The full battery, several minutes per generator.
    pub fn default_battery() -> Self {
        use RamTier::*;
        let mut units = vec![
            TestUnit::new(
                "monobit_freq",
                TestSpec::Monobit(MonobitOptions { nvalues: 1 << 28 }),
                1,
                Low,
            ),
            TestUnit::new("byte_freq", TestSpec::NBitWords(NBitWordsOptions::byte_freq()), 1, Medium),
            TestUnit::new(
                "word16_freq",
                TestSpec::NBitWords(NBitWordsOptions::word16_freq()),
                17,
                Medium,
            ),
            TestUnit::new("bspace64_1d", bspace(64, 1, 100, true), 34, High),
        ];
        let bspace_layouts = [
            (32, 1, 8192, 2, High),
            (32, 2, 10, 3, High),
            (21, 3, 10, 3, High),
            (16, 4, 10, 4, High),
            (8, 8, 10, 4, Medium),
        ];
        for (b, d, nsamples, cost, ram) in bspace_layouts {
            push_low_high(&mut units, "bspace", (b, d), |low| bspace(b, d, nsamples, low), cost, ram);
        }
        units.push(TestUnit::new(
            "bspace4_8d_dec",
            TestSpec::BSpaceDecimated(BSpaceDecimatedOptions {
                step: 1 << 18,
                nsamples: 4,
            }),
            30,
            Low,
        ));
        units.push(TestUnit::new("bspace4_16d", bspace(4, 16, 10, true), 6, Medium));
        units.push(TestUnit::new("bspace4_16d_high", bspace(4, 16, 10, false), 6, Medium));
        for (b, d, cost, ram) in
            [(20, 2, 7, High), (13, 3, 8, High), (8, 5, 7, Medium), (5, 8, 7, Medium)]
        {
            push_low_high(&mut units, "collover", (b, d), |low| collover(b, d, 5, low), cost, ram);
        }
        units.extend([
            TestUnit::new(
                "gap_inv512",
                TestSpec::Gap(GapOptions {
                    shl: 9,
                    ngaps: 10_000_000,
                }),
                14,
                Low,
            ),
            TestUnit::new(
                "gap16_count0",
                TestSpec::Gap16(Gap16Options { ngaps: 500_000_000 }),
                10,
                Medium,
            ),
            TestUnit::new("hamming_ot", hamming_ot(HammingOtMode::Bytes, 1 << 30), 5, Medium),
            TestUnit::new("hamming_ot_low1", hamming_ot(HammingOtMode::Low1, 1 << 30), 5, Medium),
            TestUnit::new("hamming_ot_low8", hamming_ot(HammingOtMode::Low8, 1 << 30), 5, Medium),
            TestUnit::new(
                "hamming_ot_values",
                hamming_ot(HammingOtMode::Values, 1 << 30),
                5,
                Medium,
            ),
            TestUnit::new("hamming_ot_u128", hamming_ot_long(128), 7, Medium),
            TestUnit::new("hamming_ot_u256", hamming_ot_long(256), 7, Medium),
            TestUnit::new("hamming_ot_u512", hamming_ot_long(512), 7, Medium),
            TestUnit::new("hamming_distr", hamming_distr(1 << 30), 6, Low),
            TestUnit::new("linearcomp_high", linearcomp(100000, BitPosition::High), 1, Low),
            TestUnit::new("linearcomp_mid", linearcomp(100000, BitPosition::Mid), 1, Low),
            TestUnit::new("linearcomp_low", linearcomp(100000, BitPosition::Low), 1, Low),
            TestUnit::new("matrixrank_4096", matrixrank(4096, 64), 4, Medium),
            TestUnit::new("matrixrank_4096_low8", matrixrank(4096, 8), 5, Medium),
            TestUnit::new(
                "mod3",
                TestSpec::Mod3(Mod3Options { nvalues: 1 << 28 }),
                1,
                Medium,
            ),
            TestUnit::new(
                "sumcollector",
                TestSpec::SumCollector(SumCollectorOptions { nvalues: 1 << 30 }),
                3,
                Low,
            ),
        ]);
        Battery::new("default", units)
    }

    /// The default battery with larger samples and 8192 bit matrices,
    /// about an hour per generator.
    pub fn full() -> Self {
        use RamTier::*;
        let mut units = vec![
            TestUnit::new(
                "monobit_freq",
                TestSpec::Monobit(MonobitOptions { nvalues: 1 << 30 }),
                1,
                Low,
            ),
            TestUnit::new("byte_freq", TestSpec::NBitWords(NBitWordsOptions::byte_freq()), 1, Medium),
            TestUnit::new(
                "word16_freq",
                TestSpec::NBitWords(NBitWordsOptions::word16_freq()),
                20,
                Medium,
            ),
            TestUnit::new("bspace64_1d", bspace(64, 1, 250, true), 90, High),
        ];
        let bspace_layouts = [
            (32, 1, 8192, 2, High),
            (32, 2, 250, 90, High),
            (21, 3, 250, 77, High),
            (16, 4, 250, 97, High),
            (8, 8, 250, 120, Medium),
        ];
        for (b, d, nsamples, cost, ram) in bspace_layouts {
            push_low_high(&mut units, "bspace", (b, d), |low| bspace(b, d, nsamples, low), cost, ram);
        }
        units.push(TestUnit::new(
            "bspace4_8d_dec",
            TestSpec::BSpaceDecimated(BSpaceDecimatedOptions {
                step: 1 << 18,
                nsamples: 16,
            }),
            30,
            Low,
        ));
        push_low_high(&mut units, "bspace", (4, 16), |low| bspace(4, 16, 250, low), 145, Medium);
        for (b, d, cost, ram) in
            [(20, 2, 73, High), (13, 3, 73, High), (8, 5, 73, Medium), (5, 8, 72, Medium)]
        {
            push_low_high(&mut units, "collover", (b, d), |low| collover(b, d, 50, low), cost, ram);
        }
        units.extend([
            TestUnit::new(
                "gap_inv512",
                TestSpec::Gap(GapOptions {
                    shl: 9,
                    ngaps: 10_000_000,
                }),
                14,
                Low,
            ),
            TestUnit::new(
                "gap_inv1024",
                TestSpec::Gap(GapOptions {
                    shl: 10,
                    ngaps: 100_000_000,
                }),
                284,
                Low,
            ),
            TestUnit::new(
                "gap16_count0",
                TestSpec::Gap16(Gap16Options {
                    ngaps: 2_000_000_000,
                }),
                40,
                Medium,
            ),
            TestUnit::new("hamming_ot", hamming_ot(HammingOtMode::Bytes, 1 << 33), 36, Medium),
            TestUnit::new("hamming_ot_low1", hamming_ot(HammingOtMode::Low1, 1 << 32), 4, Medium),
            TestUnit::new("hamming_ot_low8", hamming_ot(HammingOtMode::Low8, 1 << 32), 8, Medium),
            TestUnit::new(
                "hamming_ot_values",
                hamming_ot(HammingOtMode::Values, 1 << 33),
                16,
                Medium,
            ),
            TestUnit::new("hamming_ot_u128", hamming_ot_long(128), 7, Medium),
            TestUnit::new("hamming_ot_u256", hamming_ot_long(256), 7, Medium),
            TestUnit::new("hamming_ot_u512", hamming_ot_long(512), 7, Medium),
            TestUnit::new("hamming_ot_u1024", hamming_ot_long(1024), 7, Medium),
            TestUnit::new("hamming_distr", hamming_distr(1 << 32), 24, Low),
            TestUnit::new("linearcomp_high", linearcomp(500_000, BitPosition::High), 35, Low),
            TestUnit::new("linearcomp_mid", linearcomp(500_000, BitPosition::Mid), 35, Low),
            TestUnit::new("linearcomp_low", linearcomp(500_000, BitPosition::Low), 35, Low),
            TestUnit::new("matrixrank_4096", matrixrank(4096, 64), 4, Medium),
            TestUnit::new("matrixrank_4096_low8", matrixrank(4096, 8), 5, Medium),
            TestUnit::new("matrixrank_8192", matrixrank(8192, 64), 36, High),
            TestUnit::new("matrixrank_8192_low8", matrixrank(8192, 8), 36, High),
            TestUnit::new(
                "mod3",
                TestSpec::Mod3(Mod3Options { nvalues: 1 << 30 }),
                4,
                Medium,
            ),
            TestUnit::new(
                "sumcollector",
                TestSpec::SumCollector(SumCollectorOptions { nvalues: 1 << 32 }),
                12,
                Low,
            ),
        ]);
        Battery::new("full", units)
    }

    /// Built-in battery by name.
    pub fn by_name(name: &str) -> Result<Self> {
        match name {
            "express" => Ok(Battery::express()),
            "brief" => Ok(Battery::brief()),
            "default" => Ok(Battery::default_battery()),
            "full" => Ok(Battery::full()),
            _ => Err(Error::UnknownBattery(name.to_owned())),
        }
    }

    /// Position of the unit named `selector`, or given by its 1-based index.
    pub fn find_unit(&self, selector: &str) -> Result<usize> {
        if let Some(pos) = self.units.iter().position(|u| u.name == selector) {
            return Ok(pos);
        }
        match selector.parse::<usize>() {
            Ok(i) if i >= 1 && i <= self.units.len() => Ok(i - 1),
            _ => Err(Error::UnknownTest(selector.to_owned())),
        }
    }

    pub fn total_cost(&self) -> u32 {
        self.units.iter().map(|u| u.cost).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::native_state;
    use crate::rngs;

    #[test]
    fn builtin_batteries_have_unique_names() {
        for battery in [
            Battery::express(),
            Battery::brief(),
            Battery::default_battery(),
            Battery::full(),
        ] {
            let mut names: Vec<&str> = battery.units.iter().map(|u| u.name.as_str()).collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), battery.units.len(), "{}", battery.name);
        }
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(Battery::by_name("brief").unwrap().name, "brief");
        assert_eq!(Battery::by_name("full").unwrap().name, "full");
        assert!(matches!(Battery::by_name("huge"), Err(Error::UnknownBattery(_))));
    }

    #[test]
    fn unit_selection_by_name_or_index() {
        let battery = Battery::express();
        assert_eq!(battery.find_unit("bspace32_1d").unwrap(), 1);
        assert_eq!(battery.find_unit("1").unwrap(), 0);
        assert_eq!(battery.find_unit("5").unwrap(), 4);
        assert!(battery.find_unit("0").is_err());
        assert!(battery.find_unit("6").is_err());
        assert!(battery.find_unit("bspace").is_err());
    }

    #[test]
    fn default_battery_layout() {
        let battery = Battery::default_battery();
        let high = &battery.units[battery.find_unit("bspace21_3d_high").unwrap()];
        assert_eq!(high.spec, bspace(21, 3, 10, false));
        assert_eq!(high.ram, RamTier::High);
        assert!(battery.find_unit("collover5_8d_high").is_ok());
        assert!(battery.total_cost() > Battery::brief().total_cost());
    }

    #[test]
    fn full_battery_extends_default() {
        let full = Battery::full();
        let default = Battery::default_battery();
        for unit in &default.units {
            assert!(full.find_unit(&unit.name).is_ok(), "{} missing", unit.name);
        }
        let rank = &full.units[full.find_unit("matrixrank_8192_low8").unwrap()];
        assert_eq!(rank.spec, matrixrank(8192, 8));
        let high = &full.units[full.find_unit("bspace4_16d_high").unwrap()];
        assert_eq!(high.spec, bspace(4, 16, 250, false));
        assert!(full.find_unit("gap_inv1024").is_ok());
        assert!(full.total_cost() > default.total_cost());
    }

    #[test]
    fn hamming_distr_unit() {
        let spec = hamming_distr(1 << 20);
        assert_eq!(spec.kind(), "hamming_distr");
        assert_eq!(spec.penalty(), 2.0);
        assert_eq!(spec.describe(), "nvalues=1048576 nlevels=8");
        let mut state = native_state::<rngs::testgens::OnlyZero>(0, 64);
        let r = spec.run(&mut state);
        assert_eq!(r.name, "hamming_distr");
        assert!(r.p_value < 1e-10);
    }

    #[test]
    fn penalties_and_descriptions() {
        assert_eq!(linearcomp(1000, BitPosition::Mid).penalty(), 0.25);
        assert_eq!(bspace(32, 2, 5, true).penalty(), 3.0);
        assert_eq!(
            bspace(32, 2, 5, true).describe(),
            "nbits_per_dim=32 ndims=2 nsamples=5 get_lower=1"
        );
        assert_eq!(
            linearcomp(1000, BitPosition::Index(7)).describe(),
            "nbits=1000 bitpos=7"
        );
        assert_eq!(hamming_ot_long(256).kind(), "hamming_ot_long");
    }

    #[test]
    fn width_checks() {
        let spec = linearcomp(1000, BitPosition::Index(40));
        assert!(spec.check_width("lc", 64).is_ok());
        assert!(matches!(
            spec.check_width("lc", 32),
            Err(Error::InvalidOption { .. })
        ));
        let gap = TestSpec::Gap(GapOptions { shl: 40, ngaps: 10 });
        assert!(gap.check_width("gap", 32).is_err());
        assert!(hamming_ot_long(128).check_width("h", 32).is_ok());
    }

    #[test]
    fn run_dispatches_to_the_algorithm() {
        let spec = TestSpec::Monobit(MonobitOptions { nvalues: 1000 });
        let mut state = native_state::<rngs::testgens::OnlyZero>(0, 64);
        let r = spec.run(&mut state);
        assert_eq!(r.name, "monobit_freq");
        assert_eq!(r.p_value, 0.0);
    }
}
