// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Custom batteries loaded from text files.
//!
//! A file is a sequence of blocks `unit_name key=value ... end`. Blocks may
//! span several lines, `#` starts a comment. The algorithm is chosen by the
//! `test=` key and defaults to the unit name, so `mod3 nvalues=1000000 end`
//! is a complete unit. An optional `battery name=... end` block names the
//! battery. Any malformed block aborts loading of the whole file.
//!
//! ```text
//! battery name=lcg_hunt end
//! bspace32_2d test=bspace_nd nbits_per_dim=32 ndims=2
//!     nsamples=128 get_lower=1 end
//! lc_low test=linearcomp nbits=20000 bitpos=low end
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::info;

use crate::battery::{Battery, RamTier, TestSpec, TestUnit};
use crate::error::{Error, Result};
use crate::stat_tests::bspace::{BSpaceDecimatedOptions, BSpaceNdOptions};
use crate::stat_tests::collover::{CollOverNdOptions, COLLOVER_DEFAULT_N};
use crate::stat_tests::extra::{Gap16Options, Mod3Options, SumCollectorOptions};
use crate::stat_tests::freq::{MonobitOptions, NBitWordsOptions};
use crate::stat_tests::gap::GapOptions;
use crate::stat_tests::hamming::{
    HammingDistrOptions, HammingOtLongOptions, HammingOtMode, HammingOtOptions,
};
use crate::stat_tests::linearcomp::{BitPosition, LinearCompOptions};
use crate::stat_tests::matrixrank::MatrixRankOptions;

const DEFAULT_BATTERY_NAME: &str = "custom";
const BLOCK_END: &str = "end";
const BATTERY_HEADER: &str = "battery";

/// Loaded units are costed like a cheap built-in test.
const FILE_UNIT_COST: u32 = 1;

#[derive(Debug)]
struct Arg {
    key: String,
    value: String,
    line: usize,
}

/// One `name key=value ... end` block before interpretation.
#[derive(Debug)]
struct Block {
    name: String,
    line: usize,
    args: Vec<Arg>,
}

fn file_error(line: usize, reason: impl Into<String>) -> Error {
    Error::BatteryFile {
        line,
        reason: reason.into(),
    }
}

/// Split the text into blocks.
fn read_blocks(text: &str) -> Result<Vec<Block>> {
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;
    for (i, raw_line) in text.lines().enumerate() {
        let line = i + 1;
        let content = raw_line.split('#').next().unwrap_or("");
        for token in content.split_whitespace() {
            if token == BLOCK_END {
                match current.take() {
                    Some(block) => blocks.push(block),
                    None => return Err(file_error(line, "'end' without a test name")),
                }
                continue;
            }
            match current.as_mut() {
                None => {
                    if token.contains('=') {
                        return Err(file_error(line, format!("Expected a test name, got '{token}'")));
                    }
                    current = Some(Block {
                        name: token.to_owned(),
                        line,
                        args: Vec::new(),
                    });
                }
                Some(block) => {
                    let Some((key, value)) = token.split_once('=') else {
                        return Err(file_error(
                            line,
                            format!("Token '{token}' doesn't contain '='"),
                        ));
                    };
                    if key.is_empty() || value.is_empty() {
                        return Err(file_error(line, format!("Malformed token '{token}'")));
                    }
                    if block.args.iter().any(|a| a.key == key) {
                        return Err(file_error(line, format!("Duplicate key '{key}'")));
                    }
                    block.args.push(Arg {
                        key: key.to_owned(),
                        value: value.to_owned(),
                        line,
                    });
                }
            }
        }
    }
    if let Some(block) = current {
        return Err(file_error(
            block.line,
            format!("Block '{}' is not terminated by '{BLOCK_END}'", block.name),
        ));
    }
    Ok(blocks)
}

/// Typed access to the arguments of one block. Keys that are never read
/// are reported as unknown by [`Args::finish`].
struct Args<'a> {
    block: &'a Block,
    used: HashSet<&'a str>,
}

impl<'a> Args<'a> {
    fn new(block: &'a Block) -> Self {
        Args {
            block,
            used: HashSet::new(),
        }
    }

    fn get(&mut self, key: &str) -> Option<&'a Arg> {
        let arg = self.block.args.iter().find(|a| a.key == key)?;
        self.used.insert(arg.key.as_str());
        Some(arg)
    }

    fn invalid(&self, arg: Option<&Arg>, key: &str) -> Error {
        file_error(
            arg.map_or(self.block.line, |a| a.line),
            format!("Invalid {key} value"),
        )
    }

    /// Integer in `min..=max`; missing keys are invalid.
    fn int(&mut self, key: &str, min: u64, max: u64) -> Result<u64> {
        let arg = self.get(key);
        match arg.and_then(|a| a.value.parse::<u64>().ok()) {
            Some(v) if (min..=max).contains(&v) => Ok(v),
            _ => Err(self.invalid(arg, key)),
        }
    }

    fn int_or(&mut self, key: &str, default: u64, min: u64, max: u64) -> Result<u64> {
        if self.block.args.iter().any(|a| a.key == key) {
            self.int(key, min, max)
        } else {
            Ok(default)
        }
    }

    fn int_of(&mut self, key: &str, allowed: &[u64]) -> Result<u64> {
        let arg = self.get(key);
        match arg.and_then(|a| a.value.parse::<u64>().ok()) {
            Some(v) if allowed.contains(&v) => Ok(v),
            _ => Err(self.invalid(arg, key)),
        }
    }

    fn flag_or(&mut self, key: &str, default: bool) -> Result<bool> {
        Ok(self.int_or(key, default as u64, 0, 1)? == 1)
    }

    fn parse<T>(&mut self, key: &str, f: impl FnOnce(&str) -> Option<T>) -> Result<T> {
        let arg = self.get(key);
        arg.and_then(|a| f(&a.value))
            .ok_or_else(|| self.invalid(arg, key))
    }

    fn finish(self) -> Result<()> {
        match self
            .block
            .args
            .iter()
            .find(|a| !self.used.contains(a.key.as_str()))
        {
            Some(arg) => Err(file_error(arg.line, format!("Unknown option '{}'", arg.key))),
            None => Ok(()),
        }
    }
}

/// Build the test described by one block.
fn parse_unit(block: &Block) -> Result<TestUnit> {
    let mut args = Args::new(block);
    let kind = match args.get("test") {
        Some(arg) => arg.value.as_str(),
        None => block.name.as_str(),
    };
    let (spec, ram) = match kind {
        "bspace_nd" => {
            let nbits_per_dim = args.int("nbits_per_dim", 1, 64)? as u32;
            let ndims = args.int("ndims", 1, 64)? as u32;
            let nsamples = args.int("nsamples", 128, 1 << 30)?;
            let get_lower = args.int("get_lower", 0, 1)? == 1;
            if nbits_per_dim * ndims > 64 {
                return Err(file_error(block.line, "nbits_per_dim * ndims exceeds 64"));
            }
            let spec = TestSpec::BSpaceNd(BSpaceNdOptions {
                nbits_per_dim,
                ndims,
                nsamples,
                get_lower,
            });
            (spec, RamTier::High)
        }
        "bspace4_8d_decimated" => {
            let step = args.int("step", 1, 1 << 30)?;
            let nsamples = args.int_or("nsamples", 16, 1, 1 << 20)?;
            let spec = TestSpec::BSpaceDecimated(BSpaceDecimatedOptions { step, nsamples });
            (spec, RamTier::Low)
        }
        "collover_nd" => {
            let nbits_per_dim = args.int("nbits_per_dim", 1, 63)? as u32;
            let ndims = args.int("ndims", 1, 63)? as u32;
            let nsamples = args.int("nsamples", 1, 1 << 20)?;
            let n = args.int_or("n", COLLOVER_DEFAULT_N, 2, 1 << 32)?;
            let get_lower = args.flag_or("get_lower", true)?;
            if nbits_per_dim * ndims >= 64 {
                return Err(file_error(block.line, "nbits_per_dim * ndims must be below 64"));
            }
            if n < ndims as u64 {
                return Err(file_error(block.line, "n is smaller than ndims"));
            }
            let spec = TestSpec::CollOver(CollOverNdOptions {
                nbits_per_dim,
                ndims,
                nsamples,
                n,
                get_lower,
            });
            (spec, RamTier::High)
        }
        "gap" => {
            let shl = args.int("shl", 1, 20)? as u32;
            let ngaps = args.int("ngaps", 1000, 1 << 40)?;
            (TestSpec::Gap(GapOptions { shl, ngaps }), RamTier::Low)
        }
        "gap16" => {
            let ngaps = args.int("ngaps", 1000, 1 << 36)?;
            (TestSpec::Gap16(Gap16Options { ngaps }), RamTier::Medium)
        }
        "hamming_ot" => {
            let mode = args.parse("mode", HammingOtMode::from_name)?;
            let nbytes = args.int("nbytes", 1 << 16, 1 << 40)?;
            (TestSpec::HammingOt(HammingOtOptions { nbytes, mode }), RamTier::Medium)
        }
        "hamming_ot_long" => {
            let wordsize = args.int_of("wordsize", &[128, 256, 512, 1024])? as u32;
            let nvalues = args.int("nvalues", 1 << 16, 1 << 40)?;
            let spec = TestSpec::HammingOtLong(HammingOtLongOptions { nvalues, wordsize });
            (spec, RamTier::Medium)
        }
        "hamming_distr" => {
            let nvalues = args.int("nvalues", 1 << 16, 1 << 40)?;
            let nlevels = args.int_or("nlevels", 8, 1, 16)? as u32;
            let spec = TestSpec::HammingDistr(HammingDistrOptions { nvalues, nlevels });
            (spec, RamTier::Low)
        }
        "linearcomp" => {
            let nbits = args.int("nbits", 16, 1 << 24)? as usize;
            let bitpos = args.parse("bitpos", |v| {
                BitPosition::from_name(v).filter(|b| !matches!(b, BitPosition::Index(i) if *i >= 64))
            })?;
            let spec = TestSpec::LinearComp(LinearCompOptions { nbits, bitpos });
            (spec, RamTier::Low)
        }
        "matrixrank" => {
            let n = args.int("n", 64, 1 << 16)? as usize;
            if n % 64 != 0 {
                return Err(file_error(block.line, "n must be a multiple of 64"));
            }
            let max_nbits = args.int_of("max_nbits", &[8, 32, 64])? as u32;
            let nmatrices = args.int_or("nmatrices", 32, 1, 1 << 20)?;
            let spec = TestSpec::MatrixRank(MatrixRankOptions {
                n,
                max_nbits,
                nmatrices,
            });
            (spec, RamTier::Medium)
        }
        "monobit_freq" => {
            let nvalues = args.int("nvalues", 1, 1 << 40)?;
            (TestSpec::Monobit(MonobitOptions { nvalues }), RamTier::Low)
        }
        "mod3" => {
            let nvalues = args.int("nvalues", 1 << 16, 1 << 40)?;
            (TestSpec::Mod3(Mod3Options { nvalues }), RamTier::Medium)
        }
        "nbit_words_freq" => {
            let bits_per_word = args.int("bits_per_word", 1, 16)? as u32;
            let average_freq = args.int("average_freq", 8, 1 << 20)?;
            let nblocks = args.int("nblocks", 16, 1 << 30)?;
            let spec = TestSpec::NBitWords(NBitWordsOptions {
                bits_per_word,
                average_freq,
                nblocks,
            });
            (spec, RamTier::Medium)
        }
        "sumcollector" => {
            let nvalues = args.int("nvalues", 1 << 16, 1 << 40)?;
            (TestSpec::SumCollector(SumCollectorOptions { nvalues }), RamTier::Low)
        }
        _ => return Err(file_error(block.line, format!("Unknown test '{kind}'"))),
    };
    args.finish()?;
    Ok(TestUnit::new(block.name.as_str(), spec, FILE_UNIT_COST, ram))
}

/// Parse a battery from the text of a battery file.
pub fn parse_battery(text: &str) -> Result<Battery> {
    let mut name: Option<String> = None;
    let mut units = Vec::new();
    for block in read_blocks(text)? {
        if block.name == BATTERY_HEADER {
            if name.is_some() {
                return Err(file_error(block.line, "Duplicate battery header"));
            }
            let mut args = Args::new(&block);
            name = Some(args.parse("name", |v| Some(v.to_owned()))?);
            args.finish()?;
            continue;
        }
        let unit = parse_unit(&block)?;
        if units.iter().any(|u: &TestUnit| u.name == unit.name) {
            return Err(file_error(
                block.line,
                format!("Duplicate test name '{}'", unit.name),
            ));
        }
        units.push(unit);
    }
    if units.is_empty() {
        return Err(file_error(text.lines().count(), "No tests found"));
    }
    Ok(Battery::new(
        name.unwrap_or_else(|| DEFAULT_BATTERY_NAME.to_owned()),
        units,
    ))
}

/// Load a battery file from disk.
pub fn load_battery(path: impl AsRef<Path>) -> Result<Battery> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let battery = parse_battery(&text)?;
    info!(
        "Loaded battery '{}' with {} tests from {}",
        battery.name,
        battery.units.len(),
        path.display()
    );
    Ok(battery)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_line(text: &str) -> (usize, String) {
        match parse_battery(text) {
            Err(Error::BatteryFile { line, reason }) => (line, reason),
            other => panic!("expected a battery file error, got {other:?}"),
        }
    }

    #[test]
    fn multiline_blocks_and_comments() {
        let text = "# leading comment\n\
                    battery name=mine end\n\
                    b2d test=bspace_nd nbits_per_dim=32 # trailing\n\
                    \tndims=2 nsamples=128 get_lower=0\n\
                    end\n\
                    mod3 nvalues=100000 end lc test=linearcomp nbits=5000 bitpos=mid end\n";
        let battery = parse_battery(text).unwrap();
        assert_eq!(battery.name, "mine");
        let names: Vec<&str> = battery.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["b2d", "mod3", "lc"]);
        assert_eq!(
            battery.units[0].spec,
            TestSpec::BSpaceNd(BSpaceNdOptions {
                nbits_per_dim: 32,
                ndims: 2,
                nsamples: 128,
                get_lower: false,
            })
        );
        assert_eq!(
            battery.units[2].spec,
            TestSpec::LinearComp(LinearCompOptions {
                nbits: 5000,
                bitpos: BitPosition::Mid,
            })
        );
    }

    #[test]
    fn defaults_for_optional_keys() {
        let battery = parse_battery("c test=collover_nd nbits_per_dim=8 ndims=5 nsamples=2 end")
            .unwrap();
        assert_eq!(battery.name, DEFAULT_BATTERY_NAME);
        match &battery.units[0].spec {
            TestSpec::CollOver(o) => {
                assert_eq!(o.n, COLLOVER_DEFAULT_N);
                assert!(o.get_lower);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn out_of_range_value_names_line_and_key() {
        let text = "ok test=mod3 nvalues=100000 end\n\nbad test=bspace_nd nbits_per_dim=32 ndims=1\nnsamples=5 get_lower=1 end\n";
        assert_eq!(error_line(text), (4, "Invalid nsamples value".to_owned()));
    }

    #[test]
    fn missing_key_reports_block_line() {
        let text = "\nlc test=linearcomp bitpos=low end";
        assert_eq!(error_line(text), (2, "Invalid nbits value".to_owned()));
    }

    #[test]
    fn unknown_test_and_option() {
        assert_eq!(
            error_line("x test=spectral nbits=10 end").1,
            "Unknown test 'spectral'"
        );
        assert_eq!(
            error_line("mod3 nvalues=100000\nsize=3 end"),
            (2, "Unknown option 'size'".to_owned())
        );
    }

    #[test]
    fn structural_errors() {
        assert_eq!(error_line("mod3 nvalues=100000").1, "Block 'mod3' is not terminated by 'end'");
        assert_eq!(error_line("mod3 nvalues end").1, "Token 'nvalues' doesn't contain '='");
        assert_eq!(error_line("# nothing\n").1, "No tests found");
        assert_eq!(error_line("mod3 nvalues=100000 end end").1, "'end' without a test name");
        assert_eq!(
            error_line("mod3 nvalues=100000 end mod3 nvalues=200000 end").1,
            "Duplicate test name 'mod3'"
        );
        assert_eq!(
            error_line("bs test=bspace_nd nbits_per_dim=32 ndims=3 nsamples=128 get_lower=1 end").1,
            "nbits_per_dim * ndims exceeds 64"
        );
    }

    #[test]
    fn hamming_distr_block() {
        let battery = parse_battery(
            "hw test=hamming_distr nvalues=1000000 end\nhamming_distr nvalues=65536 nlevels=3 end",
        )
        .unwrap();
        assert_eq!(
            battery.units[0].spec,
            TestSpec::HammingDistr(HammingDistrOptions {
                nvalues: 1_000_000,
                nlevels: 8,
            })
        );
        assert_eq!(battery.units[1].spec.describe(), "nvalues=65536 nlevels=3");
        assert_eq!(
            error_line("hw test=hamming_distr nvalues=1000000 nlevels=17 end").1,
            "Invalid nlevels value"
        );
    }

    #[test]
    fn enumerated_values() {
        assert!(parse_battery("h test=hamming_ot mode=low8 nbytes=1000000 end").is_ok());
        assert_eq!(
            error_line("h test=hamming_ot mode=low4 nbytes=1000000 end").1,
            "Invalid mode value"
        );
        assert_eq!(
            error_line("m test=matrixrank n=256 max_nbits=16 end").1,
            "Invalid max_nbits value"
        );
        assert_eq!(
            error_line("lc test=linearcomp nbits=1000 bitpos=65 end").1,
            "Invalid bitpos value"
        );
        assert_eq!(
            error_line("lc test=linearcomp nbits=1000\n  bitpos=64 end"),
            (2, "Invalid bitpos value".to_owned())
        );
        assert!(parse_battery("lc test=linearcomp nbits=1000 bitpos=63 end").is_ok());
    }
}
