// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

use std::fs;
use std::path::PathBuf;

use acidbath::battery::{Battery, RamTier, TestSpec, TestUnit};
use acidbath::battery_file::{load_battery, parse_battery};
use acidbath::dispatcher::{run_battery, BatteryOptions, Dispatcher, RunOutcome};
use acidbath::generator::{find_generator, FilterKind, Filtered, Generator};
use acidbath::report::{BatteryReport, ReportMode, Verdict};
use acidbath::seed::SeedSource;
use acidbath::stat_tests::freq::MonobitOptions;
use acidbath::Error;

fn monobit_battery(nvalues: u64) -> Battery {
    Battery::new(
        "monobit",
        vec![TestUnit::new(
            "monobit_freq",
            TestSpec::Monobit(MonobitOptions { nvalues }),
            1,
            RamTier::Low,
        )],
    )
}

fn run(battery: &Battery, gen: &dyn Generator, seed: u64, threads: usize) -> BatteryReport {
    let options = BatteryOptions {
        threads,
        ..BatteryOptions::default()
    };
    Dispatcher::new(battery, &options)
        .run(gen, &SeedSource::from_seed(seed))
        .unwrap()
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("acidbath-{}-{}", std::process::id(), name))
}

const MIXED_BATTERY: &str = "\
# quick mixed battery
battery name=mixed end
mono test=monobit_freq nvalues=100000 end
bytes test=nbit_words_freq bits_per_word=8 average_freq=16 nblocks=32 end
b2d test=bspace_nd nbits_per_dim=16 ndims=2 nsamples=128 get_lower=1 end
lc_high test=linearcomp nbits=2000 bitpos=high end
lc_low test=linearcomp nbits=2000 bitpos=low end
mrank test=matrixrank n=128 max_nbits=64 nmatrices=8 end
mod3 nvalues=100000 end
";

#[test]
fn report_order_does_not_depend_on_threads() {
    let battery = parse_battery(MIXED_BATTERY).unwrap();
    let gen = find_generator("chacha").unwrap();
    let single = run(&battery, gen.as_ref(), 7, 1);
    let multi = run(&battery, gen.as_ref(), 7, 3);
    let names = |r: &BatteryReport| -> Vec<String> {
        r.results.iter().map(|u| u.name.clone()).collect()
    };
    assert_eq!(names(&single), names(&multi));
    assert_eq!(
        names(&single),
        ["mono", "bytes", "b2d", "lc_high", "lc_low", "mrank", "mod3"]
    );
    let indices: Vec<usize> = multi.results.iter().map(|u| u.index).collect();
    assert_eq!(indices, (0..7).collect::<Vec<_>>());
    let threads: Vec<usize> = multi.results.iter().map(|u| u.thread).collect();
    assert_eq!(threads, [1, 2, 3, 1, 2, 3, 1]);
}

#[test]
fn battery_file_round_trip_through_disk() {
    let path = temp_path("mixed.cfg");
    fs::write(&path, MIXED_BATTERY).unwrap();
    let battery = load_battery(&path).unwrap();
    fs::remove_file(&path).unwrap();
    assert_eq!(battery.name, "mixed");
    assert_eq!(battery.units.len(), 7);
    assert_eq!(battery.units[5].spec.kind(), "matrixrank");
}

#[test]
fn battery_file_errors_abort_loading() {
    let text = "mono test=monobit_freq nvalues=1000 end\n\
                lc test=linearcomp\n  nbits=8 bitpos=low end\n";
    match parse_battery(text) {
        Err(Error::BatteryFile { line, reason }) => {
            assert_eq!(line, 3);
            assert_eq!(reason, "Invalid nbits value");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        load_battery(temp_path("does-not-exist.cfg")),
        Err(Error::Io(_))
    ));
}

#[test]
fn constant_zero_generator_fails_monobit() {
    let gen = find_generator("zero").unwrap();
    let report = run(&monobit_battery(1 << 20), gen.as_ref(), 1, 1);
    let unit = &report.results[0];
    assert_eq!(unit.result.statistic, ((64u64 << 20) as f64).sqrt());
    assert_eq!(unit.result.p_value, 0.0);
    assert_eq!(unit.verdict(), Verdict::Fail);
    assert!(!report.all_passed());
    assert!(report.render(ReportMode::Brief).contains("FAIL"));
}

#[test]
fn stream_cipher_passes_monobit() {
    let gen = find_generator("chacha").unwrap();
    let battery = monobit_battery(1 << 20);
    let typical = (0..10)
        .filter(|&seed| {
            let p = run(&battery, gen.as_ref(), seed, 1).results[0].result.p_value;
            p > 0.01 && p < 0.99
        })
        .count();
    assert!(typical >= 8, "only {typical} of 10 seeds gave a typical p-value");
}

#[test]
fn linear_generator_fails_low_bit_complexity() {
    let battery = parse_battery(MIXED_BATTERY).unwrap();
    let gen = find_generator("lcg69069").unwrap();
    let report = run(&battery, gen.as_ref(), 3, 2);
    let lc_low = &report.results[4];
    assert_eq!(lc_low.name, "lc_low");
    assert_eq!(lc_low.verdict(), Verdict::Fail);
    assert_eq!(report.nbits, 32);
    assert!(report.grade().is_some());
}

#[test]
fn filtered_generator_reports_its_parent() {
    let parent = find_generator("mmix").unwrap();
    let gen = Filtered::new(parent.as_ref(), FilterKind::High32).unwrap();
    let report = run(&monobit_battery(1 << 16), &gen, 4, 1);
    assert_eq!(report.nbits, 32);
    assert_eq!(report.generator, "mmix:high32");
    assert_eq!(report.parent.as_deref(), Some("mmix"));
    assert!(report.render(ReportMode::Full).contains("Parent:        mmix"));
}

#[test]
fn listing_without_generator() {
    let battery = Battery::default_battery();
    let seeds = SeedSource::from_seed(0);
    match run_battery(&battery, None, &seeds, &BatteryOptions::default()).unwrap() {
        RunOutcome::Listing(text) => {
            assert!(text.contains("Battery 'default' summary"));
            assert!(text.contains("matrixrank_4096_low8"));
        }
        RunOutcome::Report(_) => panic!("expected a listing"),
    }
}

#[test]
#[ignore = "runs the express battery, takes about a minute"]
fn express_battery_on_stream_cipher() {
    let battery = Battery::express();
    let gen = find_generator("chacha").unwrap();
    let report = run(&battery, gen.as_ref(), 11, 2);
    assert_eq!(report.results.len(), battery.units.len());
    assert!(report.all_passed(), "{}", report.render(ReportMode::Full));
}
