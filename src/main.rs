// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Command line front end: runs a test battery against a built-in generator.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use log::info;

use acidbath::battery::Battery;
use acidbath::battery_file::load_battery;
use acidbath::dispatcher::{run_battery, BatteryOptions, RunOutcome};
use acidbath::generator::{
    builtin_generators, find_generator, measure_speed, resolve_filter, Generator,
};
use acidbath::report::ReportMode;
use acidbath::seed::SeedSource;
use acidbath::utils::format_byte_count;
use acidbath::{Error, Result};

const EXIT_PASSED: i32 = 0;
const EXIT_FAILED: i32 = 1;
const EXIT_ERROR: i32 = 2;
const EXIT_UNKNOWN: i32 = 3;

/// Outputs summed by the throughput measurement.
const SPEED_NVALUES: usize = 1 << 26;
const REFERENCE_GENERATOR: &str = "chacha";
const NO_GENERATOR: &str = "none";

#[derive(Parser)]
#[command(name = "acidbath")]
#[command(about = "Statistical test batteries for pseudorandom number generators")]
#[command(version)]
struct Cli {
    /// Battery to run: express, brief, default, full or @path for a battery file.
    /// May be omitted with --speed and --self-test.
    #[arg(required_unless_present_any = ["list_generators", "speed", "self_test"])]
    battery: Option<String>,

    /// Generator under test; omitted or "none" lists the battery instead
    generator: Option<String>,

    /// Number of worker threads
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Run only one test, given by name or 1-based index
    #[arg(long)]
    test: Option<String>,

    /// Seed of the seed source; OS entropy if omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Transform the generator output
    #[arg(long, value_parser = ["reverse", "interleave", "high32", "low32"])]
    filter: Option<String>,

    /// Report detail: brief lists only tests that did not pass
    #[arg(long, default_value = "full", value_parser = ["brief", "full"])]
    report: String,

    /// Shuffle the execution order of the tests
    #[arg(long)]
    shuffle: bool,

    /// Also write the report to this file
    #[arg(long)]
    output: Option<PathBuf>,

    /// List all built-in generators
    #[arg(long)]
    list_generators: bool,

    /// Measure generator throughput
    #[arg(long)]
    speed: bool,

    /// Run the generator's internal self-test
    #[arg(long)]
    self_test: bool,
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let thread = std::thread::current();
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                buf.timestamp_seconds(),
                record.level(),
                thread.name().unwrap_or("?"),
                record.args()
            )
        })
        .init();
}

fn list_generators() {
    println!("{:<20} {:>5}  {}", "Name", "Bits", "Description");
    for gen in builtin_generators() {
        println!(
            "{:<20} {:>5}  {}",
            gen.name(),
            gen.output_width(),
            gen.description()
        );
    }
}

fn load_named_battery(name: &str) -> Result<Battery> {
    match name.strip_prefix('@') {
        Some(path) => load_battery(path),
        None => Battery::by_name(name),
    }
}

fn speed_test(gen: &dyn Generator, seeds: &SeedSource) -> Result<i32> {
    let speed = measure_speed(gen, seeds, SPEED_NVALUES);
    let reference = find_generator(REFERENCE_GENERATOR)?;
    let ref_speed = measure_speed(reference.as_ref(), seeds, SPEED_NVALUES);
    println!(
        "{}: {}/s ({:.2}% of {})",
        gen.name(),
        format_byte_count(speed as usize),
        speed / ref_speed * 100.0,
        REFERENCE_GENERATOR
    );
    Ok(EXIT_PASSED)
}

fn self_test(gen: &dyn Generator) -> i32 {
    match gen.self_test() {
        Some(true) => {
            println!("{}: self-test passed", gen.name());
            EXIT_PASSED
        }
        Some(false) => {
            println!("{}: self-test FAILED", gen.name());
            EXIT_FAILED
        }
        None => {
            println!("{}: no self-test available", gen.name());
            EXIT_PASSED
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    if cli.list_generators {
        list_generators();
        return Ok(EXIT_PASSED);
    }
    let seeds = match cli.seed {
        Some(seed) => SeedSource::from_seed(seed),
        None => SeedSource::from_entropy(),
    };
    // A lone positional names the generator for --speed and --self-test.
    let standalone = cli.speed || cli.self_test;
    let gen_name = match (&cli.generator, standalone) {
        (Some(name), _) => Some(name.as_str()),
        (None, true) => cli.battery.as_deref(),
        (None, false) => None,
    };
    let base = match gen_name {
        Some(name) if name != NO_GENERATOR => Some(find_generator(name)?),
        _ => None,
    };
    let filtered = resolve_filter(base.as_deref(), cli.filter.as_deref())?;
    let gen: Option<&dyn Generator> = match (&filtered, &base) {
        (Some(filtered), _) => Some(filtered as &dyn Generator),
        (None, Some(base)) => Some(base.as_ref()),
        (None, None) => None,
    };

    if standalone {
        let Some(gen) = gen else {
            return Err(Error::UnknownGenerator(
                gen_name.unwrap_or(NO_GENERATOR).to_owned(),
            ));
        };
        let mut code = EXIT_PASSED;
        if cli.self_test {
            code = code.max(self_test(gen));
        }
        if cli.speed {
            code = code.max(speed_test(gen, &seeds)?);
        }
        return Ok(code);
    }

    let battery_name = cli
        .battery
        .as_deref()
        .ok_or_else(|| Error::UnknownBattery(String::new()))?;
    let battery = load_named_battery(battery_name)?;
    let options = BatteryOptions {
        threads: cli.threads,
        selection: cli.test,
        report: if cli.report == "brief" {
            ReportMode::Brief
        } else {
            ReportMode::Full
        },
        shuffle: cli.shuffle,
    };
    let (text, code) = match run_battery(&battery, gen, &seeds, &options)? {
        RunOutcome::Listing(text) => (text, EXIT_PASSED),
        RunOutcome::Report(report) => {
            let code = if report.all_passed() {
                EXIT_PASSED
            } else {
                EXIT_FAILED
            };
            (report.render(options.report), code)
        }
    };
    print!("{text}");
    if let Some(path) = &cli.output {
        fs::write(path, &text)?;
        info!("Report written to {}", path.display());
    }
    Ok(code)
}

fn main() {
    let cli = Cli::parse();
    init_logging();
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            match e {
                Error::UnknownBattery(_) | Error::UnknownGenerator(_) | Error::UnknownTest(_) => {
                    EXIT_UNKNOWN
                }
                _ => EXIT_ERROR,
            }
        }
    };
    std::process::exit(code);
}
