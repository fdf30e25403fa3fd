// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Runs a battery against one generator, optionally on several threads.
//!
//! Units are assigned to workers round-robin before any worker starts. Every
//! worker owns its own generator instance and runs its queue in order; the
//! results are put back into battery order afterwards, so the report does
//! not depend on which worker finished first.

use std::panic;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use log::{debug, info};
use rand::seq::SliceRandom;

use crate::battery::{Battery, TestUnit};
use crate::error::Result;
use crate::generator::{check_output_width, Generator, GeneratorState};
use crate::report::{render_listing, BatteryReport, ReportMode, UnitResult};
use crate::seed::SeedSource;
use crate::utils::format_elapsed_time;

#[derive(Debug, Clone)]
pub struct BatteryOptions {
    /// Number of worker threads, 1 runs everything on the calling thread.
    pub threads: usize,
    /// Run a single unit, given by name or 1-based index.
    pub selection: Option<String>,
    pub report: ReportMode,
    /// Shuffle the execution order before assigning units to workers.
    pub shuffle: bool,
}

impl Default for BatteryOptions {
    fn default() -> Self {
        BatteryOptions {
            threads: 1,
            selection: None,
            report: ReportMode::Full,
            shuffle: false,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Dispatching,
    Collecting,
    Reported,
}

/// What a battery run produced.
#[derive(Debug)]
pub enum RunOutcome {
    /// No generator was given, only the battery contents.
    Listing(String),
    Report(BatteryReport),
}

pub struct Dispatcher<'a> {
    battery: &'a Battery,
    options: &'a BatteryOptions,
    state: DispatchState,
}

/// Progress line for the `position`-th (0-based) entry of a worker queue.
fn start_message(worker: usize, queue: &[usize], position: usize, name: &str) -> String {
    format!(
        "Thread {}: test #{}: {} ({} of {}) started",
        worker,
        queue[position] + 1,
        name,
        position + 1,
        queue.len()
    )
}

/// Run the units at `queue` one after another on one generator instance.
fn run_queue(
    worker: usize,
    queue: &[usize],
    units: &[TestUnit],
    mut gen: GeneratorState,
) -> Vec<UnitResult> {
    info!("Thread {worker} started");
    let mut results = Vec::with_capacity(queue.len());
    for (k, &index) in queue.iter().enumerate() {
        let unit = &units[index];
        info!("{}", start_message(worker, queue, k, &unit.name));
        let start = Instant::now();
        let result = unit.spec.run(&mut gen);
        let elapsed = start.elapsed();
        info!(
            "Thread {}: test #{}: {} finished in {}",
            worker,
            index + 1,
            unit.name,
            format_elapsed_time(elapsed)
        );
        results.push(UnitResult {
            index,
            name: unit.name.clone(),
            result,
            penalty: unit.spec.penalty(),
            thread: worker,
            elapsed,
        });
    }
    info!("Thread {worker} finished");
    results
}

/// Split `order` round-robin into `nworkers` queues.
pub fn assign_round_robin(order: &[usize], nworkers: usize) -> Vec<Vec<usize>> {
    let mut queues = vec![Vec::new(); nworkers];
    for (k, &index) in order.iter().enumerate() {
        queues[k % nworkers].push(index);
    }
    queues
}

impl<'a> Dispatcher<'a> {
    pub fn new(battery: &'a Battery, options: &'a BatteryOptions) -> Self {
        Dispatcher {
            battery,
            options,
            state: DispatchState::Idle,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    fn transition(&mut self, next: DispatchState) {
        debug!("dispatcher: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Battery positions to run.
    fn selected(&self) -> Result<Vec<usize>> {
        match &self.options.selection {
            Some(selector) => Ok(vec![self.battery.find_unit(selector)?]),
            None => Ok((0..self.battery.units.len()).collect()),
        }
    }

    pub fn run(&mut self, gen: &dyn Generator, seeds: &SeedSource) -> Result<BatteryReport> {
        assert_eq!(self.state, DispatchState::Idle, "a dispatcher runs only once");
        let mut order = self.selected()?;
        check_output_width(gen, seeds)?;
        for &index in &order {
            let unit = &self.battery.units[index];
            unit.spec.check_width(&unit.name, gen.output_width())?;
        }

        self.transition(DispatchState::Dispatching);
        let nworkers = self.options.threads.clamp(1, order.len().max(1));
        // Instances are created before the shuffle so the seeds they get do
        // not depend on it.
        let states: Vec<GeneratorState> = (0..nworkers)
            .map(|_| GeneratorState::from_generator(gen, seeds))
            .collect();
        if self.options.shuffle {
            order.shuffle(&mut seeds.derive_rng("shuffle"));
        }
        let queues = assign_round_robin(&order, nworkers);
        info!(
            "===== Starting '{}' battery: {} tests on {} thread(s) =====",
            self.battery.name,
            order.len(),
            nworkers
        );
        let started = Local::now();
        let timer = Instant::now();
        let units = self.battery.units.as_slice();
        let ntests = order.len();

        let per_worker: Vec<Vec<UnitResult>> = if nworkers == 1 {
            queues
                .iter()
                .zip(states)
                .map(|(queue, state)| run_queue(1, queue, units, state))
                .collect()
        } else {
            thread::scope(|s| -> Result<Vec<Vec<UnitResult>>> {
                let mut handles = Vec::with_capacity(nworkers);
                for (t, (queue, state)) in queues.iter().zip(states).enumerate() {
                    let worker = t + 1;
                    let handle = thread::Builder::new()
                        .name(format!("worker-{worker}"))
                        .spawn_scoped(s, move || run_queue(worker, queue, units, state))?;
                    handles.push(handle);
                }
                Ok(handles
                    .into_iter()
                    .map(|handle| handle.join().unwrap_or_else(|e| panic::resume_unwind(e)))
                    .collect())
            })?
        };

        self.transition(DispatchState::Collecting);
        let mut slots: Vec<Option<UnitResult>> = vec![None; units.len()];
        for result in per_worker.into_iter().flatten() {
            let slot = &mut slots[result.index];
            assert!(slot.is_none(), "test #{} ran twice", result.index + 1);
            *slot = Some(result);
        }
        let results: Vec<UnitResult> = slots.into_iter().flatten().collect();
        assert_eq!(results.len(), ntests, "missing test results");
        let elapsed: Duration = timer.elapsed();

        self.transition(DispatchState::Reported);
        Ok(BatteryReport {
            battery: self.battery.name.clone(),
            generator: gen.name().to_owned(),
            parent: gen.parent().map(|p| p.name().to_owned()),
            nbits: gen.output_width(),
            threads: nworkers,
            started,
            elapsed,
            results,
            seeds: seeds.seed_log(),
        })
    }
}

/// Run `battery` on `gen`, or list it when there is no generator.
pub fn run_battery(
    battery: &Battery,
    gen: Option<&dyn Generator>,
    seeds: &SeedSource,
    options: &BatteryOptions,
) -> Result<RunOutcome> {
    match gen {
        None => Ok(RunOutcome::Listing(render_listing(battery))),
        Some(gen) => {
            let report = Dispatcher::new(battery, options).run(gen, seeds)?;
            Ok(RunOutcome::Report(report))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battery::{RamTier, TestSpec};
    use crate::error::Error;
    use crate::generator::find_generator;
    use crate::stat_tests::freq::MonobitOptions;
    use crate::stat_tests::linearcomp::{BitPosition, LinearCompOptions};

    fn small_battery(n: usize) -> Battery {
        let units = (0..n)
            .map(|i| {
                TestUnit::new(
                    format!("mono{i}"),
                    TestSpec::Monobit(MonobitOptions {
                        nvalues: 1000 + i as u64,
                    }),
                    1,
                    RamTier::Low,
                )
            })
            .collect();
        Battery::new("small", units)
    }

    #[test]
    fn round_robin_assignment() {
        let queues = assign_round_robin(&[0, 1, 2, 3, 4, 5, 6], 3);
        assert_eq!(queues, vec![vec![0, 3, 6], vec![1, 4], vec![2, 5]]);
    }

    #[test]
    fn progress_counts_within_the_worker_queue() {
        let queues = assign_round_robin(&[0, 1, 2, 3, 4, 5, 6], 3);
        assert_eq!(
            start_message(3, &queues[2], 1, "mono5"),
            "Thread 3: test #6: mono5 (2 of 2) started"
        );
        assert_eq!(
            start_message(1, &queues[0], 2, "mono6"),
            "Thread 1: test #7: mono6 (3 of 3) started"
        );
    }

    #[test]
    fn state_transitions() {
        let battery = small_battery(2);
        let options = BatteryOptions::default();
        let mut dispatcher = Dispatcher::new(&battery, &options);
        assert_eq!(dispatcher.state(), DispatchState::Idle);
        let gen = find_generator("chacha").unwrap();
        let report = dispatcher.run(gen.as_ref(), &SeedSource::from_seed(1)).unwrap();
        assert_eq!(dispatcher.state(), DispatchState::Reported);
        assert_eq!(report.results.len(), 2);
    }

    #[test]
    fn threads_keep_battery_order() {
        let battery = small_battery(7);
        let gen = find_generator("chacha").unwrap();
        let options = BatteryOptions {
            threads: 3,
            shuffle: true,
            ..BatteryOptions::default()
        };
        let report = Dispatcher::new(&battery, &options)
            .run(gen.as_ref(), &SeedSource::from_seed(5))
            .unwrap();
        let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["mono0", "mono1", "mono2", "mono3", "mono4", "mono5", "mono6"]);
        assert!(report.results.iter().all(|r| (1..=3).contains(&r.thread)));
        assert_eq!(report.threads, 3);
        // One seed per worker and one for the shuffle.
        assert_eq!(report.seeds.len(), 4);
    }

    #[test]
    fn shuffled_single_thread_run_reports_in_battery_order() {
        let battery = small_battery(9);
        let gen = find_generator("chacha").unwrap();
        let options = BatteryOptions {
            shuffle: true,
            ..BatteryOptions::default()
        };
        let seeds = SeedSource::from_seed(17);
        let report = Dispatcher::new(&battery, &options)
            .run(gen.as_ref(), &seeds)
            .unwrap();
        let indices: Vec<usize> = report.results.iter().map(|r| r.index).collect();
        assert_eq!(indices, (0..9).collect::<Vec<_>>());
        assert!(report.results.iter().all(|r| r.thread == 1));
        assert!(report.seeds.iter().any(|(requester, _)| requester == "shuffle"));
    }

    #[test]
    fn more_threads_than_tests() {
        let battery = small_battery(2);
        let gen = find_generator("mmix").unwrap();
        let options = BatteryOptions {
            threads: 8,
            ..BatteryOptions::default()
        };
        let report = Dispatcher::new(&battery, &options)
            .run(gen.as_ref(), &SeedSource::from_seed(5))
            .unwrap();
        assert_eq!(report.threads, 2);
        assert_eq!(report.results[1].index, 1);
    }

    #[test]
    fn single_unit_selection() {
        let battery = small_battery(4);
        let gen = find_generator("chacha").unwrap();
        let options = BatteryOptions {
            selection: Some("3".to_owned()),
            ..BatteryOptions::default()
        };
        let report = Dispatcher::new(&battery, &options)
            .run(gen.as_ref(), &SeedSource::from_seed(2))
            .unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].name, "mono2");
        assert_eq!(report.results[0].index, 2);

        let options = BatteryOptions {
            selection: Some("mono9".to_owned()),
            ..BatteryOptions::default()
        };
        let err = Dispatcher::new(&battery, &options).run(gen.as_ref(), &SeedSource::from_seed(2));
        assert!(matches!(err, Err(Error::UnknownTest(_))));
    }

    #[test]
    fn width_dependent_options_are_checked_before_dispatch() {
        let battery = Battery::new(
            "lc",
            vec![TestUnit::new(
                "lc48",
                TestSpec::LinearComp(LinearCompOptions {
                    nbits: 1000,
                    bitpos: BitPosition::Index(48),
                }),
                1,
                RamTier::Low,
            )],
        );
        let gen = find_generator("xorshift128").unwrap();
        let options = BatteryOptions::default();
        let mut dispatcher = Dispatcher::new(&battery, &options);
        let err = dispatcher.run(gen.as_ref(), &SeedSource::from_seed(2));
        assert!(matches!(err, Err(Error::InvalidOption { .. })));
        assert_eq!(dispatcher.state(), DispatchState::Idle);
    }

    #[test]
    fn listing_mode_creates_no_instances() {
        let battery = small_battery(3);
        let seeds = SeedSource::from_seed(0);
        match run_battery(&battery, None, &seeds, &BatteryOptions::default()).unwrap() {
            RunOutcome::Listing(text) => {
                assert!(text.contains("mono2"));
                assert!(text.contains("test=monobit_freq nvalues=1002"));
            }
            RunOutcome::Report(_) => panic!("expected a listing"),
        }
        assert!(seeds.seed_log().is_empty());
    }
}
