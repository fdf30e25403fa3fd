// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Human readable battery reports.

use std::fmt::Write;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::battery::Battery;
use crate::stat_tests::TestResult;
use crate::strings;
use crate::utils::format_elapsed_time;

/// p-values beyond this distance from 0 or 1 are failures.
const FAIL_ALPHA: f64 = 1e-10;
/// p-values beyond this distance from 0 or 1 are suspicious.
const SUSPICIOUS_ALPHA: f64 = 1e-3;
/// Batteries with fewer tests get no quality grade.
const MIN_GRADED_TESTS: usize = 5;
const MAX_GRADE: f64 = 4.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Suspicious,
    Fail,
}

impl Verdict {
    /// NaN is a failure.
    pub fn from_pvalue(p: f64) -> Self {
        if p.is_nan() || p < FAIL_ALPHA || p > 1.0 - FAIL_ALPHA {
            Verdict::Fail
        } else if p < SUSPICIOUS_ALPHA || p > 1.0 - SUSPICIOUS_ALPHA {
            Verdict::Suspicious
        } else {
            Verdict::Pass
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Pass => strings::PASS_STR,
            Verdict::Suspicious => strings::SUSPICIOUS_STR,
            Verdict::Fail => strings::FAIL_STR,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReportMode {
    /// Only tests that did not pass.
    Brief,
    Full,
}

/// C style `%.2e`: two digit exponent with sign.
fn format_exp(x: f64) -> String {
    let s = format!("{:.2e}", x);
    match s.split_once('e') {
        Some((mantissa, exp)) => match exp.parse::<i32>() {
            Ok(e) => format!("{}e{}{:02}", mantissa, if e < 0 { '-' } else { '+' }, e.abs()),
            Err(_) => s,
        },
        None => s,
    }
}

/// Compact p-value text; `complement` is `1 - p` computed without
/// cancellation and is shown for p-values close to 1.
pub fn format_pvalue(p: f64, complement: f64) -> String {
    if p.is_nan() || complement.is_nan() {
        "NAN".to_owned()
    } else if !(0.0..=1.0).contains(&p) {
        "???".to_owned()
    } else if p < f64::MIN_POSITIVE {
        "0".to_owned()
    } else if (1e-3..=0.999).contains(&p) {
        format!("{:.3}", p)
    } else if p < 1e-3 {
        format_exp(p)
    } else if complement > f64::MIN_POSITIVE {
        format!("1 - {}", format_exp(complement))
    } else {
        "1".to_owned()
    }
}

/// `%g` like formatting of the test statistic.
fn format_statistic(x: f64) -> String {
    if x.is_nan() {
        "NAN".to_owned()
    } else if x == 0.0 || (1e-4..1e6).contains(&x.abs()) {
        let s = format!("{:.6}", x);
        s.trim_end_matches('0').trim_end_matches('.').to_owned()
    } else {
        format_exp(x)
    }
}

pub fn grade_label(grade: f64) -> &'static str {
    strings::GRADE_LABELS
        .iter()
        .find(|(threshold, _)| grade >= *threshold)
        .map_or(strings::GRADE_LOWEST, |&(_, label)| label)
}

/// Result of one test unit as placed in the report.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitResult {
    /// 0-based position in the battery.
    pub index: usize,
    pub name: String,
    pub result: TestResult,
    /// Grade points lost on failure.
    pub penalty: f64,
    /// Worker that ran the test, starting at 1.
    pub thread: usize,
    pub elapsed: Duration,
}

impl UnitResult {
    pub fn verdict(&self) -> Verdict {
        Verdict::from_pvalue(self.result.p_value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub suspicious: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct BatteryReport {
    pub battery: String,
    pub generator: String,
    pub parent: Option<String>,
    pub nbits: u32,
    pub threads: usize,
    pub started: DateTime<Local>,
    pub elapsed: Duration,
    /// In battery order.
    pub results: Vec<UnitResult>,
    pub seeds: Vec<(String, u64)>,
}

impl BatteryReport {
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for r in &self.results {
            match r.verdict() {
                Verdict::Pass => summary.passed += 1,
                Verdict::Suspicious => summary.suspicious += 1,
                Verdict::Fail => summary.failed += 1,
            }
        }
        summary
    }

    /// Quality grade from 0 to 4, `None` for small batteries.
    pub fn grade(&self) -> Option<f64> {
        if self.results.len() < MIN_GRADED_TESTS {
            return None;
        }
        let lost: f64 = self
            .results
            .iter()
            .filter(|r| r.verdict() == Verdict::Fail)
            .map(|r| r.penalty)
            .sum();
        Some((MAX_GRADE - lost).max(0.0))
    }

    pub fn all_passed(&self) -> bool {
        self.summary().failed == 0
    }

    pub fn render(&self, mode: ReportMode) -> String {
        let mut out = String::new();
        let _ = self.write_report(&mut out, mode);
        out
    }

    fn write_report(&self, out: &mut String, mode: ReportMode) -> std::fmt::Result {
        let summary = self.summary();
        writeln!(out, "===== Battery '{}' =====", self.battery)?;
        writeln!(out, "Generator:     {} ({} bits)", self.generator, self.nbits)?;
        if let Some(parent) = &self.parent {
            writeln!(out, "Parent:        {}", parent)?;
        }
        writeln!(out, "Threads:       {}", self.threads)?;
        writeln!(
            out,
            "Started:       {}",
            self.started.format("%Y-%m-%d %H:%M:%S %Z")
        )?;
        if mode == ReportMode::Full {
            for (requester, seed) in &self.seeds {
                writeln!(out, "Seed:          {:#018x} ({})", seed, requester)?;
            }
        }
        writeln!(out)?;
        if mode == ReportMode::Brief && summary.passed == self.results.len() {
            writeln!(out, "{}", strings::REPORT_RULE)?;
            writeln!(out, "----- All tests have been passed successfully -----")?;
            writeln!(out, "{}", strings::REPORT_RULE)?;
        } else {
            writeln!(
                out,
                "  {:>3} {:<20} {:>12} {:>14} {:>14} {:<15} {:>4}",
                "#", "Test name", "xemp", "p", "1 - p", "Interpretation", "Thr#"
            )?;
            writeln!(out, "{}", strings::REPORT_RULE)?;
            for r in &self.results {
                let verdict = r.verdict();
                if mode == ReportMode::Brief && verdict == Verdict::Pass {
                    continue;
                }
                writeln!(
                    out,
                    "  {:>3} {:<20} {:>12} {:>14} {:>14} {:<15} {:>4}",
                    r.index + 1,
                    r.name,
                    format_statistic(r.result.statistic),
                    format_pvalue(r.result.p_value, r.result.complement),
                    format_exp(r.result.complement),
                    verdict.as_str(),
                    r.thread
                )?;
            }
            writeln!(out, "{}", strings::REPORT_RULE)?;
        }
        writeln!(out, "Passed:        {}", summary.passed)?;
        writeln!(out, "Suspicious:    {}", summary.suspicious)?;
        writeln!(out, "Failed:        {}", summary.failed)?;
        if let Some(grade) = self.grade() {
            writeln!(out, "Quality (0-4): {:.2} ({})", grade, grade_label(grade))?;
        }
        writeln!(out, "Elapsed time:  {}", format_elapsed_time(self.elapsed))
    }
}

/// Table of the units of `battery` without running anything.
pub fn render_listing(battery: &Battery) -> String {
    let mut out = format!("===== Battery '{}' summary =====\n", battery.name);
    let _ = writeln!(
        out,
        "  {:>3} {:<20} {:>5} {:>4}  {}",
        "#", "Test name", "Cost", "RAM", "Options"
    );
    let _ = writeln!(out, "{}", strings::REPORT_RULE);
    for (i, unit) in battery.units.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {:>3} {:<20} {:>5} {:>4}  test={} {}",
            i + 1,
            unit.name,
            unit.cost,
            unit.ram,
            unit.spec.kind(),
            unit.spec.describe()
        );
    }
    let _ = writeln!(out, "{}", strings::REPORT_RULE);
    let _ = writeln!(out, "Total cost: {}", battery.total_cost());
    out
}
