// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Statistical test algorithms.
//! Every test takes a generator state and its options and returns one
//! [`TestResult`]; nothing is kept between invocations.

pub mod bspace;
pub mod collover;
pub mod extra;
pub mod freq;
pub mod gap;
pub mod hamming;
pub mod linearcomp;
pub mod matrixrank;

/// Outcome of one test run.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub name: String,
    /// Empirical statistic, NaN if the test could not run.
    pub statistic: f64,
    /// Upper tail probability of the statistic under the null hypothesis.
    pub p_value: f64,
    /// 1 - p_value, computed separately to keep precision near 1.
    pub complement: f64,
}

impl TestResult {
    pub fn new(name: impl Into<String>, statistic: f64, p_value: f64, complement: f64) -> Self {
        TestResult {
            name: name.into(),
            statistic,
            p_value,
            complement,
        }
    }

    /// Result for a generator that could not produce the data the test needs.
    pub fn degenerate(name: impl Into<String>) -> Self {
        TestResult::new(name, f64::NAN, 0.0, 1.0)
    }

    /// The more extreme of `p_value` and `complement`.
    pub fn extremeness(&self) -> f64 {
        self.p_value.min(self.complement)
    }
}
