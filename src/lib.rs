// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Test batteries for pseudorandom number generators.
//!
//! A [`battery::Battery`] of statistical tests is run against a
//! [`generator::Generator`] by the [`dispatcher`], on one or several
//! threads, and summarized by a [`report::BatteryReport`].

pub mod battery;
pub mod battery_file;
pub mod dispatcher;
pub mod error;
pub mod generator;
pub mod histogram;
pub mod report;
pub mod rngs;
pub mod seed;
pub mod stat_tests;
pub mod stats;
pub mod stream;
mod strings;
pub mod utils;

pub use error::{Error, Result};
