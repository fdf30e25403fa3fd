// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Histogram with bins that are merged (never split) until every bin's
//! expected count is large enough for a chi-square type statistic.

use log::debug;

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Bin {
    /// Observed frequency.
    pub count: u64,
    /// Probability mass under the null hypothesis.
    pub p: f64,
}

#[derive(Debug, Clone)]
pub struct AdaptiveHistogram {
    bins: Vec<Bin>,
}

impl AdaptiveHistogram {
    pub fn from_probabilities(probabilities: impl IntoIterator<Item = f64>) -> Self {
        AdaptiveHistogram {
            bins: probabilities
                .into_iter()
                .map(|p| Bin { count: 0, p })
                .collect(),
        }
    }

    /// Table of all `2^(code_nbits * tuple_size)` tuples of codes, the
    /// probability of a tuple being the product of its codes' probabilities.
    pub fn for_code_tuples(code_to_prob: &[f64], code_nbits: u32, tuple_size: u32) -> Self {
        let code_mask = (1usize << code_nbits) - 1;
        let len = 1usize << (code_nbits * tuple_size);
        Self::from_probabilities((0..len).map(|i| {
            let mut tmp = i;
            let mut p = 1.0;
            for _ in 0..tuple_size {
                p *= code_to_prob[tmp & code_mask];
                tmp >>= code_nbits;
            }
            p
        }))
    }

    #[inline]
    pub fn increment(&mut self, index: usize) {
        self.bins[index].count += 1;
    }

    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn total_count(&self) -> u64 {
        self.bins.iter().map(|b| b.count).sum()
    }

    pub fn total_probability(&self) -> f64 {
        self.bins.iter().map(|b| b.p).sum()
    }

    /// Merge bins whose expected count is below `ei_min` into a neighbour.
    /// A sparse bin joins its right neighbour when that one is less probable
    /// than the left one (or there is no left one), otherwise the left one.
    /// Passes repeat until nothing changes.
    ///
    /// # Panics
    /// If the passes do not converge. Every non final pass removes at least
    /// one bin, so this indicates a broken invariant.
    pub fn merge_sparse_bins(&mut self, ei_min: f64) {
        let total = self.total_count();
        if total == 0 {
            return;
        }
        let p_min = ei_min / total as f64;
        let max_passes = self.bins.len() + 1;
        for _ in 0..max_passes {
            if !self.merge_pass(p_min) {
                return;
            }
        }
        panic!(
            "histogram bin merging did not converge after {max_passes} passes ({} bins left)",
            self.bins.len()
        );
    }

    /// One in place merging pass, returns true if any bin was merged.
    fn merge_pass(&mut self, p_min: f64) -> bool {
        let len = self.bins.len();
        if len <= 1 {
            return false;
        }
        let bins = &mut self.bins;
        let mut merged = false;
        let mut out_len = 0;
        let mut inp = 0;
        while inp < len {
            if bins[inp].p >= p_min {
                bins[out_len] = bins[inp];
                out_len += 1;
                inp += 1;
            } else if inp != len - 1 && (out_len == 0 || bins[out_len - 1].p > bins[inp + 1].p) {
                let right = bins[inp + 1];
                bins[out_len] = Bin {
                    count: bins[inp].count + right.count,
                    p: bins[inp].p + right.p,
                };
                out_len += 1;
                inp += 2;
                merged = true;
            } else if out_len > 0 {
                let sparse = bins[inp];
                bins[out_len - 1].count += sparse.count;
                bins[out_len - 1].p += sparse.p;
                inp += 1;
                merged = true;
            } else {
                // Single remaining bin, nothing to merge with.
                bins[out_len] = bins[inp];
                out_len += 1;
                inp += 1;
            }
        }
        bins.truncate(out_len);
        merged
    }

    /// Merge with a growing threshold until at most `max_bins` remain.
    pub fn reduce(&mut self, ei_min: f64, max_bins: usize) {
        let mut ei_min = ei_min;
        loop {
            self.merge_sparse_bins(ei_min);
            debug!("bins after merging with Ei_min = {ei_min}: {}", self.bins.len());
            if self.bins.len() <= max_bins {
                break;
            }
            ei_min *= 2.0;
        }
    }

    /// Log-likelihood ratio statistic `2 sum O ln(O / E)`, empty bins skipped.
    pub fn g_statistic(&self) -> f64 {
        let total = self.total_count() as f64;
        self.bins
            .iter()
            .filter(|b| b.count > 0)
            .map(|b| {
                let o = b.count as f64;
                2.0 * o * (o / (total * b.p)).ln()
            })
            .sum()
    }
}
