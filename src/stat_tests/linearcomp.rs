// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Linear complexity test.
//! The Berlekamp-Massey algorithm finds the shortest LFSR producing the
//! sequence of one chosen bit of successive outputs. For a random sequence
//! of m bits the complexity L stays close to m/2 (Rueppel 1986).
//! Catches every generator that is linear over GF(2): LFSRs, xorshift and
//! the lower bits of power of two modulus LCGs.

use log::info;

use super::TestResult;
use crate::generator::GeneratorState;
use crate::stats::{stdnorm_cdf, stdnorm_pvalue};

/// Which bit of every output forms the sequence.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BitPosition {
    Low,
    /// Bit `nbits / 2 - 1`.
    Mid,
    High,
    Index(u32),
}

impl BitPosition {
    /// Parse `low`, `mid`, `high` or a bit index.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "low" => Some(BitPosition::Low),
            "mid" => Some(BitPosition::Mid),
            "high" => Some(BitPosition::High),
            _ => name.parse().ok().map(BitPosition::Index),
        }
    }

    pub fn resolve(self, nbits: u32) -> u32 {
        match self {
            BitPosition::Low => 0,
            BitPosition::Mid => nbits / 2 - 1,
            BitPosition::High => nbits - 1,
            BitPosition::Index(i) => i,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearCompOptions {
    /// Sequence length; the algorithm is quadratic in it.
    pub nbits: usize,
    pub bitpos: BitPosition,
}

/// Linear complexity of the 0/1 sequence `s`.
pub fn berlekamp_massey(s: &[u8]) -> usize {
    let n = s.len();
    if n == 0 {
        return 0;
    }
    // Connection polynomial, its value before the last length change and a
    // scratch copy.
    let mut c = vec![0u8; n];
    let mut b = vec![0u8; n];
    let mut t = vec![0u8; n];
    c[0] = 1;
    b[0] = 1;
    let mut l = 0usize;
    // Position of the last length change, `None` before the first one.
    let mut m: Option<usize> = None;
    for pos in 0..n {
        let d = c[1..=l]
            .iter()
            .zip(s[pos - l..pos].iter().rev())
            .fold(s[pos], |acc, (&ci, &si)| acc ^ (ci & si));
        if d == 0 {
            continue;
        }
        t.copy_from_slice(&c);
        let shift = match m {
            Some(m) => pos - m,
            None => pos + 1,
        };
        for (ci, &bi) in c[shift..].iter_mut().zip(b.iter()) {
            *ci ^= bi;
        }
        if 2 * l <= pos {
            l = pos + 1 - l;
            m = Some(pos);
            std::mem::swap(&mut b, &mut t);
        }
    }
    l
}

/// Expected linear complexity of a random sequence of `m` bits.
pub fn linearcomp_mean(m: usize) -> f64 {
    let parity = (m & 1) as f64;
    m as f64 / 2.0 + (4.0 + parity) / 18.0
}

pub fn linearcomp_test(state: &mut GeneratorState, opts: &LinearCompOptions) -> TestResult {
    let bitpos = opts.bitpos.resolve(state.nbits());
    assert!(
        bitpos < state.nbits(),
        "linear complexity: bit {} does not exist in {}-bit outputs",
        bitpos,
        state.nbits()
    );
    info!("Linear complexity test");
    info!("  nbits = {}; bitpos = {}", opts.nbits, bitpos);
    let s: Vec<u8> = (0..opts.nbits)
        .map(|_| ((state.next() >> bitpos) & 1) as u8)
        .collect();
    let l = berlekamp_massey(&s);
    let mean = linearcomp_mean(opts.nbits);
    let sigma = (86.0f64 / 81.0).sqrt();
    let z = (l as f64 - mean) / sigma;
    // Short complexities are the suspicious ones, so p is the lower tail.
    let result = TestResult::new("linearcomp", l as f64, stdnorm_cdf(z), stdnorm_pvalue(z));
    info!(
        "  L = {}; T = L - m/2 = {}; z = {:.3}; p = {}",
        l,
        l as f64 - opts.nbits as f64 / 2.0,
        z,
        result.p_value
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::native_state;
    use crate::rngs;

    /// Sequence of the LFSR with characteristic polynomial x^17 + x^3 + 1.
    fn lfsr17(len: usize) -> Vec<u8> {
        let mut s = vec![0u8; len];
        s[0] = 1;
        s[5] = 1;
        s[16] = 1;
        for k in 17..len {
            s[k] = s[k - 17] ^ s[k - 14];
        }
        s
    }

    #[test]
    fn recovers_lfsr_length() {
        assert_eq!(berlekamp_massey(&lfsr17(200)), 17);
        assert_eq!(berlekamp_massey(&lfsr17(34)), 17);
    }

    #[test]
    fn trivial_sequences() {
        assert_eq!(berlekamp_massey(&[]), 0);
        assert_eq!(berlekamp_massey(&[0u8; 50]), 0);
        // Zeros followed by a single one need a register as long as the sequence.
        let mut s = vec![0u8; 30];
        s[29] = 1;
        assert_eq!(berlekamp_massey(&s), 30);
        let alternating: Vec<u8> = (0..64).map(|i| (i & 1) as u8).collect();
        assert_eq!(berlekamp_massey(&alternating), 2);
    }

    #[test]
    fn mean_offset_for_both_parities() {
        // (9 + (-1)^(m + 1)) / 36
        assert!((linearcomp_mean(1000) - (500.0 + 8.0 / 36.0)).abs() < 1e-12);
        assert!((linearcomp_mean(1001) - (500.5 + 10.0 / 36.0)).abs() < 1e-12);
    }

    #[test]
    fn bit_positions() {
        assert_eq!(BitPosition::from_name("mid").map(|b| b.resolve(64)), Some(31));
        assert_eq!(BitPosition::from_name("high").map(|b| b.resolve(32)), Some(31));
        assert_eq!(BitPosition::from_name("7"), Some(BitPosition::Index(7)));
        assert_eq!(BitPosition::from_name("middle"), None);
    }

    #[test]
    fn good_generator_stays_near_half_length() {
        let mut state = native_state::<rngs::ReferenceRand>(21, 64);
        let opts = LinearCompOptions {
            nbits: 2000,
            bitpos: BitPosition::High,
        };
        let r = linearcomp_test(&mut state, &opts);
        assert!((r.statistic - 1000.0).abs() < 20.0, "{r:?}");
        assert!((r.p_value + r.complement - 1.0).abs() < 1e-9);
    }

    #[test]
    fn lcg_lowest_bit_fails() {
        // The lowest bit of this LCG alternates.
        let mut state = native_state::<rngs::lcg::Lcg69069>(3, 32);
        let opts = LinearCompOptions {
            nbits: 1000,
            bitpos: BitPosition::Low,
        };
        let r = linearcomp_test(&mut state, &opts);
        assert!(r.statistic <= 2.0);
        assert!(r.p_value < 1e-10);
    }
}
