// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Implementation of various rngs used as test subjects.
//! All implement the RNG interface and are wrapped into generator
//! descriptors by `generator::NativeGenerator`.

use rand::{RngCore, SeedableRng};

/// General trait for PRNGs
pub trait RNG: Send {
    /// Initialize with specified seed.
    fn new(seed: u64) -> Self
    where
        Self: Sized;
    /// Generate u32 and advance the state one step.
    fn next_u32(&mut self) -> u32;
    /// Generate u64 and advance the state one step.
    /// For generators that dont support full u64 might advance
    /// state more than one step.
    fn next(&mut self) -> u64;
    /// Advance the generator state by the specified amount of steps.
    /// For generators that dont support seek this takes a similar
    /// amount of time to generating (delta) outputs.
    fn advance(&mut self, delta: usize) {
        for _ in 0..delta {
            let _ = self.next();
        }
    }
    /// Reset to inital state, equivalent to repalcing with ::new(seed).
    fn reseed(&mut self, seed: u64);
}

/// ChaCha based generator from the rand crate.
/// Serves as the cryptographically strong reference stream.
pub struct ReferenceRand {
    rng: rand::rngs::StdRng,
}

impl RNG for ReferenceRand {
    fn new(seed: u64) -> Self {
        ReferenceRand {
            rng: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }

    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = rand::rngs::StdRng::seed_from_u64(seed);
    }
}

/// Steam cipher based, add–rotate–XOR PRNG with non linear step.
/// Allows seeking to any position in the output stream.
pub mod stream_nlarx {
    use super::RNG;
    const INITIAL_STATE: u64 = 0;
    const N_ROUNDS: usize = 6;

    #[derive(Debug, Copy, Clone)]
    pub struct StreamNLARXu128 {
        state: u128,
    }

    fn mix_u128(in_state: u128) -> u128 {
        let mut out_state = in_state;
        for _ in 0..N_ROUNDS {
            out_state = out_state.swap_bytes();
            out_state ^= out_state.rotate_left(17);
            if out_state & 1 != 0 {
                out_state = out_state.wrapping_add(out_state.rotate_left(23));
            } else {
                out_state = out_state.wrapping_add(out_state.rotate_left(41));
            }
            if out_state & 2 != 0 {
                out_state = out_state.wrapping_add(out_state.rotate_left(33));
            } else {
                out_state = out_state.wrapping_add(out_state.rotate_left(17));
            }
        }
        out_state
    }

    impl RNG for StreamNLARXu128 {
        fn new(seed: u64) -> StreamNLARXu128 {
            StreamNLARXu128 {
                state: (seed as u128) << 64 | INITIAL_STATE as u128,
            }
        }
        fn advance(&mut self, delta: usize) {
            self.state = (self.state & 0xffffffffffffffff0000000000000000)
                | (self.state.wrapping_add(delta as u128) & 0x0000000000000000ffffffffffffffff);
        }
        fn next(&mut self) -> u64 {
            self.advance(1);
            mix_u128(self.state) as u64
        }

        fn next_u32(&mut self) -> u32 {
            self.advance(1);
            mix_u128(self.state) as u32
        }

        fn reseed(&mut self, seed: u64) {
            self.state = (seed as u128) << 64 | INITIAL_STATE as u128;
        }
    }
    impl StreamNLARXu128 {
        pub fn seek(&mut self, counter: u64) {
            self.state = (self.state & 0xffffffffffffffff0000000000000000) | counter as u128;
        }

        /// Checks that seeking and stepping agree on the output stream.
        pub fn self_test() -> bool {
            let mut stepped = StreamNLARXu128::new(0x1234_5678_9abc_def0);
            let mut seeked = stepped;
            for _ in 0..1000 {
                let _ = stepped.next();
            }
            seeked.seek(999);
            let ok_seek = stepped.next() == seeked.next();
            let mut advanced = StreamNLARXu128::new(0x1234_5678_9abc_def0);
            advanced.advance(1000);
            ok_seek && advanced.next() == stepped.next()
        }
    }
}

// Xorshift PRNGs
pub mod xorshift {
    use super::RNG;
    /// Used instead of an all-zero state, which is a fixed point.
    const ZERO_SEED_REPLACEMENT: u64 = 0x9e3779b97f4a7c15;

    #[derive(Debug, Copy, Clone)]
    pub struct XORShift128 {
        state: [u32; 4],
    }

    fn seed_state(seed: u64) -> [u32; 4] {
        let seed = if seed == 0 {
            ZERO_SEED_REPLACEMENT
        } else {
            seed
        };
        [
            seed as u32,
            (seed >> 32) as u32,
            seed as u32,
            (seed >> 32) as u32,
        ]
    }

    impl RNG for XORShift128 {
        fn new(seed: u64) -> Self {
            XORShift128 {
                state: seed_state(seed),
            }
        }

        fn next_u32(&mut self) -> u32 {
            let mut t: u32 = self.state[3];
            let s: u32 = self.state[0];
            self.state[3] = self.state[2];
            self.state[2] = self.state[1];
            self.state[1] = s;
            t ^= t << 11;
            t ^= t >> 8;
            self.state[0] = t ^ s ^ (s >> 19);
            self.state[0]
        }

        fn next(&mut self) -> u64 {
            let a: u64 = self.next_u32() as u64;
            let b: u64 = self.next_u32() as u64;
            (a << 32) | b
        }

        fn advance(&mut self, delta: usize) {
            for _ in 0..delta {
                let _ = self.next_u32();
            }
        }

        fn reseed(&mut self, seed: u64) {
            self.state = seed_state(seed);
        }
    }
}

// Linear congruential generators
pub mod lcg {
    use super::RNG;
    /// Ill concieved early LCG, that fails the spectral test badly.
    /// Only has output space of 0-2**31-1.
    /// The .next() method uses three RANDU calls to fill the 64 bit output space,
    /// The .next_u32() method uses two RANDU calls.
    /// the .next_small() method returns the reduced original output space.
    #[derive(Debug, Copy, Clone)]
    pub struct Randu {
        state: u32,
    }

    impl RNG for Randu {
        fn new(seed: u64) -> Self {
            // RANDU requires an odd state.
            Randu {
                state: (seed as u32 | 1) & 0x7fffffff,
            }
        }

        fn next_u32(&mut self) -> u32 {
            let a: u32 = self.next_small();
            let b: u32 = self.next_small();
            a << 15 | (b & 0xffff)
        }

        fn next(&mut self) -> u64 {
            let a: u64 = self.next_small() as u64;
            let b: u64 = self.next_small() as u64;
            let c: u64 = self.next_small() as u64;
            (a << 42) | ((b & 0x3fffff) << 20) | (c & 0xfffff)
        }

        fn advance(&mut self, delta: usize) {
            for _ in 0..delta {
                let _ = self.next_small();
            }
        }

        fn reseed(&mut self, seed: u64) {
            *self = Randu::new(seed);
        }
    }
    impl Randu {
        /// Generate a number in the original reduced output space of 0 to 2**31 - 1.
        fn next_small(&mut self) -> u32 {
            self.state = self.state.wrapping_mul(65539) & 0x7fffffff;
            self.state
        }
    }

    /// Marsaglia's 32 bit LCG with multiplier 69069.
    /// Fails birthday spacings and Hamming weight tests quickly.
    #[derive(Debug, Copy, Clone)]
    pub struct Lcg69069 {
        state: u32,
    }

    impl RNG for Lcg69069 {
        fn new(seed: u64) -> Self {
            Lcg69069 {
                state: (seed ^ (seed >> 32)) as u32,
            }
        }

        fn next_u32(&mut self) -> u32 {
            self.state = self.state.wrapping_mul(69069).wrapping_add(12345);
            self.state
        }

        fn next(&mut self) -> u64 {
            let a: u64 = self.next_u32() as u64;
            let b: u64 = self.next_u32() as u64;
            (a << 32) | b
        }

        fn reseed(&mut self, seed: u64) {
            *self = Lcg69069::new(seed);
        }
    }

    /// Originaly designed by Donald Knuth
    #[derive(Debug, Copy, Clone)]
    pub struct Mmix {
        state: u64,
    }

    impl RNG for Mmix {
        fn new(seed: u64) -> Self {
            Mmix { state: seed }
        }

        fn next_u32(&mut self) -> u32 {
            (self.next() >> 32) as u32
        }

        fn next(&mut self) -> u64 {
            self.state = self.state.wrapping_mul(0x5851f42d4c957f2d);
            self.state = self.state.wrapping_add(0x14057b7ef767814f);
            self.state
        }

        fn reseed(&mut self, seed: u64) {
            self.state = seed;
        }
    }

    #[derive(Debug, Copy, Clone)]
    pub struct Lehmer64 {
        state: u128,
    }
    impl RNG for Lehmer64 {
        fn new(seed: u64) -> Self {
            // The state must stay odd for a multiplicative generator.
            Lehmer64 {
                state: (seed as u128) << 64 | seed as u128 | 1,
            }
        }

        fn next_u32(&mut self) -> u32 {
            (self.next() >> 32) as u32
        }

        fn next(&mut self) -> u64 {
            self.state = self.state.wrapping_mul(0xda942042e4dd58b5);
            (self.state >> 64) as u64
        }

        fn reseed(&mut self, seed: u64) {
            *self = Lehmer64::new(seed);
        }
    }
}

/// Degenerate generators for checking that tests actually fail.
pub mod testgens {
    use super::RNG;

    pub struct OnlyOne {}
    impl RNG for OnlyOne {
        fn new(_seed: u64) -> Self {
            OnlyOne {}
        }

        fn next_u32(&mut self) -> u32 {
            u32::MAX
        }

        fn next(&mut self) -> u64 {
            u64::MAX
        }

        fn advance(&mut self, _delta: usize) {}

        fn reseed(&mut self, _seed: u64) {}
    }

    pub struct OnlyZero {}
    impl RNG for OnlyZero {
        fn new(_seed: u64) -> Self {
            OnlyZero {}
        }

        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next(&mut self) -> u64 {
            0
        }

        fn advance(&mut self, _delta: usize) {}

        fn reseed(&mut self, _seed: u64) {}
    }

    pub struct AlternatingBlocks {
        state: u64,
    }
    impl RNG for AlternatingBlocks {
        fn new(_seed: u64) -> Self {
            AlternatingBlocks { state: 0 }
        }

        fn next_u32(&mut self) -> u32 {
            self.next() as u32
        }

        fn next(&mut self) -> u64 {
            self.advance(1);
            self.state
        }

        fn advance(&mut self, delta: usize) {
            if delta & 1 == 1 {
                self.state = !self.state;
            }
        }

        fn reseed(&mut self, _seed: u64) {}
    }

    pub struct AlternatingBytes {}
    impl RNG for AlternatingBytes {
        fn new(_seed: u64) -> Self {
            AlternatingBytes {}
        }

        fn next_u32(&mut self) -> u32 {
            0xff00ff00
        }

        fn next(&mut self) -> u64 {
            0xff00ff00ff00ff00
        }

        fn advance(&mut self, _delta: usize) {}

        fn reseed(&mut self, _seed: u64) {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reseed_restarts_the_stream() {
        let mut r = xorshift::XORShift128::new(42);
        let first: Vec<u64> = (0..8).map(|_| r.next()).collect();
        r.reseed(42);
        let second: Vec<u64> = (0..8).map(|_| r.next()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn xorshift_zero_seed_is_not_stuck() {
        let mut r = xorshift::XORShift128::new(0);
        assert!((0..16).any(|_| r.next() != 0));
    }

    #[test]
    fn stream_nlarx_seek_matches_stepping() {
        assert!(stream_nlarx::StreamNLARXu128::self_test());
    }

    #[test]
    fn randu_stays_in_31_bits() {
        let mut r = lcg::Randu::new(1);
        for _ in 0..1000 {
            let _ = r.next_u32();
        }
        assert!(r.next() != 0);
    }
}
