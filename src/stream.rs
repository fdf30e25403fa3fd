// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Byte oriented view of a generator for the bit level tests.

use crate::generator::GeneratorState;

/// Which bits of every output feed the byte stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UseBits {
    /// Every output is split into bytes, lowest first.
    All,
    /// One byte (bits 7..0) per output, eight outputs per buffer refill.
    Low8,
    /// One bit (bit 0) per output, 64 outputs per buffer refill.
    Low1,
}

/// Infinite byte stream pulled from a borrowed generator state.
/// Buffers at most one 64 bit word, dropped with the stream.
pub struct ByteStream<'a> {
    state: &'a mut GeneratorState,
    mode: UseBits,
    buffer: u64,
    bytes_left: u32,
}

impl<'a> ByteStream<'a> {
    pub fn new(state: &'a mut GeneratorState, mode: UseBits) -> Self {
        ByteStream {
            state,
            mode,
            buffer: 0,
            bytes_left: 0,
        }
    }

    fn refill(&mut self) {
        match self.mode {
            UseBits::All => {
                self.buffer = self.state.next();
                self.bytes_left = self.state.nbits() / 8;
            }
            UseBits::Low8 => {
                for _ in 0..8 {
                    self.buffer = (self.buffer >> 8) | (self.state.next() << 56);
                }
                self.bytes_left = 8;
            }
            UseBits::Low1 => {
                for _ in 0..64 {
                    self.buffer = (self.buffer >> 1) | (self.state.next() << 63);
                }
                self.bytes_left = 8;
            }
        }
    }

    #[inline]
    pub fn next_byte(&mut self) -> u8 {
        if self.bytes_left == 0 {
            self.refill();
        }
        let out = self.buffer as u8;
        self.buffer >>= 8;
        self.bytes_left -= 1;
        out
    }
}

impl Iterator for ByteStream<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        Some(self.next_byte())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GeneratorInstance;

    struct Counter(u64);
    impl GeneratorInstance for Counter {
        fn next(&mut self) -> u64 {
            self.0 += 1;
            self.0
        }
    }

    #[test]
    fn all_bits_split_words_low_byte_first() {
        let mut state = GeneratorState::new(Box::new(Counter(0x0403_0200)), 32);
        let bytes: Vec<u8> = ByteStream::new(&mut state, UseBits::All).take(8).collect();
        assert_eq!(bytes, [0x01, 0x02, 0x03, 0x04, 0x02, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn low8_takes_one_byte_per_output() {
        let mut state = GeneratorState::new(Box::new(Counter(0xab00)), 64);
        let bytes: Vec<u8> = ByteStream::new(&mut state, UseBits::Low8).take(9).collect();
        assert_eq!(bytes, [1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn low1_packs_eight_outputs_per_byte() {
        let mut state = GeneratorState::new(Box::new(Counter(0)), 32);
        // Outputs 1, 2, 3, ... have bit 0 alternating 1, 0, 1, 0.
        let mut stream = ByteStream::new(&mut state, UseBits::Low1);
        for _ in 0..16 {
            assert_eq!(stream.next_byte(), 0b0101_0101);
        }
    }
}
