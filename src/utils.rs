// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Misc utility functions.

use std::time::Duration;

pub const INV_ROOT2: f64 = 0.7071067811865475;

/// XOR row `b` into row `a`, word by word.
pub fn xor_in_place(a: &mut [u64], b: &[u64]) {
    for (b1, b2) in a.iter_mut().zip(b.iter()) {
        *b1 ^= *b2;
    }
}

/// Format a number of bytes into a pretty String.
/// e.g. 1048576 is 1 MiB
pub fn format_byte_count(num_bytes: usize) -> String {
    // 2**30 = 1073741824
    if num_bytes > 1073741824 {
        format!("{:.2} GiB", (num_bytes as f64 / 1073741824.0))
    // 2**20 = 1048576
    } else if num_bytes > 1048576 {
        format!("{:.2} MiB", (num_bytes as f64 / 1048576.0))
    // 2**10 = 1024
    } else if num_bytes > 1024 {
        format!("{:.2} KiB", (num_bytes as f64 / 1024.0))
    } else {
        format!("{:.2} B", num_bytes as f64)
    }
}

/// Format a duration as hh:mm:ss, hours are not wrapped at 24.
pub fn format_elapsed_time(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Reverse the lowest `nbits` bits of `value`, higher bits are dropped.
pub fn reverse_low_bits(value: u64, nbits: u32) -> u64 {
    debug_assert!(nbits >= 1 && nbits <= 64);
    value.reverse_bits() >> (64 - nbits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_rows() {
        let mut a = [0b1100u64, u64::MAX];
        xor_in_place(&mut a, &[0b1010, u64::MAX]);
        assert_eq!(a, [0b0110, 0]);
    }

    #[test]
    fn elapsed_time_format() {
        assert_eq!(format_elapsed_time(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_elapsed_time(Duration::from_secs(3725)), "01:02:05");
        assert_eq!(format_elapsed_time(Duration::from_secs(90000)), "25:00:00");
    }

    #[test]
    fn byte_count_format() {
        assert_eq!(format_byte_count(512), "512.00 B");
        assert_eq!(format_byte_count(3 << 20), "3.00 MiB");
    }

    #[test]
    fn reverse_32_bits() {
        assert_eq!(reverse_low_bits(1, 32), 0x8000_0000);
        assert_eq!(reverse_low_bits(0xF0, 8), 0x0F);
    }
}
