/// Test whether bit `bit` of `x` is set.
pub fn test_bit(bit: u32, x: u32) -> bool {
    (x >> bit) & 1 == 1
}

/// Number of zero bytes needed to pad `len` up to a multiple of 8.
pub fn pad8(len: usize) -> usize {
    (8 - len % 8) % 8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_reads_single_bits() {
        assert!(test_bit(0, 1));
        assert!(test_bit(12, 4096));
        assert!(!test_bit(12, 4095));
    }

    #[test]
    fn pad8_rounds_to_eight() {
        assert_eq!(pad8(0), 0);
        assert_eq!(pad8(4), 4);
        assert_eq!(pad8(24), 0);
        assert_eq!(pad8(36), 4);
    }
}
