//! CRC32 checksums for headers and records
//!
//! Every record and the file header carry a CRC32 (IEEE polynomial)
//! trailer. Every read verifies it; a mismatch is corruption.

use crc32fast::Hasher;

/// Computes a CRC32 checksum over the provided bytes.
///
/// Deterministic: the same input always produces the same output.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Verifies that the computed checksum matches the expected one.
pub fn verify_checksum(data: &[u8], expected: u32) -> bool {
    compute_checksum(data) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_deterministic() {
        let data = b"object payload bytes";
        assert_eq!(compute_checksum(data), compute_checksum(data));
    }

    #[test]
    fn test_single_bit_flip_detected() {
        let mut data = b"record body".to_vec();
        let original = compute_checksum(&data);
        data[4] ^= 0x01;
        assert_ne!(original, compute_checksum(&data));
    }

    #[test]
    fn test_verify_checksum() {
        let data = b"header bytes";
        let checksum = compute_checksum(data);
        assert!(verify_checksum(data, checksum));
        assert!(!verify_checksum(data, checksum.wrapping_add(1)));
    }
}
