//! Payload masking (RFC 6455 Section 5.3).
//!
//! Masking is an XOR with a repeating 4-byte key, so the same call both
//! masks and unmasks.

/// Byte-by-byte XOR masking.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Word-at-a-time XOR masking.
///
/// Produces the same output as [`apply_mask`]; used on the hot decode path
/// for large payloads.
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);

    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ mask_u32;
        chunk.copy_from_slice(&word.to_ne_bytes());
    }

    // Tail is at most 3 bytes and starts on a multiple of 4.
    for (byte, key) in chunks.into_remainder().iter_mut().zip(mask) {
        *byte ^= key;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_reversible() {
        let mask = [0x12, 0x34, 0x56, 0x78];
        let original = b"Hello, WebSocket!".to_vec();
        let mut data = original.clone();

        apply_mask(&mut data, mask);
        assert_ne!(data, original);

        apply_mask(&mut data, mask);
        assert_eq!(data, original);
    }

    #[test]
    fn test_masking_example_from_rfc() {
        let mask = [0x37, 0xfa, 0x21, 0x3d];
        let mut data = b"Hello".to_vec();

        apply_mask(&mut data, mask);
        assert_eq!(data, vec![0x7f, 0x9f, 0x4d, 0x51, 0x58]);
    }

    #[test]
    fn test_masking_empty() {
        let mut data: Vec<u8> = vec![];
        apply_mask_fast(&mut data, [0x12, 0x34, 0x56, 0x78]);
        assert!(data.is_empty());
    }

    #[test]
    fn test_masking_fast_equivalent() {
        let mask = [0xab, 0xcd, 0xef, 0x12];

        for size in [0, 1, 2, 3, 4, 5, 7, 8, 9, 15, 16, 17, 125, 126, 1000, 4097] {
            let original: Vec<u8> = (0..size).map(|i| (i & 0xff) as u8).collect();

            let mut scalar = original.clone();
            let mut fast = original.clone();

            apply_mask(&mut scalar, mask);
            apply_mask_fast(&mut fast, mask);

            assert_eq!(scalar, fast, "mismatch at size {}", size);
        }
    }
}
