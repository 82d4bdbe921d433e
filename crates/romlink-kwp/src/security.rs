//! Seed/key derivation for security access

use romlink_core::{ProtocolError, ProtocolResult};

/// Seed and key length in bytes
pub const SEED_LEN: usize = 2;

/// High-nibble substitution table (a permutation of 0x0-0xF)
const NIBBLE_SUBSTITUTION: [u8; 16] = [
    0xA, 0x7, 0x3, 0xD, 0x0, 0x9, 0xF, 0x1, 0x5, 0x2, 0xC, 0x8, 0xE, 0x4, 0x6, 0xB,
];

/// Constant XORed into every low nibble
const LOW_NIBBLE_MASK: u8 = 0x5;

/// Derive the security key for a 2-byte seed
///
/// Each seed byte is transformed independently: the high nibble goes through
/// the substitution table, the low nibble is XORed with `0x5`.
pub fn derive_key(seed: &[u8]) -> ProtocolResult<[u8; SEED_LEN]> {
    if seed.len() != SEED_LEN {
        return Err(ProtocolError::InvalidSeedLength(seed.len()));
    }
    Ok([transform(seed[0]), transform(seed[1])])
}

fn transform(byte: u8) -> u8 {
    let high = NIBBLE_SUBSTITUTION[(byte >> 4) as usize];
    let low = (byte & 0x0F) ^ LOW_NIBBLE_MASK;
    (high << 4) | low
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case([0x00, 0x00], [0xA5, 0xA5])]
    #[case([0xFF, 0xFF], [0xBA, 0xBA])]
    #[case([0xAB, 0xCD], [0xCE, 0xE8])]
    #[case([0x12, 0x34], [0x77, 0xD1])]
    fn test_known_vectors(#[case] seed: [u8; 2], #[case] key: [u8; 2]) {
        assert_eq!(derive_key(&seed).unwrap(), key);
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(3)]
    #[case(4)]
    fn test_rejects_wrong_seed_length(#[case] len: usize) {
        let seed = vec![0x42; len];
        assert!(matches!(
            derive_key(&seed),
            Err(ProtocolError::InvalidSeedLength(n)) if n == len
        ));
    }

    #[test]
    fn test_deterministic() {
        for a in 0..=255u8 {
            let seed = [a, a.rotate_left(3)];
            assert_eq!(derive_key(&seed).unwrap(), derive_key(&seed).unwrap());
        }
    }

    #[test]
    fn test_substitution_is_a_permutation() {
        let mut seen = [false; 16];
        for &v in &NIBBLE_SUBSTITUTION {
            assert!(!seen[v as usize], "0x{:X} mapped twice", v);
            seen[v as usize] = true;
        }
    }

    #[test]
    fn test_transform_is_bijective() {
        let mut seen = [false; 256];
        for b in 0..=255u8 {
            let t = transform(b) as usize;
            assert!(!seen[t]);
            seen[t] = true;
        }
    }
}
