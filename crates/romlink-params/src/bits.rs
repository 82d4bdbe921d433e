//! Big-endian bit-field extraction

use crate::error::{ParamError, ParamResult};

/// Widest field supported by [`extract_bits`]
pub const MAX_BIT_LENGTH: usize = 32;

/// Extract `bit_length` bits starting at `bit_offset`
///
/// Bit 0 is the most significant bit of `buf[0]`. Fields may straddle any
/// number of byte boundaries.
pub fn extract_bits(buf: &[u8], bit_offset: usize, bit_length: usize) -> ParamResult<u64> {
    if bit_length == 0 || bit_length > MAX_BIT_LENGTH {
        return Err(ParamError::InvalidBitLength { bit_length });
    }

    let bit_end = bit_offset + bit_length;
    if bit_end > buf.len() * 8 {
        return Err(ParamError::BitRangeOutOfBounds {
            bit_offset,
            bit_length,
            buffer_bits: buf.len() * 8,
        });
    }

    let first_byte = bit_offset / 8;
    let last_byte = (bit_end - 1) / 8;

    // At most 5 bytes (32 bits + 7 bits of lead-in), fits in a u64
    let mut acc: u64 = 0;
    for &b in &buf[first_byte..=last_byte] {
        acc = (acc << 8) | u64::from(b);
    }

    let spanned_bits = (last_byte - first_byte + 1) * 8;
    let trailing = spanned_bits - (bit_end - first_byte * 8);
    let mask = (1u64 << bit_length) - 1;

    Ok((acc >> trailing) & mask)
}

/// Two's-complement sign extension of a `bit_length`-wide value
pub fn sign_extend(raw: u64, bit_length: usize) -> i64 {
    let shift = 64 - bit_length as u32;
    ((raw << shift) as i64) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::first_byte(&[0x50, 0x00], 0, 8, 0x50)]
    #[case::whole_word(&[0x12, 0x34], 0, 16, 0x1234)]
    #[case::single_msb(&[0x80], 0, 1, 1)]
    #[case::single_lsb(&[0x01], 7, 1, 1)]
    #[case::inside_second_byte(&[0x00, 0b0001_1100], 11, 3, 0b111)]
    #[case::straddle(&[0b0000_0011, 0b1100_0000], 6, 4, 0b1111)]
    #[case::nibble_straddle(&[0xAB, 0xCD, 0xEF], 4, 12, 0xBCD)]
    #[case::three_bytes(&[0x0F, 0xFF, 0xF0], 4, 16, 0xFFFF)]
    #[case::max_width_unaligned(&[0x01, 0x23, 0x45, 0x67, 0x89], 4, 32, 0x1234_5678)]
    fn test_extract_bits(
        #[case] buf: &[u8],
        #[case] offset: usize,
        #[case] length: usize,
        #[case] expected: u64,
    ) {
        assert_eq!(extract_bits(buf, offset, length).unwrap(), expected);
    }

    #[test]
    fn test_straddle_matches_manual_shift() {
        let buf = [0x5A, 0xC3];
        for offset in 0..=13 {
            let raw = extract_bits(&buf, offset, 3).unwrap();
            let word = u16::from_be_bytes(buf);
            let manual = (word >> (16 - offset - 3)) & 0b111;
            assert_eq!(raw, u64::from(manual), "offset {}", offset);
        }
    }

    #[test]
    fn test_out_of_bounds() {
        assert_eq!(
            extract_bits(&[0xFF], 4, 8),
            Err(ParamError::BitRangeOutOfBounds {
                bit_offset: 4,
                bit_length: 8,
                buffer_bits: 8,
            })
        );
    }

    #[test]
    fn test_invalid_length() {
        assert!(matches!(
            extract_bits(&[0; 8], 0, 0),
            Err(ParamError::InvalidBitLength { bit_length: 0 })
        ));
        assert!(matches!(
            extract_bits(&[0; 8], 0, 33),
            Err(ParamError::InvalidBitLength { bit_length: 33 })
        ));
    }

    #[rstest]
    #[case(0b0111, 4, 7)]
    #[case(0b1000, 4, -8)]
    #[case(0b1111, 4, -1)]
    #[case(0xFF, 8, -1)]
    #[case(0x7F, 8, 127)]
    #[case(0x800, 12, -2048)]
    #[case(0xFFFF_FFFF, 32, -1)]
    fn test_sign_extend(#[case] raw: u64, #[case] len: usize, #[case] expected: i64) {
        assert_eq!(sign_extend(raw, len), expected);
    }
}
