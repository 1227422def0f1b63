//! Low-level bit read and write utilities for byte slices.
//!
//! Two addressing schemes, selected by [`ByteOrder`]:
//!
//! - [`ByteOrder::BigEndian`] is MSB-first: bit 0 is the high bit of the
//!   first byte, and the value is assembled most-significant bit first.
//! - [`ByteOrder::LittleEndian`] is LSB-first: bit 0 is the low bit of the
//!   first byte, and value bit `i` lives at buffer bit `offset + i`. A
//!   byte-aligned 32-bit little-endian field written with `0x12345678`
//!   stores the bytes `78 56 34 12`.
//!
//! Reads and writes may start at any bit offset and span byte boundaries.
//! Out-of-bounds access never touches memory and is reported as an error;
//! callers translate that into the `ok()`-gated field contract.

use crate::errors::{ReadError, WriteError};
use crate::layout::ByteOrder;

/// Widest single field value, in bits.
pub const MAX_WIDTH: usize = 64;

/// Returns true iff `[bit_offset, bit_offset + width_bits)` lies fully inside
/// a buffer of `len_bytes` bytes.
pub fn in_bounds(len_bytes: usize, bit_offset: u64, width_bits: u64) -> bool {
    bit_offset
        .checked_add(width_bits)
        .is_some_and(|end| end <= len_bytes as u64 * 8)
}

/// Reads `width` bits starting at `bit_offset` as an unsigned value.
pub fn read_bits_at(
    data: &[u8],
    bit_offset: u64,
    width: usize,
    order: ByteOrder,
) -> Result<u64, ReadError> {
    if width == 0 || width > MAX_WIDTH {
        return Err(ReadError::TooManyBits);
    }
    if !in_bounds(data.len(), bit_offset, width as u64) {
        return Err(ReadError::OutOfBounds);
    }

    let mut value = 0u64;
    match order {
        ByteOrder::BigEndian => {
            for i in 0..width as u64 {
                value = (value << 1) | u64::from(bit_at_msb(data, bit_offset + i));
            }
        }
        ByteOrder::LittleEndian => {
            for i in 0..width as u64 {
                value |= u64::from(bit_at_lsb(data, bit_offset + i)) << i;
            }
        }
    }

    Ok(value)
}

/// Writes the low `width` bits of `value` starting at `bit_offset`. A value
/// wider than `width` is truncated to its low `width` bits.
pub fn write_bits_at(
    data: &mut [u8],
    bit_offset: u64,
    width: usize,
    order: ByteOrder,
    value: u64,
) -> Result<(), WriteError> {
    if width == 0 || width > MAX_WIDTH {
        return Err(WriteError::TooManyBits);
    }
    if !in_bounds(data.len(), bit_offset, width as u64) {
        return Err(WriteError::OutOfBounds);
    }

    match order {
        ByteOrder::BigEndian => {
            for i in 0..width as u64 {
                let bit = (value >> (width as u64 - 1 - i)) & 1;
                set_bit_at_msb(data, bit_offset + i, bit as u8);
            }
        }
        ByteOrder::LittleEndian => {
            for i in 0..width as u64 {
                let bit = (value >> i) & 1;
                set_bit_at_lsb(data, bit_offset + i, bit as u8);
            }
        }
    }

    Ok(())
}

/// Sign-extends the low `bits` of `value` to a full `i64`.
pub fn sign_extend(value: u64, bits: usize) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

fn bit_at_msb(data: &[u8], pos: u64) -> u8 {
    (data[(pos / 8) as usize] >> (7 - (pos % 8))) & 1
}

fn bit_at_lsb(data: &[u8], pos: u64) -> u8 {
    (data[(pos / 8) as usize] >> (pos % 8)) & 1
}

fn set_bit_at_msb(data: &mut [u8], pos: u64, bit: u8) {
    let byte = &mut data[(pos / 8) as usize];
    let shift = 7 - (pos % 8);
    *byte = (*byte & !(1 << shift)) | (bit << shift);
}

fn set_bit_at_lsb(data: &mut [u8], pos: u64, bit: u8) {
    let byte = &mut data[(pos / 8) as usize];
    let shift = pos % 8;
    *byte = (*byte & !(1 << shift)) | (bit << shift);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_msb_first() {
        let data = [0b11_000001, 0b10000_101];
        assert_eq!(read_bits_at(&data, 0, 2, ByteOrder::BigEndian).unwrap(), 3);
        assert_eq!(
            read_bits_at(&data, 2, 11, ByteOrder::BigEndian).unwrap(),
            48
        );
        assert_eq!(read_bits_at(&data, 13, 3, ByteOrder::BigEndian).unwrap(), 5);
    }

    #[test]
    fn test_read_lsb_first() {
        // Little-endian u16 0x0201 stored as 01 02.
        let data = [0x01, 0x02];
        assert_eq!(
            read_bits_at(&data, 0, 16, ByteOrder::LittleEndian).unwrap(),
            0x0201
        );
        // Low nibble of the first byte.
        assert_eq!(
            read_bits_at(&data, 0, 4, ByteOrder::LittleEndian).unwrap(),
            0x1
        );
    }

    #[test]
    fn test_read_out_of_bounds() {
        let data = [0xff];
        assert_eq!(
            read_bits_at(&data, 0, 9, ByteOrder::BigEndian).unwrap_err(),
            ReadError::OutOfBounds
        );
        assert_eq!(
            read_bits_at(&data, 1, 8, ByteOrder::BigEndian).unwrap_err(),
            ReadError::OutOfBounds
        );
    }

    #[test]
    fn test_read_more_than_64() {
        let data = [0xff; 16];
        assert_eq!(
            read_bits_at(&data, 0, 65, ByteOrder::BigEndian).unwrap_err(),
            ReadError::TooManyBits
        );
    }

    #[test]
    fn test_write_little_endian_u32() {
        let mut data = [0u8; 4];
        write_bits_at(&mut data, 0, 32, ByteOrder::LittleEndian, 0x12345678).unwrap();
        assert_eq!(data, [0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn test_write_big_endian_u32() {
        let mut data = [0u8; 4];
        write_bits_at(&mut data, 0, 32, ByteOrder::BigEndian, 0x12345678).unwrap();
        assert_eq!(data, [0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn test_write_truncates_wide_value() {
        let mut data = [0u8; 1];
        write_bits_at(&mut data, 0, 4, ByteOrder::BigEndian, 0xAB).unwrap();
        // Only the low 4 bits (0xB) are stored, in the high nibble.
        assert_eq!(data, [0xB0]);
    }

    #[test]
    fn test_write_preserves_neighbors() {
        let mut data = [0xFF, 0xFF];
        write_bits_at(&mut data, 4, 8, ByteOrder::BigEndian, 0).unwrap();
        assert_eq!(data, [0xF0, 0x0F]);
    }

    #[test]
    fn test_write_out_of_bounds_is_refused() {
        let mut data = [0x55];
        assert_eq!(
            write_bits_at(&mut data, 4, 8, ByteOrder::BigEndian, 0xFF).unwrap_err(),
            WriteError::OutOfBounds
        );
        // Refused writes leave the buffer untouched.
        assert_eq!(data, [0x55]);
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0b11111111, 8), -1);
        assert_eq!(sign_extend(0b01111111, 8), 127);
        assert_eq!(sign_extend(0b100, 3), -4);
    }

    #[test]
    fn test_in_bounds() {
        assert!(in_bounds(2, 0, 16));
        assert!(in_bounds(2, 15, 1));
        assert!(!in_bounds(2, 15, 2));
        assert!(!in_bounds(2, u64::MAX, 1));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Write/read inverse law across byte-boundary-crossing offsets
            // and both byte orders.
            #[test]
            fn write_then_read_is_identity(
                offset in 0u64..48,
                width in 1usize..=64,
                value: u64,
                fill: u8,
                big_endian: bool,
            ) {
                let order = if big_endian {
                    ByteOrder::BigEndian
                } else {
                    ByteOrder::LittleEndian
                };
                let mut data = [fill; 16];
                write_bits_at(&mut data, offset, width, order, value).unwrap();
                let read = read_bits_at(&data, offset, width, order).unwrap();
                let expected = if width == 64 { value } else { value & ((1 << width) - 1) };
                prop_assert_eq!(read, expected);
            }

            // Bits outside the written range are never disturbed.
            #[test]
            fn write_touches_only_its_range(
                offset in 0u64..48,
                width in 1usize..=64,
                value: u64,
                fill: u8,
                big_endian: bool,
            ) {
                let order = if big_endian {
                    ByteOrder::BigEndian
                } else {
                    ByteOrder::LittleEndian
                };
                let before = [fill; 16];
                let mut after = before;
                write_bits_at(&mut after, offset, width, order, value).unwrap();
                for pos in 0..(before.len() as u64 * 8) {
                    if pos >= offset && pos < offset + width as u64 {
                        continue;
                    }
                    prop_assert_eq!(
                        bit_at_lsb(&before, pos),
                        bit_at_lsb(&after, pos),
                        "bit {} disturbed", pos
                    );
                }
            }
        }
    }
}
