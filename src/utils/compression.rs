//! Compressed integer codec (ECMA-335 §II.23.2).
//!
//! Lengths, counts, and coded references inside blobs are stored as variable-width integers.
//! The leading bits of the first byte select the width:
//!
//! | First byte  | Width   | Range                      |
//! |-------------|---------|----------------------------|
//! | `0xxxxxxx`  | 1 byte  | `0x00..=0x7F`              |
//! | `10xxxxxx`  | 2 bytes | `0x80..=0x3FFF`            |
//! | `110xxxxx`  | 4 bytes | `0x4000..=0x1FFF_FFFF`     |
//!
//! All multi-byte forms are big-endian. Signed values are shifted left by one with the sign in
//! bit 0 and then take the unsigned widths, which halves the range of every width
//! (`-64..=63`, `-8192..=8191`, `-2^28..=2^28-1`).

use crate::{Error, Result};

/// Largest value representable as a compressed unsigned integer.
pub const MAX_COMPRESSED_UINT: u32 = 0x1FFF_FFFF;

/// Largest value representable as a compressed signed integer.
pub const MAX_COMPRESSED_INT: i32 = (1 << 28) - 1;

/// Smallest value representable as a compressed signed integer.
pub const MIN_COMPRESSED_INT: i32 = -(1 << 28);

/// Returns the number of bytes the compressed form of `value` occupies.
///
/// Values above [`MAX_COMPRESSED_UINT`] report 4 bytes; encoding them fails.
#[must_use]
pub fn compressed_uint_size(value: usize) -> u64 {
    if value <= 0x7F {
        1
    } else if value <= 0x3FFF {
        2
    } else {
        4
    }
}

/// Appends the compressed form of `value` to `buffer`.
///
/// # Errors
/// Returns [`Error::FormatOverflow`] if `value` exceeds [`MAX_COMPRESSED_UINT`].
#[allow(clippy::cast_possible_truncation)] // every shift is masked to a single byte
pub fn write_compressed_uint(value: u32, buffer: &mut Vec<u8>) -> Result<()> {
    if value <= 0x7F {
        buffer.push(value as u8);
    } else if value <= 0x3FFF {
        buffer.push(0x80 | (value >> 8) as u8);
        buffer.push(value as u8);
    } else if value <= MAX_COMPRESSED_UINT {
        buffer.push(0xC0 | (value >> 24) as u8);
        buffer.push((value >> 16) as u8);
        buffer.push((value >> 8) as u8);
        buffer.push(value as u8);
    } else {
        return Err(Error::FormatOverflow {
            what: "compressed unsigned integer",
            value: u64::from(value),
            max: u64::from(MAX_COMPRESSED_UINT),
        });
    }

    Ok(())
}

/// Appends the compressed form of the signed `value` to `buffer`.
///
/// # Errors
/// Returns [`Error::FormatOverflow`] if `value` is outside
/// [`MIN_COMPRESSED_INT`]`..=`[`MAX_COMPRESSED_INT`].
pub fn write_compressed_int(value: i32, buffer: &mut Vec<u8>) -> Result<()> {
    if !(MIN_COMPRESSED_INT..=MAX_COMPRESSED_INT).contains(&value) {
        return Err(Error::FormatOverflow {
            what: "compressed signed integer",
            value: u64::from(value.unsigned_abs()),
            max: u64::from(MAX_COMPRESSED_INT.unsigned_abs()),
        });
    }

    let encoded = if value >= 0 {
        value.unsigned_abs() << 1
    } else {
        ((value.unsigned_abs() - 1) << 1) | 1
    };

    write_compressed_uint(encoded, buffer)
}

/// Encodes `value` into a fresh 1, 2 or 4 byte sequence.
///
/// # Errors
/// Returns [`Error::FormatOverflow`] if `value` exceeds [`MAX_COMPRESSED_UINT`].
pub fn compress_uint(value: u32) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(4);
    write_compressed_uint(value, &mut buffer)?;
    Ok(buffer)
}

/// Encodes the signed `value` into a fresh 1, 2 or 4 byte sequence.
///
/// # Errors
/// Returns [`Error::FormatOverflow`] if `value` is out of the signed range.
pub fn compress_int(value: i32) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(4);
    write_compressed_int(value, &mut buffer)?;
    Ok(buffer)
}

/// Decodes a compressed unsigned integer from the start of `data`.
///
/// Returns the value and the number of bytes consumed.
///
/// # Errors
/// Returns [`Error::OutOfBounds`] if `data` is shorter than the width announced by its first
/// byte, or [`Error::Malformed`] if the first byte starts with `111`.
pub fn decompress_uint(data: &[u8]) -> Result<(u32, usize)> {
    let Some(&first) = data.first() else {
        return Err(Error::OutOfBounds);
    };

    if first & 0x80 == 0 {
        return Ok((u32::from(first), 1));
    }

    if first & 0xC0 == 0x80 {
        if data.len() < 2 {
            return Err(Error::OutOfBounds);
        }
        let value = (u32::from(first & 0x3F) << 8) | u32::from(data[1]);
        return Ok((value, 2));
    }

    if first & 0xE0 == 0xC0 {
        if data.len() < 4 {
            return Err(Error::OutOfBounds);
        }
        let value = (u32::from(first & 0x1F) << 24)
            | (u32::from(data[1]) << 16)
            | (u32::from(data[2]) << 8)
            | u32::from(data[3]);
        return Ok((value, 4));
    }

    Err(malformed_error!("Invalid compressed uint - {:#04x}", first))
}

/// Decodes a compressed signed integer from the start of `data`.
///
/// # Errors
/// See [`decompress_uint`].
#[allow(clippy::cast_possible_wrap)] // decoded magnitude is at most 2^28
pub fn decompress_int(data: &[u8]) -> Result<(i32, usize)> {
    let (unsigned, consumed) = decompress_uint(data)?;

    let signed = if unsigned & 1 == 0 {
        (unsigned >> 1) as i32
    } else {
        -((unsigned >> 1) as i32) - 1
    };

    Ok((signed, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_width_boundaries() {
        let cases: [(u32, usize); 6] = [
            (0, 1),
            (0x7F, 1),
            (0x80, 2),
            (0x3FFF, 2),
            (0x4000, 4),
            (0x1FFF_FFFF, 4),
        ];

        for (value, width) in cases {
            let encoded = compress_uint(value).unwrap();
            assert_eq!(encoded.len(), width, "width of {value:#x}");
            assert_eq!(compressed_uint_size(value as usize), width as u64);
            assert_eq!(decompress_uint(&encoded).unwrap(), (value, width));
        }
    }

    #[test]
    fn unsigned_known_encodings() {
        // Examples from ECMA-335 II.23.2
        assert_eq!(compress_uint(0x03).unwrap(), vec![0x03]);
        assert_eq!(compress_uint(0x80).unwrap(), vec![0x80, 0x80]);
        assert_eq!(compress_uint(0x2E57).unwrap(), vec![0xAE, 0x57]);
        assert_eq!(compress_uint(0x4000).unwrap(), vec![0xC0, 0x00, 0x40, 0x00]);
        assert_eq!(
            compress_uint(0x1FFF_FFFF).unwrap(),
            vec![0xDF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn unsigned_overflow() {
        let result = compress_uint(0x2000_0000);
        assert!(matches!(result, Err(Error::FormatOverflow { .. })));

        let mut buffer = vec![0xAA];
        assert!(write_compressed_uint(u32::MAX, &mut buffer).is_err());
        assert_eq!(buffer, vec![0xAA]);
    }

    #[test]
    fn signed_width_boundaries() {
        let cases: [(i32, usize); 8] = [
            (0, 1),
            (63, 1),
            (-64, 1),
            (64, 2),
            (-65, 2),
            (8191, 2),
            (-8192, 2),
            (8192, 4),
        ];

        for (value, width) in cases {
            let encoded = compress_int(value).unwrap();
            assert_eq!(encoded.len(), width, "width of {value}");
            assert_eq!(decompress_int(&encoded).unwrap(), (value, width));
        }

        assert_eq!(compress_int(MAX_COMPRESSED_INT).unwrap().len(), 4);
        assert_eq!(compress_int(MIN_COMPRESSED_INT).unwrap().len(), 4);
    }

    #[test]
    fn signed_overflow() {
        assert!(compress_int(MAX_COMPRESSED_INT + 1).is_err());
        assert!(compress_int(MIN_COMPRESSED_INT - 1).is_err());
        assert!(compress_int(i32::MIN).is_err());
    }

    #[test]
    fn signed_sign_bit() {
        assert_eq!(compress_int(1).unwrap(), vec![0x02]);
        assert_eq!(compress_int(-1).unwrap(), vec![0x01]);
        assert_eq!(compress_int(-2).unwrap(), vec![0x03]);
    }

    #[test]
    fn decompress_truncated() {
        assert!(matches!(decompress_uint(&[]), Err(Error::OutOfBounds)));
        assert!(matches!(decompress_uint(&[0x80]), Err(Error::OutOfBounds)));
        assert!(matches!(
            decompress_uint(&[0xC0, 0x00, 0x00]),
            Err(Error::OutOfBounds)
        ));
        assert!(matches!(
            decompress_uint(&[0xE0, 0, 0, 0]),
            Err(Error::Malformed { .. })
        ));
    }
}
