//! Mathematical utility functions.

use crate::Result;

/// Converts a `usize` into a `u32`, failing if the value does not fit.
///
/// # Errors
/// Returns [`crate::Error::FormatOverflow`] if `value` exceeds `u32::MAX`.
pub fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| crate::Error::FormatOverflow {
        what: "32-bit size",
        value: value as u64,
        max: u64::from(u32::MAX),
    })
}

/// Rounds `value` up to the next multiple of `alignment` (which must be a power of two).
#[must_use]
pub fn align_to(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Pads `buffer` with `fill` bytes until its length is a multiple of `alignment`.
pub fn pad_to(buffer: &mut Vec<u8>, alignment: usize, fill: u8) {
    while buffer.len() % alignment != 0 {
        buffer.push(fill);
    }
}

/// Number of tag bits needed to distinguish `count` alternatives, `ceil(log2(count))`.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // trailing_zeros of a usize is <= 63
pub fn tag_bits(count: usize) -> u8 {
    if count <= 1 {
        return 0;
    }
    count.next_power_of_two().trailing_zeros() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(0, 4), 0);
        assert_eq!(align_to(1, 4), 4);
        assert_eq!(align_to(4, 4), 4);
        assert_eq!(align_to(13, 8), 16);
    }

    #[test]
    fn test_pad_to() {
        let mut data = vec![1, 2, 3, 4, 5];
        pad_to(&mut data, 4, 0);
        assert_eq!(data, vec![1, 2, 3, 4, 5, 0, 0, 0]);

        pad_to(&mut data, 4, 0);
        assert_eq!(data.len(), 8);
    }

    #[test]
    fn test_tag_bits() {
        assert_eq!(tag_bits(2), 1);
        assert_eq!(tag_bits(3), 2);
        assert_eq!(tag_bits(4), 2);
        assert_eq!(tag_bits(5), 3);
        assert_eq!(tag_bits(22), 5);
    }

    #[test]
    fn test_to_u32_valid() {
        assert_eq!(to_u32(0).unwrap(), 0);
        assert_eq!(to_u32(u32::MAX as usize).unwrap(), u32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_to_u32_overflow() {
        assert!(to_u32(u32::MAX as usize + 1).is_err());
    }
}
