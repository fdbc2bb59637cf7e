//! `#US` heap builder.

use widestring::U16String;

use crate::{
    utils::{to_u32, write_compressed_uint},
    Result,
};

/// Builder for the `#US` (user string) heap.
///
/// Each entry is `compressed(units * 2 + 1)`, the UTF-16LE code units, and one flag byte that
/// is 1 when the string needs more than 8-bit handling (ECMA-335 II.24.2.4). Entries are not
/// deduplicated.
#[derive(Debug, Clone)]
pub struct UserStringHeapBuilder {
    data: Vec<u8>,
    count: usize,
}

impl Default for UserStringHeapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The trailing byte of a user string entry.
fn needs_wide_handling(units: &[u16]) -> bool {
    units.iter().any(|unit| {
        *unit > 0xFF || matches!(unit, 0x01..=0x08 | 0x0E..=0x1F | 0x27 | 0x2D | 0x7F)
    })
}

impl UserStringHeapBuilder {
    /// A heap holding only the leading zero byte
    #[must_use]
    pub fn new() -> Self {
        UserStringHeapBuilder {
            data: vec![0],
            count: 0,
        }
    }

    /// Append `value` and return its offset.
    ///
    /// # Errors
    /// Returns [`crate::Error::FormatOverflow`] if the string is too long for a compressed
    /// length.
    pub fn add(&mut self, value: &str) -> Result<u32> {
        let units = U16String::from_str(value);
        self.add_utf16(units.as_slice())
    }

    /// Append raw UTF-16 code units and return their offset.
    ///
    /// # Errors
    /// Returns [`crate::Error::FormatOverflow`] if the string is too long for a compressed
    /// length.
    pub fn add_utf16(&mut self, units: &[u16]) -> Result<u32> {
        let offset = to_u32(self.data.len())?;
        let length = to_u32(units.len())?
            .checked_mul(2)
            .and_then(|bytes| bytes.checked_add(1))
            .ok_or(crate::Error::FormatOverflow {
                what: "user string length",
                value: units.len() as u64,
                max: u64::from(crate::utils::MAX_COMPRESSED_UINT),
            })?;

        write_compressed_uint(length, &mut self.data)?;
        for unit in units {
            self.data.extend_from_slice(&unit.to_le_bytes());
        }
        self.data.push(u8::from(needs_wide_handling(units)));
        self.count += 1;
        Ok(offset)
    }

    /// Number of entries
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Heap content so far, unpadded
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
