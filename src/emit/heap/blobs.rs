//! `#Blob` heap builder.

use std::collections::HashMap;

use crate::{
    utils::{to_u32, write_compressed_uint},
    Result,
};

/// Builder for the `#Blob` heap.
///
/// Every entry is its length as a compressed integer followed by the payload. Byte-identical
/// payloads share one offset, so two signatures that encode the same collapse into one entry.
#[derive(Debug, Clone)]
pub struct BlobHeapBuilder {
    data: Vec<u8>,
    index: HashMap<Vec<u8>, u32>,
}

impl Default for BlobHeapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobHeapBuilder {
    /// A heap holding only the empty blob
    #[must_use]
    pub fn new() -> Self {
        BlobHeapBuilder {
            data: vec![0],
            index: HashMap::new(),
        }
    }

    /// Add `payload` and return its offset. The empty payload is offset 0.
    ///
    /// # Errors
    /// Returns [`crate::Error::FormatOverflow`] if the payload is longer than a compressed
    /// length can describe or the heap exceeds 4 GiB.
    pub fn add(&mut self, payload: &[u8]) -> Result<u32> {
        if payload.is_empty() {
            return Ok(0);
        }
        if let Some(offset) = self.index.get(payload) {
            return Ok(*offset);
        }

        let offset = to_u32(self.data.len())?;
        write_compressed_uint(to_u32(payload.len())?, &mut self.data)?;
        self.data.extend_from_slice(payload);
        self.index.insert(payload.to_vec(), offset);
        Ok(offset)
    }

    /// Add the low `width` bytes of `value`, little-endian.
    ///
    /// Fixed-width values carry a single length byte; for the widths allowed here that byte is
    /// also their compressed length, so they share entries with equal byte payloads.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `width` is not 1, 2, 4 or 8.
    pub fn add_u64(&mut self, value: u64, width: u8) -> Result<u32> {
        if !matches!(width, 1 | 2 | 4 | 8) {
            return Err(malformed_error!("Invalid blob integer width - {}", width));
        }

        self.add(&value.to_le_bytes()[..width as usize])
    }

    /// Add a 4-byte IEEE float
    ///
    /// # Errors
    /// See [`BlobHeapBuilder::add`].
    pub fn add_f32(&mut self, value: f32) -> Result<u32> {
        self.add(&value.to_le_bytes())
    }

    /// Add an 8-byte IEEE float
    ///
    /// # Errors
    /// See [`BlobHeapBuilder::add`].
    pub fn add_f64(&mut self, value: f64) -> Result<u32> {
        self.add(&value.to_le_bytes())
    }

    /// Add a character as its UTF-16 code unit
    ///
    /// # Errors
    /// Returns [`crate::Error::FormatOverflow`] for characters outside the basic multilingual
    /// plane, which do not fit one code unit.
    pub fn add_char(&mut self, value: char) -> Result<u32> {
        let unit = u16::try_from(u32::from(value)).map_err(|_| crate::Error::FormatOverflow {
            what: "char constant",
            value: u64::from(u32::from(value)),
            max: u64::from(u16::MAX),
        })?;
        self.add(&unit.to_le_bytes())
    }

    /// The offset `payload` was added at, if it was
    #[must_use]
    pub fn offset_of(&self, payload: &[u8]) -> Option<u32> {
        if payload.is_empty() {
            return Some(0);
        }
        self.index.get(payload).copied()
    }

    /// Number of distinct non-empty blobs
    #[must_use]
    pub fn count(&self) -> usize {
        self.index.len()
    }

    /// Heap content so far, unpadded
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup() {
        let mut heap = BlobHeapBuilder::new();
        assert_eq!(heap.add(&[]).unwrap(), 0);

        let field = heap.add(&[0x06, 0x08]).unwrap();
        let method = heap.add(&[0x00, 0x00, 0x01]).unwrap();
        assert_eq!(field, 1);
        assert_eq!(method, 4);
        assert_eq!(heap.add(&[0x06, 0x08]).unwrap(), field);
        assert_eq!(heap.data(), &[0x00, 0x02, 0x06, 0x08, 0x03, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn long_payload_prefix() {
        let mut heap = BlobHeapBuilder::new();
        let offset = heap.add(&[0xAB; 0x80]).unwrap();
        assert_eq!(offset, 1);
        assert_eq!(&heap.data()[1..3], &[0x80, 0x80]);
        assert_eq!(heap.data().len(), 3 + 0x80);
    }

    #[test]
    fn numeric() {
        let mut heap = BlobHeapBuilder::new();
        let int = heap.add_u64(42, 4).unwrap();
        assert_eq!(&heap.data()[int as usize..], &[0x04, 42, 0, 0, 0]);

        // Same bytes as the 4-byte integer 0x3F80_0000
        let float = heap.add_f32(1.0).unwrap();
        assert_eq!(heap.add_u64(0x3F80_0000, 4).unwrap(), float);

        let double = heap.add_f64(1.0).unwrap();
        assert_eq!(heap.data()[double as usize], 8);

        let ch = heap.add_char('A').unwrap();
        assert_eq!(&heap.data()[ch as usize..ch as usize + 3], &[0x02, 0x41, 0x00]);

        assert!(heap.add_u64(1, 3).is_err());
        assert!(heap.add_char('\u{1F600}').is_err());
    }
}
