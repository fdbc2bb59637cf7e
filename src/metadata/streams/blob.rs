//! Blob Heap (`#Blob`) for .NET Metadata
//!
//! Read access to the `#Blob` heap, which stores signatures, constant values, marshalling
//! descriptors and custom attribute values. Each entry is prefixed with its compressed length.
//!
//! # Reference
//! - [ECMA-335 II.24.2.4](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// '#Blob' points to length-prefixed byte sequences.
///
/// * If the first byte of the entry is `0bbbbbbb`, the next `bbbbbbb` bytes are the data.
/// * If the first two bytes are `10bbbbbb` and `x`, the data is `(bbbbbb << 8) + x` bytes long.
/// * If the first four bytes are `110bbbbb`, `x`, `y` and `z`, the data is
///   `(bbbbb << 24) + (x << 16) + (y << 8) + z` bytes long.
///
/// # Examples
///
/// ```rust
/// use dotemit::metadata::streams::Blob;
/// let data = &[0u8, 0x03, 0x41, 0x42, 0x43];
/// let blob = Blob::from(data)?;
/// assert_eq!(blob.get(1)?, &[0x41, 0x42, 0x43]);
/// # Ok::<(), dotemit::Error>(())
/// ```
pub struct Blob<'a> {
    data: &'a [u8],
}

impl<'a> Blob<'a> {
    /// Create a `Blob` view over heap bytes
    ///
    /// # Errors
    /// Returns an error if the data is empty or doesn't start with the empty blob
    pub fn from(data: &'a [u8]) -> Result<Blob<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Invalid memory for #Blob heap"));
        }

        Ok(Blob { data })
    }

    /// The payload of the entry at `index`, without its length prefix.
    ///
    /// # Errors
    /// Returns an error if the index is out of bounds or if the length prefix cannot be parsed
    pub fn get(&self, index: usize) -> Result<&'a [u8]> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(&self.data[index..]);
        let len = parser.read_compressed_uint()? as usize;
        parser.read_bytes(len)
    }

    /// Returns an iterator over all entries, yielding `(offset, payload)`
    #[must_use]
    pub fn iter(&self) -> BlobIterator<'_> {
        BlobIterator {
            blob: self,
            position: 1,
        }
    }
}

/// Iterator over entries in the `#Blob` heap.
///
/// Stops at the first zero-length entry after offset 0, which is where heap padding starts.
pub struct BlobIterator<'a> {
    blob: &'a Blob<'a>,
    position: usize,
}

impl<'a> Iterator for BlobIterator<'a> {
    type Item = Result<(usize, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.blob.data.len() || self.blob.data[self.position] == 0 {
            return None;
        }

        let start_position = self.position;
        let mut parser = Parser::new(&self.blob.data[self.position..]);
        match parser
            .read_compressed_uint()
            .and_then(|len| parser.read_bytes(len as usize))
        {
            Ok(payload) => {
                self.position += parser.pos();
                Some(Ok((start_position, payload)))
            }
            Err(error) => {
                self.position = self.blob.data.len();
                Some(Err(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        let mut data = vec![0x00];
        data.push(0x03);
        data.extend_from_slice(&[0x0A; 3]);
        data.extend_from_slice(&[0x81, 0x00]);
        data.extend_from_slice(&[0xBA; 256]);
        data.extend_from_slice(&[0x00, 0x00]);

        let blob = Blob::from(&data).unwrap();
        assert_eq!(blob.get(0).unwrap(), &[] as &[u8]);
        assert_eq!(blob.get(1).unwrap(), &[0x0A; 3]);
        assert_eq!(blob.get(5).unwrap().len(), 256);

        let entries: Vec<_> = blob.iter().map(|entry| entry.unwrap().0).collect();
        assert_eq!(entries, vec![1, 5]);
    }

    #[test]
    fn truncated() {
        let data = [0x00, 0x05, 0x01, 0x02];
        let blob = Blob::from(&data).unwrap();
        assert!(blob.get(1).is_err());
        assert!(blob.get(4).is_err());
    }
}
