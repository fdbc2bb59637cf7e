//! User String Heap (`#US`) for .NET Metadata
//!
//! String literals loaded by `ldstr`. Each entry is a compressed byte length, the UTF-16LE
//! code units, and one trailing flag byte that is 1 when any character needs special
//! handling beyond plain ASCII.
//!
//! # Reference
//! - [ECMA-335 II.24.2.4](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use widestring::U16String;

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// Read access to the '#US' heap.
///
/// # Examples
///
/// ```rust
/// use dotemit::metadata::streams::UserStrings;
/// let data = &[0u8, 0x03, 0x41, 0x00, 0x00];
/// let us = UserStrings::from(data)?;
/// assert_eq!(us.get(1)?, "A");
/// # Ok::<(), dotemit::Error>(())
/// ```
pub struct UserStrings<'a> {
    data: &'a [u8],
}

impl<'a> UserStrings<'a> {
    /// Create a `UserStrings` view over heap bytes
    ///
    /// # Errors
    /// Returns an error if the heap is empty or does not start with the empty entry
    pub fn from(data: &'a [u8]) -> Result<UserStrings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(OutOfBounds);
        }

        Ok(UserStrings { data })
    }

    /// Decode the string at `index`.
    ///
    /// # Errors
    /// Returns an error if the index is out of bounds or the entry has an even byte length,
    /// which leaves no room for the flag byte.
    pub fn get(&self, index: usize) -> Result<String> {
        let (units, _) = self.entry(index)?;
        Ok(U16String::from_vec(units).to_string_lossy())
    }

    /// The trailing flag byte of the entry at `index`.
    ///
    /// # Errors
    /// See [`UserStrings::get`].
    pub fn flag(&self, index: usize) -> Result<u8> {
        Ok(self.entry(index)?.1)
    }

    fn entry(&self, index: usize) -> Result<(Vec<u16>, u8)> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(&self.data[index..]);
        let length = parser.read_compressed_uint()? as usize;
        if length % 2 != 1 {
            return Err(malformed_error!(
                "Invalid user string length {} at index - {}",
                length,
                index
            ));
        }

        let bytes = parser.read_bytes(length)?;
        let units = bytes[..length - 1]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Ok((units, bytes[length - 1]))
    }
}
