//! Cursor-based reader for signature blobs, method bodies and emitted metadata.
//!
//! [`Parser`] wraps a byte slice with a position and offers bounds-checked reads of fixed
//! size little-endian values, compressed integers and compressed `TypeDefOrRef` tokens.

use crate::{
    file::io::{read_le_at, CilIO},
    metadata::token::Token,
    utils::{decompress_int, decompress_uint},
    Error::OutOfBounds,
    Result,
};

/// A generic binary data parser for reading .NET metadata structures.
///
/// The parser maintains an internal position cursor and validates every read against the
/// remaining data.
///
/// # Examples
///
/// ```rust
/// use dotemit::Parser;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x81, 0x00];
/// let mut parser = Parser::new(&data);
///
/// assert_eq!(parser.read_le::<u32>()?, 0x04030201);
/// assert_eq!(parser.read_compressed_uint()?, 0x100);
/// assert!(!parser.has_more_data());
/// # Ok::<(), dotemit::Error>(())
/// ```
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`Parser`] positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there are unread bytes left.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Current position of the cursor.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Move the cursor to `pos`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is past the end of the data.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(OutOfBounds);
        }

        self.position = pos;
        Ok(())
    }

    /// Advance the cursor by `step` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the new position is past the end of the data.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        self.seek(self.position.checked_add(step).ok_or(OutOfBounds)?)
    }

    /// Advance the cursor to the next multiple of `alignment`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the aligned position is past the end.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let aligned = (self.position + alignment - 1) & !(alignment - 1);
        self.seek(aligned)
    }

    /// Peek at the next byte without consuming it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at the end of the data.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data.get(self.position).copied().ok_or(OutOfBounds)
    }

    /// Read a little-endian value of type `T` and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read a compressed unsigned integer (ECMA-335 II.23.2).
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the data is truncated, or
    /// [`crate::Error::Malformed`] for an invalid leading byte.
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let (value, consumed) = decompress_uint(&self.data[self.position..])?;
        self.position += consumed;
        Ok(value)
    }

    /// Read a compressed signed integer (ECMA-335 II.23.2).
    ///
    /// # Errors
    /// See [`Parser::read_compressed_uint`].
    pub fn read_compressed_int(&mut self) -> Result<i32> {
        let (value, consumed) = decompress_int(&self.data[self.position..])?;
        self.position += consumed;
        Ok(value)
    }

    /// Read a compressed `TypeDefOrRefOrSpecEncoded` token (ECMA-335 II.23.2.8).
    ///
    /// | Tag | Table |
    /// |-----|-------|
    /// | 0x0 | TypeDef |
    /// | 0x1 | TypeRef |
    /// | 0x2 | TypeSpec |
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for the reserved tag `0x3`.
    pub fn read_compressed_token(&mut self) -> Result<Token> {
        let compressed_token = self.read_compressed_uint()?;

        let table: u32 = match compressed_token & 0x3 {
            0x0 => 0x0200_0000,
            0x1 => 0x0100_0000,
            0x2 => 0x1B00_0000,
            _ => {
                return Err(malformed_error!(
                    "Invalid compressed token - {}",
                    compressed_token
                ))
            }
        };

        Ok(Token::new(table | (compressed_token >> 2)))
    }

    /// Read `length` raw bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self.position.checked_add(length).ok_or(OutOfBounds)?;
        if end > self.data.len() {
            return Err(OutOfBounds);
        }

        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Read a null-terminated UTF-8 string.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if no terminator is found, or
    /// [`crate::Error::Malformed`] for invalid UTF-8.
    pub fn read_string_utf8(&mut self) -> Result<String> {
        let remaining = &self.data[self.position..];
        let Some(end) = remaining.iter().position(|&b| b == 0) else {
            return Err(OutOfBounds);
        };

        let value = std::str::from_utf8(&remaining[..end])
            .map_err(|_| malformed_error!("Invalid UTF-8 string at {}", self.position))?
            .to_string();
        self.position += end + 1;
        Ok(value)
    }

    /// Number of unread bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }
}
