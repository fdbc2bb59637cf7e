//! Metadata tokens: the global address of a table row.
//!
//! A token packs the table kind into its high byte and the 1-based row into the low 24 bits.
//! Tokens are what the PE shell patches into entry points and what IL instructions carry; the
//! emitter hands them out only after the sort phase has fixed every row number.

use std::fmt;

use crate::{metadata::tables::TableId, Error, Result};

/// Largest row number a token can address.
pub const MAX_TOKEN_ROW: u32 = 0x00FF_FFFF;

/// A metadata token, `(table << 24) | row`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Token(pub u32);

impl Token {
    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Builds the token addressing `row` in `table`.
    ///
    /// # Errors
    /// Returns [`Error::FormatOverflow`] if `row` does not fit into 24 bits.
    pub fn from_parts(table: TableId, row: u32) -> Result<Self> {
        if row > MAX_TOKEN_ROW {
            return Err(Error::FormatOverflow {
                what: "token row",
                value: u64::from(row),
                max: u64::from(MAX_TOKEN_ROW),
            });
        }

        Ok(Token((u32::from(table as u8) << 24) | row))
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table byte from the token
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The [`TableId`] this token points into, if the table byte is a known table.
    #[must_use]
    pub fn table_id(&self) -> Option<TableId> {
        TableId::from_id(self.table())
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & MAX_TOKEN_ROW
    }

    /// Returns true if the row part is zero, the "no reference" value of every table column
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.row() == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
