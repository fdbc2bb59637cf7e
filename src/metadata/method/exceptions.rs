//! Exception handling clauses and the method data sections that carry them.
//!
//! The clauses of a method live in an extra data section after its code, 4-byte aligned. The
//! section comes in two layouts (ECMA-335 II.25.4.5 / II.25.4.6):
//!
//! | Layout | Kind byte | Data size | Clause size | Offsets | Lengths | Flags |
//! |--------|-----------|-----------|-------------|---------|---------|-------|
//! | tiny   | `0x01`    | 1 byte    | 12 bytes    | u16     | u8      | u16   |
//! | fat    | `0x41`    | 3 bytes   | 24 bytes    | u32     | u32     | u32   |
//!
//! All clauses of one section share its layout, so a single clause that does not fit the tiny
//! field widths makes the whole section fat. The clause flags take the width of the section.

use bitflags::bitflags;

use crate::{
    file::io::{read_le_at, write_le},
    metadata::{method::SectionFlags, token::Token},
    utils::to_u32,
    Error::OutOfBounds,
    Result,
};

/// Size of the section header, both layouts
pub const SECTION_HEADER_SIZE: u32 = 4;
/// Size of one clause in a tiny section
pub const TINY_CLAUSE_SIZE: u32 = 12;
/// Size of one clause in a fat section
pub const FAT_CLAUSE_SIZE: u32 = 24;
/// Largest number of clauses a tiny section can hold, its data size is a single byte
pub const MAX_TINY_CLAUSES: usize = 20;

bitflags! {
    /// Exception handler flags defining the type of exception handling clause.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed exception clause.
        ///
        /// The `class_token` field contains the metadata token of the exception type
        /// that this handler catches.
        const EXCEPTION = 0x0000;

        /// An exception filter and handler clause.
        ///
        /// The filter code starts at `filter_offset` and decides whether the handler runs.
        const FILTER = 0x0001;

        /// A finally clause.
        const FINALLY = 0x0002;

        /// A fault clause (finally that executes only on exception).
        const FAULT = 0x0004;
    }
}

/// One resolved exception handling clause, with byte offsets into the instruction stream.
///
/// # Layout in IL
///
/// ```text
/// try {
///     // try_offset -> try_offset + try_length
/// }
/// catch (ExceptionType) {
///     // handler_offset -> handler_offset + handler_length
/// }
/// ```
///
/// # References
/// - ECMA-335 6th Edition, Partition II, Section 25.4.6 - Exception Handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Flags describing the type of exception handler (catch, filter, finally, fault).
    pub flags: ExceptionHandlerFlags,
    /// Offset in bytes of try block from start of method body.
    pub try_offset: u32,
    /// Length in bytes of the try block.
    pub try_length: u32,
    /// Location of the handler for this try block.
    pub handler_offset: u32,
    /// Size of the handler code in bytes.
    pub handler_length: u32,
    /// If flags == EXCEPTION, the type this handler catches.
    pub class_token: Token,
    /// If flags == FILTER, offset of the filter code.
    pub filter_offset: u32,
}

impl ExceptionHandler {
    /// Returns true if any offset or length of this clause overflows the tiny clause fields.
    #[must_use]
    pub fn is_fat(&self) -> bool {
        self.try_offset > 0xFFFF
            || self.handler_offset > 0xFFFF
            || self.try_length > 0xFF
            || self.handler_length > 0xFF
    }

    /// The value of the last clause field: a class token, a filter offset, or 0.
    #[must_use]
    pub fn class_or_filter(&self) -> u32 {
        if self.flags.contains(ExceptionHandlerFlags::FILTER) {
            self.filter_offset
        } else if self.flags.is_empty() {
            self.class_token.value()
        } else {
            0
        }
    }

    fn from_class_or_filter(mut self, value: u32) -> Self {
        if self.flags.contains(ExceptionHandlerFlags::FILTER) {
            self.filter_offset = value;
        } else if self.flags.is_empty() {
            self.class_token = Token::new(value);
        }
        self
    }
}

/// Returns true if `clauses` must be written as a fat section.
#[must_use]
pub fn needs_fat_section(clauses: &[ExceptionHandler]) -> bool {
    clauses.len() > MAX_TINY_CLAUSES || clauses.iter().any(ExceptionHandler::is_fat)
}

/// The byte size of the section holding `count` clauses in the given layout.
#[must_use]
pub fn section_size(count: usize, fat: bool) -> u64 {
    let clause = if fat { FAT_CLAUSE_SIZE } else { TINY_CLAUSE_SIZE };
    u64::from(SECTION_HEADER_SIZE) + count as u64 * u64::from(clause)
}

/// Append the exception section for `clauses` to `buffer`.
///
/// The caller decides the layout once, usually with [`needs_fat_section`]; a clause that does
/// not fit the chosen layout is an error rather than a silent truncation.
///
/// # Errors
/// Returns [`crate::Error::FormatOverflow`] if the section is too large for its data size
/// field, or [`crate::Error::Malformed`] if a clause does not fit a tiny section.
#[allow(clippy::cast_possible_truncation)] // every narrowing is range checked first
pub fn write_exception_section(
    clauses: &[ExceptionHandler],
    fat: bool,
    buffer: &mut Vec<u8>,
) -> Result<()> {
    let size = section_size(clauses.len(), fat);

    if fat {
        if size > 0x00FF_FFFF {
            return Err(crate::Error::FormatOverflow {
                what: "fat exception section size",
                value: size,
                max: 0x00FF_FFFF,
            });
        }

        let kind = (SectionFlags::EHTABLE | SectionFlags::FAT_FORMAT).bits();
        write_le::<u32>(buffer, u32::from(kind) | ((size as u32) << 8));

        for clause in clauses {
            write_le::<u32>(buffer, u32::from(clause.flags.bits()));
            write_le::<u32>(buffer, clause.try_offset);
            write_le::<u32>(buffer, clause.try_length);
            write_le::<u32>(buffer, clause.handler_offset);
            write_le::<u32>(buffer, clause.handler_length);
            write_le::<u32>(buffer, clause.class_or_filter());
        }
    } else {
        if clauses.len() > MAX_TINY_CLAUSES {
            return Err(crate::Error::FormatOverflow {
                what: "tiny exception section clauses",
                value: clauses.len() as u64,
                max: MAX_TINY_CLAUSES as u64,
            });
        }

        write_le::<u8>(buffer, SectionFlags::EHTABLE.bits());
        write_le::<u8>(buffer, size as u8);
        write_le::<u16>(buffer, 0);

        for clause in clauses {
            if clause.is_fat() {
                return Err(malformed_error!(
                    "Clause {:?} does not fit a tiny exception section",
                    clause
                ));
            }

            write_le::<u16>(buffer, clause.flags.bits());
            write_le::<u16>(buffer, clause.try_offset as u16);
            write_le::<u8>(buffer, clause.try_length as u8);
            write_le::<u16>(buffer, clause.handler_offset as u16);
            write_le::<u8>(buffer, clause.handler_length as u8);
            write_le::<u32>(buffer, clause.class_or_filter());
        }
    }

    Ok(())
}

/// Parse the exception sections that start at `cursor` (already 4-byte aligned).
///
/// Returns every clause and whether the sections used the fat layout.
///
/// # Errors
/// Returns an error if a section is truncated.
pub fn read_exception_sections(
    data: &[u8],
    mut cursor: usize,
) -> Result<(Vec<ExceptionHandler>, bool)> {
    let mut clauses = Vec::new();
    let mut fat = false;

    loop {
        let start = cursor;
        let header = read_le_at::<u32>(data, &mut cursor)?;
        #[allow(clippy::cast_possible_truncation)]
        let kind = SectionFlags::from_bits_truncate(header as u8);
        if !kind.contains(SectionFlags::EHTABLE) {
            return Err(malformed_error!(
                "Method data section at {} is not an exception table - {:#x}",
                start,
                header
            ));
        }

        if kind.contains(SectionFlags::FAT_FORMAT) {
            fat = true;
            let size = (header >> 8) as usize;
            if size < 4 || start + size > data.len() {
                return Err(OutOfBounds);
            }

            for _ in 0..(size - 4) / FAT_CLAUSE_SIZE as usize {
                #[allow(clippy::cast_possible_truncation)]
                let flags =
                    ExceptionHandlerFlags::from_bits_truncate(read_le_at::<u32>(data, &mut cursor)? as u16);
                let clause = ExceptionHandler {
                    flags,
                    try_offset: read_le_at::<u32>(data, &mut cursor)?,
                    try_length: read_le_at::<u32>(data, &mut cursor)?,
                    handler_offset: read_le_at::<u32>(data, &mut cursor)?,
                    handler_length: read_le_at::<u32>(data, &mut cursor)?,
                    class_token: Token::new(0),
                    filter_offset: 0,
                };
                clauses.push(clause.from_class_or_filter(read_le_at::<u32>(data, &mut cursor)?));
            }
        } else {
            let size = ((header >> 8) & 0xFF) as usize;
            if size < 4 || start + size > data.len() {
                return Err(OutOfBounds);
            }

            for _ in 0..(size - 4) / TINY_CLAUSE_SIZE as usize {
                let clause = ExceptionHandler {
                    flags: ExceptionHandlerFlags::from_bits_truncate(read_le_at::<u16>(
                        data,
                        &mut cursor,
                    )?),
                    try_offset: u32::from(read_le_at::<u16>(data, &mut cursor)?),
                    try_length: u32::from(read_le_at::<u8>(data, &mut cursor)?),
                    handler_offset: u32::from(read_le_at::<u16>(data, &mut cursor)?),
                    handler_length: u32::from(read_le_at::<u8>(data, &mut cursor)?),
                    class_token: Token::new(0),
                    filter_offset: 0,
                };
                clauses.push(clause.from_class_or_filter(read_le_at::<u32>(data, &mut cursor)?));
            }
        }

        if !kind.contains(SectionFlags::MORE_SECTS) {
            break;
        }
        cursor = start + to_u32(cursor - start)?.next_multiple_of(4) as usize;
    }

    Ok((clauses, fat))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catch(try_offset: u32, try_length: u32, handler_length: u32) -> ExceptionHandler {
        ExceptionHandler {
            flags: ExceptionHandlerFlags::EXCEPTION,
            try_offset,
            try_length,
            handler_offset: try_offset + try_length,
            handler_length,
            class_token: Token::new(0x0100_0004),
            filter_offset: 0,
        }
    }

    #[test]
    fn tiny_section() {
        let clauses = vec![catch(0, 10, 6)];
        assert!(!needs_fat_section(&clauses));

        let mut buffer = Vec::new();
        write_exception_section(&clauses, false, &mut buffer).unwrap();
        assert_eq!(buffer.len(), 16);
        assert_eq!(&buffer[..4], &[0x01, 0x10, 0x00, 0x00]);
        // flags, try offset, try length, handler offset, handler length, class token
        assert_eq!(
            &buffer[4..],
            &[0x00, 0x00, 0x00, 0x00, 0x0A, 0x0A, 0x00, 0x06, 0x04, 0x00, 0x00, 0x01]
        );

        let (parsed, fat) = read_exception_sections(&buffer, 0).unwrap();
        assert!(!fat);
        assert_eq!(parsed, clauses);
    }

    #[test]
    fn fat_section() {
        let mut finally = catch(0, 300, 2);
        finally.flags = ExceptionHandlerFlags::FINALLY;
        finally.class_token = Token::new(0);
        let clauses = vec![catch(0, 4, 2), finally];
        assert!(needs_fat_section(&clauses));

        let mut buffer = Vec::new();
        write_exception_section(&clauses, true, &mut buffer).unwrap();
        assert_eq!(buffer.len(), 4 + 2 * 24);
        assert_eq!(&buffer[..4], &[0x41, 0x34, 0x00, 0x00]);

        let (parsed, fat) = read_exception_sections(&buffer, 0).unwrap();
        assert!(fat);
        assert_eq!(parsed, clauses);
    }

    #[test]
    fn fat_clause_in_tiny_section() {
        let mut buffer = Vec::new();
        assert!(write_exception_section(&[catch(0, 256, 1)], false, &mut buffer).is_err());
    }

    #[test]
    fn clause_count_forces_fat() {
        let clauses = vec![catch(0, 1, 1); MAX_TINY_CLAUSES];
        assert!(!needs_fat_section(&clauses));

        let clauses = vec![catch(0, 1, 1); MAX_TINY_CLAUSES + 1];
        assert!(needs_fat_section(&clauses));
    }

    #[test]
    fn filter_clause() {
        let clause = ExceptionHandler {
            flags: ExceptionHandlerFlags::FILTER,
            try_offset: 0,
            try_length: 8,
            handler_offset: 12,
            handler_length: 4,
            class_token: Token::new(0),
            filter_offset: 8,
        };
        assert_eq!(clause.class_or_filter(), 8);

        let mut buffer = Vec::new();
        write_exception_section(&[clause.clone()], false, &mut buffer).unwrap();
        assert_eq!(read_exception_sections(&buffer, 0).unwrap().0, vec![clause]);
    }
}
