use thiserror::Error;

use crate::{emit::Phase, metadata::tables::TableId};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every error is fatal to the build that produced it. The metadata format has no notion of
/// partial validity, so nothing is retried and no partially written output is ever exposed.
///
/// # Error Categories
///
/// ## Format errors (emission)
/// - [`Error::FormatOverflow`] - A value does not fit the widest encoding the format offers
/// - [`Error::DuplicateElement`] - The same element was registered twice
/// - [`Error::UnresolvedReference`] - A row or signature references an element that was never registered
/// - [`Error::MalformedRegion`] - An exception region is inconsistent with its method body
/// - [`Error::PhaseOrder`] - A pipeline step was invoked out of order
///
/// ## Parsing errors (reading emitted metadata back)
/// - [`Error::Malformed`] - Corrupted or invalid structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of a buffer
///
/// ## I/O
/// - [`Error::FileError`] - Filesystem I/O errors while persisting an image
///
/// # Examples
///
/// ```rust
/// use dotemit::{Error, utils::compress_uint};
///
/// match compress_uint(0x2000_0000) {
///     Err(Error::FormatOverflow { value, max, .. }) => {
///         assert_eq!(value, 0x2000_0000);
///         assert_eq!(max, 0x1FFF_FFFF);
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A value exceeds the maximum representable width of its encoding.
    ///
    /// Raised for compressed integers above `0x1FFF_FFFF`, signed compressed integers outside
    /// `-2^28..2^28`, table row counts beyond the 24-bit token space and heap indices that must
    /// be written into a 2-byte column but do not fit.
    #[error("Format overflow - {what}: {value:#x} exceeds {max:#x}")]
    FormatOverflow {
        /// What was being encoded
        what: &'static str,
        /// The offending value
        value: u64,
        /// The largest value the encoding can carry
        max: u64,
    },

    /// The same element was registered into a table twice.
    #[error("Duplicate element in {table:?} - {identity}")]
    DuplicateElement {
        /// The table the element belongs to
        table: TableId,
        /// Identity of the element that was registered twice
        identity: String,
    },

    /// A row or signature references an element that has never been registered.
    #[error("Unresolved reference from {from} to {target}")]
    UnresolvedReference {
        /// Identity of the element holding the reference
        from: String,
        /// Identity (or description) of the missing target
        target: String,
    },

    /// An exception-handling region is inconsistent with its method body.
    ///
    /// Raised for regions without handlers, unmarked labels, inverted ranges and ranges that
    /// extend beyond the instruction stream.
    #[error("Malformed exception region in {method} - {reason}")]
    MalformedRegion {
        /// Identity of the method the region belongs to
        method: String,
        /// What is wrong with the region
        reason: String,
    },

    /// A pipeline step was invoked while the build was in the wrong phase.
    #[error("Pipeline step requires phase {expected}, but the build is in phase {found}")]
    PhaseOrder {
        /// The phase the step requires
        expected: Phase,
        /// The phase the build is in
        found: Phase,
    },

    /// The data is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}
