//! Metadata streams, read side.
//!
//! The metadata blob carries five streams, each located by a [`StreamHeader`] in the
//! metadata root:
//!
//! ## String Heaps
//! - **`#Strings`** - UTF-8 identifier strings. The first entry is always the empty string.
//! - **`#US`** - UTF-16 user strings with a length prefix and a trailing flag byte.
//!
//! ## Binary Data
//! - **`#Blob`** - Length-prefixed signatures, constants and attribute values.
//! - **`#GUID`** - A sequence of 128-bit GUIDs, addressed by 1-based index.
//!
//! ## Metadata Tables
//! - **`#~`** - The optimized tables stream: a header with row counts and width flags,
//!   followed by every present table's rows in table-id order.
//!
//! The emitter builds these streams in [`crate::emit`]; the types here parse them back.
//!
//! # References
//!
//! - ECMA-335 6th Edition, Partition II, Section 24.2.2 - Stream Headers
//! - ECMA-335 6th Edition, Partition II, Section 24.2.6 - #~ stream

/// The header of a stream, indicates location + size + name
mod streamheader;
pub use streamheader::{pad_stream, StreamHeader, STREAM_NAMES};

/// The '#Strings' heap implementation
mod strings;
pub use strings::Strings;

/// The '#US' heap implementation
mod userstrings;
pub use userstrings::UserStrings;

/// The '#Blob' heap implementation
mod blob;
pub use blob::{Blob, BlobIterator};

/// The '#GUID' heap implementation
mod guid;
pub use guid::Guid;

/// The '#~' implementation
mod tablesheader;
pub use tablesheader::TablesHeader;
