//! Byte-level reading and writing primitives.
//!
//! - [`crate::file::io`] - Endian-aware, bounds-checked reads and width-checked writes of
//!   fixed-size values, including the dynamic 2/4 byte index columns of metadata tables
//! - [`crate::file::parser::Parser`] - Cursor over a byte slice used to read signatures,
//!   method bodies and emitted metadata back

pub mod io;
pub mod parser;

pub use parser::Parser;
