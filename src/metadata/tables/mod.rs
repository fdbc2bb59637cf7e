//! Metadata tables (ECMA-335 II.22).
//!
//! Table kinds, coded index kinds, width decisions and the column schema of every table. The
//! emitter and the reader share these definitions, so a row written with a given
//! [`TableInfo`] is read back with exactly the same column widths.

mod types;

pub use types::*;
