//! # Metadata Table Types Module
//!
//! The building blocks every table shares: table identifiers, coded index kinds, the width
//! decisions derived from final row counts, and the per-table column schema that drives row
//! sizing, writing and reading.
//!
//! ## References
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Partition II, Sections 22 and 24.2.6

mod codedindex;
mod schema;
mod tableid;
mod tableinfo;

pub use codedindex::{CodedIndex, CodedIndexType, CodedIndexTypeIter};
pub use schema::{Column, RawRow};
pub use tableid::{TableId, TableIdIter};
pub use tableinfo::{HeapSizes, TableInfo, TableRowInfo};
