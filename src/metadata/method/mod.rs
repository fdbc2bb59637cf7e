//! CIL method bodies: headers, protected regions and exception sections.
//!
//! - [`MethodBody`] - a body under construction, with labels and [`ExceptionRegion`]s
//! - [`RawMethodBody`] - a body parsed back from its encoded bytes
//! - [`ExceptionHandler`] - one resolved clause of an exception section
//! - [`MethodBodyFlags`] and [`SectionFlags`] - header and data section flags

mod body;
mod exceptions;
mod region;
mod types;

pub use body::{
    EncodedBody, MethodBody, RawMethodBody, FAT_HEADER_SIZE, MAX_TINY_CODE_SIZE, MAX_TINY_STACK,
};
pub use exceptions::{
    needs_fat_section, read_exception_sections, section_size, write_exception_section,
    ExceptionHandler, ExceptionHandlerFlags, FAT_CLAUSE_SIZE, MAX_TINY_CLAUSES,
    SECTION_HEADER_SIZE, TINY_CLAUSE_SIZE,
};
pub use region::{
    CodeRegion, ExceptionRegion, Handler, HandlerKind, Label, LabelMap, ResolvedRange,
};
pub use types::*;
