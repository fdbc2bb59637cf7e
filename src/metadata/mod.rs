//! ECMA-335 metadata formats.
//!
//! This module holds the physical building blocks the emitter writes and the reader used to
//! verify its output:
//!
//! - [`root`] - The metadata root (`BSJB`) and its stream directory
//! - [`streams`] - Stream headers and the heap and tables stream readers
//! - [`tables`] - Table identifiers, column schemas, coded indices and width decisions
//! - [`token`] - Metadata tokens
//! - [`signatures`] - Signature types, blob encoders and blob parsers
//! - [`method`] - Method body headers and exception handling sections
//! - [`reader`] - Parsing of a complete metadata image

/// Method body headers, exception regions and their encoding
pub mod method;
/// Parsing of emitted metadata images
pub mod reader;
/// The metadata root
pub mod root;
/// Method, field, property, local and type signatures
pub mod signatures;
/// Metadata streams (heaps and the tables stream)
pub mod streams;
/// Metadata table schemas and width decisions
pub mod tables;
/// Metadata tokens
pub mod token;
