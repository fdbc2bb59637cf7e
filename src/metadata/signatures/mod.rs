//! Method and type signatures: data types, encoders and the symmetric parser.
//!
//! Signatures encode type information, method parameters, generic instantiations and calling
//! conventions in a compact binary grammar stored in the `#Blob` heap (ECMA-335 II.23.2).
//!
//! # Signature Types
//!
//! - **Method Signatures** - Parameter types, return types, and calling conventions
//! - **Field Signatures** - Field type information and modifiers
//! - **Property Signatures** - Property type and indexer parameters
//! - **LocalVar Signatures** - Local variable types within method bodies
//! - **TypeSpec Signatures** - Generic type instantiations and other constructed types
//! - **MethodSpec Signatures** - Generic method instantiations
//!
//! # Binary Format
//!
//! - Calling conventions and signature kinds are single leading bytes
//! - Counts are compressed unsigned integers
//! - Type references are `TypeDefOrRefOrSpecEncoded` compressed integers
//! - Generic parameters are encoded by position
//!
//! Within a blob every reference uses the compressed encoding. The fixed 2 or 4 byte coded
//! index columns of the tables stream are a different encoding of the same concept, so a
//! signature can be built as soon as row numbers are final, before any index width is known.
//!
//! # Examples
//!
//! ```rust
//! use dotemit::metadata::signatures::{
//!     encode_local_var_signature, parse_local_var_signature, resolve_token, TypeSignature,
//! };
//!
//! let locals_data = &[0x07, 0x02, 0x08, 0x0E]; // 2 locals: int32, string
//! let locals_sig = parse_local_var_signature(locals_data)?;
//! assert_eq!(locals_sig.locals[1].base, TypeSignature::String);
//!
//! assert_eq!(encode_local_var_signature(&locals_sig, &resolve_token)?, locals_data);
//! # Ok::<(), dotemit::Error>(())
//! ```
//!
//! # References
//!
//! - ECMA-335 6th Edition, Partition II, Section 23.2 - Blobs and Signatures

mod encoders;
mod parser;
mod types;

pub use encoders::*;
pub use parser::*;
pub use types::*;

use crate::{metadata::token::Token, Result};

/// Parses a method definition or reference signature blob.
///
/// # Errors
/// Returns an error for an unknown calling convention, a truncated blob or an invalid type.
pub fn parse_method_signature(data: &[u8]) -> Result<SignatureMethod<Token>> {
    SignatureParser::new(data).parse_method_signature()
}

/// Parses a field signature blob (leading byte `0x06`).
///
/// # Errors
/// Returns an error if the blob is malformed.
pub fn parse_field_signature(data: &[u8]) -> Result<SignatureField<Token>> {
    SignatureParser::new(data).parse_field_signature()
}

/// Parses a property signature blob.
///
/// # Errors
/// Returns an error if the blob is malformed.
pub fn parse_property_signature(data: &[u8]) -> Result<SignatureProperty<Token>> {
    SignatureParser::new(data).parse_property_signature()
}

/// Parses the locals blob referenced by a `StandAloneSig` row.
///
/// # Errors
/// Returns an error if the blob is malformed.
pub fn parse_local_var_signature(data: &[u8]) -> Result<SignatureLocalVariables<Token>> {
    SignatureParser::new(data).parse_local_var_signature()
}

/// Parses a `TypeSpec` blob.
///
/// # Errors
/// Returns an error if the blob is malformed.
pub fn parse_type_spec_signature(data: &[u8]) -> Result<SignatureTypeSpec<Token>> {
    SignatureParser::new(data).parse_type_spec_signature()
}

/// Parses a `MethodSpec` instantiation blob (leading byte `0x0A`).
///
/// # Errors
/// Returns an error if the blob is malformed.
pub fn parse_method_spec_signature(data: &[u8]) -> Result<SignatureMethodSpec<Token>> {
    SignatureParser::new(data).parse_method_spec_signature()
}
