//! # dotemit Prelude
//!
//! The types most builds need: the pipeline, the module description model, signature types,
//! method bodies and the reader used to check results.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotemit operations
pub use crate::Error;

/// The result type used throughout dotemit
pub use crate::Result;

// ================================================================================================
// Build Pipeline
// ================================================================================================

/// Registration, the build steps and their output
pub use crate::emit::{
    ElementId, EmitOptions, MetadataBuilder, MetadataImage, PendingSignature, Phase, Value,
};

// ================================================================================================
// Module Descriptions
// ================================================================================================

/// Definitions and the handles that connect them
pub use crate::model::{
    register_into, AssemblyDefinition, AssemblyReference, AttributeArgument, ConstantValue,
    CustomAttribute, EntityMap, EventDefinition, FieldDefinition, MethodDefinition,
    MethodHandle, ModuleDefinition, ParameterDefinition, PropertyDefinition, TypeDefinition,
    TypeHandle,
};

// ================================================================================================
// Signatures and Method Bodies
// ================================================================================================

/// Signature types
pub use crate::metadata::signatures::{
    SignatureField, SignatureLocalVariable, SignatureLocalVariables, SignatureMethod,
    SignatureParameter, SignatureProperty, TypeSignature,
};

/// Method bodies under construction
pub use crate::metadata::method::{CodeRegion, ExceptionRegion, Handler, HandlerKind, Label, MethodBody};

// ================================================================================================
// Tables, Tokens and Read-back
// ================================================================================================

/// Table identifiers and metadata tokens
pub use crate::metadata::{tables::TableId, token::Token};

/// Parsing of emitted images
pub use crate::metadata::reader::MetadataReader;
