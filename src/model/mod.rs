//! Descriptions of a module and their registration into a build.
//!
//! The types here describe what a module contains: assemblies, types, members, attributes and
//! method bodies. They refer to one another by name through [`TypeHandle`] and [`MethodHandle`].
//! [`register_into`] turns a [`ModuleDefinition`] into registered elements of a
//! [`crate::emit::MetadataBuilder`], which then runs the usual build steps.
//!
//! # Examples
//!
//! ```rust
//! use dotemit::{
//!     emit::EmitOptions,
//!     metadata::signatures::{SignatureMethod, TypeSignature},
//!     model::{MethodDefinition, ModuleDefinition, TypeDefinition},
//! };
//!
//! let mut module = ModuleDefinition::new("App.dll", uguid::guid!("01234567-89ab-cdef-0123-456789abcdef"));
//! let mut program = TypeDefinition::new("App", "Program", 0x0010_0001);
//! program.methods.push(MethodDefinition::new(
//!     "Main",
//!     SignatureMethod::new(TypeSignature::Void, Vec::new()),
//!     0x0096,
//! ));
//! module.types.push(program);
//!
//! let (image, entities) = module.emit(EmitOptions::default())?;
//! let main = entities.method("App.Program", "Main").unwrap();
//! assert_eq!(image.token_of(main).map(|token| token.value()), Some(0x0600_0001));
//! # Ok::<(), dotemit::Error>(())
//! ```

mod definitions;
mod handles;
mod register;
mod values;

pub use definitions::{
    Accessors, AssemblyDefinition, AssemblyReference, ClassLayout, EventDefinition,
    FieldDefinition, GenericParameter, MemberReference, MethodDefinition, ModuleDefinition,
    PInvokeImport, ParameterDefinition, PropertyDefinition, TypeDefinition,
};
pub use handles::{MethodHandle, MethodSig, TypeHandle, TypeSig};
pub use register::{register_into, EntityMap, METHOD_SEMANTICS};
pub use values::{
    AttributeArgument, ConstantValue, CustomAttribute, NamedArgument, SecurityDeclaration,
    SERIALIZATION_TYPE,
};
