//! Name-keyed references between descriptions.
//!
//! Descriptions refer to types and methods by name rather than by row. Registration resolves
//! every handle into an element of the build, registering `TypeRef`, `AssemblyRef`,
//! `TypeSpec`, `MemberRef` and `MethodSpec` rows the first time an external or constructed
//! entity is seen.

use std::fmt;

use crate::metadata::signatures::{SignatureMethod, TypeSignature};

/// A type signature whose type references are [`TypeHandle`]s
pub type TypeSig = TypeSignature<TypeHandle>;

/// A method signature whose type references are [`TypeHandle`]s
pub type MethodSig = SignatureMethod<TypeHandle>;

/// A reference to a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeHandle {
    /// A type of this module, by full name (`Namespace.Name`, `Outer/Nested` for nested types)
    Defined(String),
    /// A type of another assembly
    External {
        /// Simple name of the assembly
        assembly: String,
        /// Namespace of the type
        namespace: String,
        /// Name of the type
        name: String,
    },
    /// A constructed type such as a generic instantiation
    Spec(Box<TypeSig>),
}

impl TypeHandle {
    /// A type of this module
    #[must_use]
    pub fn defined(full_name: impl Into<String>) -> Self {
        TypeHandle::Defined(full_name.into())
    }

    /// A type of another assembly
    #[must_use]
    pub fn external(
        assembly: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        TypeHandle::External {
            assembly: assembly.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// A constructed type
    #[must_use]
    pub fn spec(signature: TypeSig) -> Self {
        TypeHandle::Spec(Box::new(signature))
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeHandle::Defined(name) => write!(f, "{name}"),
            TypeHandle::External {
                assembly,
                namespace,
                name,
            } if namespace.is_empty() => write!(f, "[{assembly}]{name}"),
            TypeHandle::External {
                assembly,
                namespace,
                name,
            } => write!(f, "[{assembly}]{namespace}.{name}"),
            TypeHandle::Spec(signature) => write!(f, "{signature:?}"),
        }
    }
}

/// A reference to a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodHandle {
    /// A method of this module, by declaring type and method key
    Defined {
        /// Full name of the declaring type
        declaring_type: String,
        /// Key of the method within its type, see
        /// [`crate::model::MethodDefinition::key`]
        key: String,
    },
    /// A method of another type, emitted as a `MemberRef`
    External {
        /// Type the method is looked up on
        parent: TypeHandle,
        /// Method name
        name: String,
        /// Method signature
        signature: MethodSig,
    },
    /// A generic method instantiation, emitted as a `MethodSpec`
    Instantiated {
        /// The generic method
        method: Box<MethodHandle>,
        /// Generic arguments
        args: Vec<TypeSig>,
    },
}

impl MethodHandle {
    /// A method of this module
    #[must_use]
    pub fn defined(declaring_type: impl Into<String>, key: impl Into<String>) -> Self {
        MethodHandle::Defined {
            declaring_type: declaring_type.into(),
            key: key.into(),
        }
    }

    /// A method of another type
    #[must_use]
    pub fn external(parent: TypeHandle, name: impl Into<String>, signature: MethodSig) -> Self {
        MethodHandle::External {
            parent,
            name: name.into(),
            signature,
        }
    }

    /// An instantiation of this method with `args`
    #[must_use]
    pub fn instantiate(self, args: Vec<TypeSig>) -> Self {
        MethodHandle::Instantiated {
            method: Box::new(self),
            args,
        }
    }
}

impl fmt::Display for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodHandle::Defined {
                declaring_type,
                key,
            } => write!(f, "{declaring_type}::{key}"),
            MethodHandle::External { parent, name, .. } => write!(f, "{parent}::{name}"),
            MethodHandle::Instantiated { method, args } => {
                write!(f, "{method}<{}>", args.len())
            }
        }
    }
}
