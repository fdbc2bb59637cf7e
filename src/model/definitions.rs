//! Descriptions of the entities a module defines.
//!
//! These are plain values: build a [`ModuleDefinition`], then hand it to
//! [`crate::model::register_into`]. Flags are the raw ECMA-335 attribute bit masks.

use crate::{
    metadata::{method::MethodBody, signatures::SignatureProperty},
    model::{
        handles::{MethodHandle, MethodSig, TypeHandle, TypeSig},
        values::{ConstantValue, CustomAttribute, SecurityDeclaration},
    },
};

/// The `Assembly` row of a module that is an assembly manifest
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssemblyDefinition {
    /// Simple name
    pub name: String,
    /// Major, minor, build and revision number
    pub version: [u16; 4],
    /// `AssemblyFlags`
    pub flags: u32,
    /// `AssemblyHashAlgorithm`, `0x8004` for SHA-1
    pub hash_algorithm: u32,
    /// Full public key, empty for unsigned assemblies
    pub public_key: Vec<u8>,
    /// Culture, empty for neutral
    pub culture: String,
    /// Assembly level custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
    /// Assembly level permission requests
    pub security: Vec<SecurityDeclaration>,
}

/// An `AssemblyRef` row, registered the first time a type of the assembly is referenced
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssemblyReference {
    /// Simple name
    pub name: String,
    /// Major, minor, build and revision number
    pub version: [u16; 4],
    /// `AssemblyFlags`
    pub flags: u32,
    /// Public key or its token
    pub public_key_or_token: Vec<u8>,
    /// Culture, empty for neutral
    pub culture: String,
}

/// A module and everything it defines
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDefinition {
    /// Module file name
    pub name: String,
    /// Module version id
    pub mvid: uguid::Guid,
    /// The manifest, if this module is an assembly
    pub assembly: Option<AssemblyDefinition>,
    /// Details of referenced assemblies; assemblies referenced only by name get version 0.0.0.0
    pub assembly_references: Vec<AssemblyReference>,
    /// Types, in `TypeDef` row order; `<Module>` is added in front
    pub types: Vec<TypeDefinition>,
    /// Module level custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
    /// Members used only from instruction streams; registered so their tokens exist
    pub references: Vec<MemberReference>,
}

impl ModuleDefinition {
    /// An empty module
    #[must_use]
    pub fn new(name: impl Into<String>, mvid: uguid::Guid) -> Self {
        ModuleDefinition {
            name: name.into(),
            mvid,
            assembly: None,
            assembly_references: Vec::new(),
            types: Vec::new(),
            custom_attributes: Vec::new(),
            references: Vec::new(),
        }
    }

    /// The type named `full_name`
    #[must_use]
    pub fn find_type(&self, full_name: &str) -> Option<&TypeDefinition> {
        self.types.iter().find(|ty| ty.full_name() == full_name)
    }
}

/// A member referenced from code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberReference {
    /// A type, as `TypeRef` or `TypeSpec`
    Type(TypeHandle),
    /// A method, as `MemberRef` or `MethodSpec`
    Method(MethodHandle),
    /// A field of another type, as `MemberRef`
    Field {
        /// Declaring type
        parent: TypeHandle,
        /// Field name
        name: String,
        /// Field type
        field_type: TypeSig,
    },
}

/// A generic parameter of a type or method
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenericParameter {
    /// Name
    pub name: String,
    /// `GenericParamAttributes`
    pub flags: u16,
    /// Base type and interface constraints
    pub constraints: Vec<TypeHandle>,
}

impl GenericParameter {
    /// An unconstrained parameter
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        GenericParameter {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A `ClassLayout` row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassLayout {
    /// Field alignment
    pub packing_size: u16,
    /// Total size in bytes, 0 for computed
    pub class_size: u32,
}

/// A type definition
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypeDefinition {
    /// `TypeAttributes`
    pub flags: u32,
    /// Namespace, empty for nested types
    pub namespace: String,
    /// Name
    pub name: String,
    /// Full name of the enclosing type
    pub enclosing: Option<String>,
    /// Base type, `None` for interfaces and `System.Object`
    pub extends: Option<TypeHandle>,
    /// Implemented interfaces
    pub interfaces: Vec<TypeHandle>,
    /// Generic parameters
    pub generic_parameters: Vec<GenericParameter>,
    /// Explicit layout
    pub layout: Option<ClassLayout>,
    /// Fields, in row order
    pub fields: Vec<FieldDefinition>,
    /// Methods, in row order
    pub methods: Vec<MethodDefinition>,
    /// Properties
    pub properties: Vec<PropertyDefinition>,
    /// Events
    pub events: Vec<EventDefinition>,
    /// Custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
    /// Declarative security
    pub security: Vec<SecurityDeclaration>,
}

impl TypeDefinition {
    /// A type with the given flags and no members
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, flags: u32) -> Self {
        TypeDefinition {
            flags,
            namespace: namespace.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// The same type, nested in `enclosing`
    #[must_use]
    pub fn nested_in(mut self, enclosing: impl Into<String>) -> Self {
        self.enclosing = Some(enclosing.into());
        self
    }

    /// The same type, deriving from `base`
    #[must_use]
    pub fn extends(mut self, base: TypeHandle) -> Self {
        self.extends = Some(base);
        self
    }

    /// The name [`TypeHandle::Defined`] refers to this type by: `Namespace.Name`, `Name`
    /// without a namespace, `Enclosing/Name` for nested types
    #[must_use]
    pub fn full_name(&self) -> String {
        match (&self.enclosing, self.namespace.is_empty()) {
            (Some(enclosing), _) => format!("{enclosing}/{}", self.name),
            (None, true) => self.name.clone(),
            (None, false) => format!("{}.{}", self.namespace, self.name),
        }
    }
}

/// A field definition
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    /// `FieldAttributes`
    pub flags: u16,
    /// Name
    pub name: String,
    /// Type
    pub field_type: TypeSig,
    /// Default value
    pub constant: Option<ConstantValue>,
    /// `NativeType` marshalling descriptor
    pub marshal: Option<Vec<u8>>,
    /// Explicit offset
    pub offset: Option<u32>,
    /// Custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
}

impl FieldDefinition {
    /// A field without constant, marshalling or attributes
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: TypeSig, flags: u16) -> Self {
        FieldDefinition {
            flags,
            name: name.into(),
            field_type,
            constant: None,
            marshal: None,
            offset: None,
            custom_attributes: Vec::new(),
        }
    }
}

/// A parameter of a method; its sequence number is its position plus one
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterDefinition {
    /// `ParamAttributes`
    pub flags: u16,
    /// Name
    pub name: String,
    /// Default value
    pub constant: Option<ConstantValue>,
    /// `NativeType` marshalling descriptor
    pub marshal: Option<Vec<u8>>,
    /// Custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
}

impl ParameterDefinition {
    /// A named parameter
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        ParameterDefinition {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A P/Invoke import, emitted as `ImplMap` with a `ModuleRef`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PInvokeImport {
    /// `PInvokeAttributes`
    pub flags: u16,
    /// Native module name
    pub module: String,
    /// Entry point name
    pub entry_point: String,
}

/// A method definition
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDefinition {
    /// `MethodAttributes`
    pub flags: u16,
    /// `MethodImplAttributes`
    pub impl_flags: u16,
    /// Name
    pub name: String,
    /// Distinguishes overloads; [`MethodHandle::Defined`] refers to the method by it.
    /// Defaults to the name.
    pub overload: Option<String>,
    /// Signature
    pub signature: MethodSig,
    /// Parameter rows, in signature order
    pub parameters: Vec<ParameterDefinition>,
    /// Generic parameters
    pub generic_parameters: Vec<GenericParameter>,
    /// The body, `None` for abstract, runtime or imported methods
    pub body: Option<MethodBody<TypeHandle>>,
    /// P/Invoke import
    pub pinvoke: Option<PInvokeImport>,
    /// Interface or base methods this method explicitly implements
    pub overrides: Vec<MethodHandle>,
    /// Custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
    /// Declarative security
    pub security: Vec<SecurityDeclaration>,
}

impl MethodDefinition {
    /// A body-less method
    #[must_use]
    pub fn new(name: impl Into<String>, signature: MethodSig, flags: u16) -> Self {
        MethodDefinition {
            flags,
            impl_flags: 0,
            name: name.into(),
            overload: None,
            signature,
            parameters: Vec::new(),
            generic_parameters: Vec::new(),
            body: None,
            pinvoke: None,
            overrides: Vec::new(),
            custom_attributes: Vec::new(),
            security: Vec::new(),
        }
    }

    /// The same method with `body`
    #[must_use]
    pub fn with_body(mut self, body: MethodBody<TypeHandle>) -> Self {
        self.body = Some(body);
        self
    }

    /// The key this method is found by within its type
    #[must_use]
    pub fn key(&self) -> &str {
        self.overload.as_deref().unwrap_or(&self.name)
    }
}

/// Accessors of a property or event, by method key within the declaring type
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Accessors {
    /// Getter or `add_` method
    pub first: Option<String>,
    /// Setter or `remove_` method
    pub second: Option<String>,
    /// `fire_` method of an event
    pub fire: Option<String>,
    /// Other associated methods
    pub other: Vec<String>,
}

/// A property definition
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDefinition {
    /// `PropertyAttributes`
    pub flags: u16,
    /// Name
    pub name: String,
    /// Signature
    pub signature: SignatureProperty<TypeHandle>,
    /// Getter (`first`) and setter (`second`)
    pub accessors: Accessors,
    /// Default value
    pub constant: Option<ConstantValue>,
    /// Custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
}

impl PropertyDefinition {
    /// An instance property of type `property_type` without indexer parameters
    #[must_use]
    pub fn new(name: impl Into<String>, property_type: TypeSig) -> Self {
        PropertyDefinition {
            flags: 0,
            name: name.into(),
            signature: SignatureProperty {
                has_this: true,
                modifiers: Vec::new(),
                base: property_type,
                params: Vec::new(),
            },
            accessors: Accessors::default(),
            constant: None,
            custom_attributes: Vec::new(),
        }
    }
}

/// An event definition
#[derive(Debug, Clone, PartialEq)]
pub struct EventDefinition {
    /// `EventAttributes`
    pub flags: u16,
    /// Name
    pub name: String,
    /// Delegate type
    pub event_type: TypeHandle,
    /// `add_` (`first`), `remove_` (`second`) and `fire_` methods
    pub accessors: Accessors,
    /// Custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
}
