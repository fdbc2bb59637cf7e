//! Signature data types (ECMA-335 II.23.2).
//!
//! Every signature type is generic over `R`, the way it refers to a type row. The emitter
//! builds signatures over [`crate::emit::ElementId`] because row numbers are not final until
//! the sort phase has run; the parser produces them over [`Token`]; the descriptor model
//! describes them over [`crate::model::TypeHandle`]. [`TypeSignature::try_map`] and its
//! siblings convert between the three.

use crate::{metadata::token::Token, Result};

/// Element type tags (ECMA-335 II.23.1.16).
#[allow(non_snake_case, missing_docs)]
pub mod ELEMENT_TYPE {
    pub const END: u8 = 0x00;
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0a;
    pub const U8: u8 = 0x0b;
    pub const R4: u8 = 0x0c;
    pub const R8: u8 = 0x0d;
    pub const STRING: u8 = 0x0e;
    /// `PTR CustomMod* Type`
    pub const PTR: u8 = 0x0f;
    /// `BYREF Type`
    pub const BYREF: u8 = 0x10;
    /// `VALUETYPE TypeDefOrRefOrSpecEncoded`
    pub const VALUETYPE: u8 = 0x11;
    /// `CLASS TypeDefOrRefOrSpecEncoded`
    pub const CLASS: u8 = 0x12;
    /// `VAR number`, a type parameter of the enclosing type
    pub const VAR: u8 = 0x13;
    /// `ARRAY Type ArrayShape`
    pub const ARRAY: u8 = 0x14;
    /// `GENERICINST (CLASS | VALUETYPE) TypeDefOrRefOrSpecEncoded GenArgCount Type*`
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    /// `FNPTR MethodDefSig` or `FNPTR MethodRefSig`
    pub const FNPTR: u8 = 0x1b;
    pub const OBJECT: u8 = 0x1c;
    /// `SZARRAY CustomMod* Type`
    pub const SZARRAY: u8 = 0x1d;
    /// `MVAR number`, a type parameter of the enclosing method
    pub const MVAR: u8 = 0x1e;
    pub const CMOD_REQD: u8 = 0x1f;
    pub const CMOD_OPT: u8 = 0x20;
    pub const INTERNAL: u8 = 0x21;
    pub const MODIFIER: u8 = 0x40;
    /// Start of the vararg part of a call site signature
    pub const SENTINEL: u8 = 0x41;
    /// Only valid on locals
    pub const PINNED: u8 = 0x45;
}

/// Bits of the first byte of a method signature (ECMA-335 II.23.2.1 - II.23.2.3).
///
/// The low nibble is the calling convention kind; the high bits are flags.
#[allow(non_snake_case, missing_docs)]
pub mod CALLING_CONVENTION {
    pub const DEFAULT: u8 = 0x00;
    pub const C: u8 = 0x01;
    pub const STDCALL: u8 = 0x02;
    pub const THISCALL: u8 = 0x03;
    pub const FASTCALL: u8 = 0x04;
    pub const VARARG: u8 = 0x05;
    pub const KIND_MASK: u8 = 0x0F;
    pub const GENERIC: u8 = 0x10;
    pub const HASTHIS: u8 = 0x20;
    pub const EXPLICITTHIS: u8 = 0x40;
}

/// First byte of the signature kinds that are not methods.
#[allow(non_snake_case, missing_docs)]
pub mod SIGNATURE_HEADER {
    pub const FIELD: u8 = 0x06;
    pub const LOCAL_SIG: u8 = 0x07;
    pub const PROPERTY: u8 = 0x08;
    pub const GENERIC_INST: u8 = 0x0A;
}

/// One type in a signature blob.
///
/// `R` is whatever names a type row: an element id while building, a token once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSignature<R> {
    /// `void`, only valid as a return type
    Void,
    /// `bool`
    Boolean,
    /// UTF-16 code unit
    Char,
    /// `int8`
    I1,
    /// `unsigned int8`
    U1,
    /// `int16`
    I2,
    /// `unsigned int16`
    U2,
    /// `int32`
    I4,
    /// `unsigned int32`
    U4,
    /// `int64`
    I8,
    /// `unsigned int64`
    U8,
    /// `float32`
    R4,
    /// `float64`
    R8,
    /// `string`
    String,
    /// Unmanaged pointer
    Ptr(SignaturePointer<R>),
    /// Managed reference
    ByRef(Box<TypeSignature<R>>),
    /// `valuetype` reference to a defined, referenced or specified type
    ValueType(R),
    /// `class` reference to a defined, referenced or specified type
    Class(R),
    /// `!n`
    GenericParamType(u32),
    /// Array with an explicit shape
    Array(SignatureArray<R>),
    /// Open generic type applied to its arguments
    GenericInst(Box<TypeSignature<R>>, Vec<TypeSignature<R>>),
    /// `typedref`
    TypedByRef,
    /// `native int`
    I,
    /// `native unsigned int`
    U,
    /// `method` pointer
    FnPtr(Box<SignatureMethod<R>>),
    /// `object`
    Object,
    /// Vector: one dimension, lower bound 0
    SzArray(SignatureSzArray<R>),
    /// `!!n`
    GenericParamMethod(u32),
    /// Pinned local
    Pinned(Box<TypeSignature<R>>),
}

/// A `modreq` / `modopt` custom modifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomModifier<R> {
    /// `modreq` when true, `modopt` otherwise
    pub is_required: bool,
    /// The modifier type
    pub modifier_type: R,
}

/// One dimension of an [`SignatureArray`] shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ArrayDimensions {
    /// Element count, when the shape gives one
    pub size: Option<u32>,
    /// First index, when the shape gives one
    pub lower_bound: Option<i32>,
}

/// `ARRAY` with rank and optional bounds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureArray<R> {
    /// Element type
    pub base: Box<TypeSignature<R>>,
    /// Dimension count
    pub rank: u32,
    /// Leading dimensions with a size or lower bound, at most `rank` of them
    pub dimensions: Vec<ArrayDimensions>,
}

/// `SZARRAY`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureSzArray<R> {
    /// Modifiers on the element type
    pub modifiers: Vec<CustomModifier<R>>,
    /// Element type
    pub base: Box<TypeSignature<R>>,
}

/// `PTR`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignaturePointer<R> {
    /// Modifiers on the pointee
    pub modifiers: Vec<CustomModifier<R>>,
    /// Pointee type
    pub base: Box<TypeSignature<R>>,
}

/// A parameter or return type (II.23.2.10, II.23.2.11)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureParameter<R> {
    /// Leading `modreq`/`modopt` entries
    pub modifiers: Vec<CustomModifier<R>>,
    /// Preceded by `BYREF`
    pub by_ref: bool,
    /// Parameter type
    pub base: TypeSignature<R>,
}

/// `MethodDefSig`, `MethodRefSig` or `StandAloneMethodSig` (II.23.2.1 - II.23.2.3)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(clippy::struct_excessive_bools)]
pub struct SignatureMethod<R> {
    /// `HASTHIS`: an instance method
    pub has_this: bool,
    /// `EXPLICITTHIS`: `this` is the first listed parameter
    pub explicit_this: bool,
    /// `VARARG` convention kind
    pub vararg: bool,
    /// Unmanaged `C` kind
    pub cdecl: bool,
    /// Unmanaged `STDCALL` kind
    pub stdcall: bool,
    /// Unmanaged `THISCALL` kind
    pub thiscall: bool,
    /// Unmanaged `FASTCALL` kind
    pub fastcall: bool,
    /// Generic parameter count; nonzero sets `GENERIC`
    pub param_count_generic: u32,
    /// Return type
    pub return_type: SignatureParameter<R>,
    /// Fixed parameters
    pub params: Vec<SignatureParameter<R>>,
    /// The vararg parameters, after the sentinel
    pub varargs: Vec<SignatureParameter<R>>,
}

/// `FieldSig` (II.23.2.4)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureField<R> {
    /// Modifiers on the field type
    pub modifiers: Vec<CustomModifier<R>>,
    /// Field type
    pub base: TypeSignature<R>,
}

/// `PropertySig` (II.23.2.5)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureProperty<R> {
    /// `HASTHIS` is set in the header
    pub has_this: bool,
    /// Modifiers on the property type
    pub modifiers: Vec<CustomModifier<R>>,
    /// Property type
    pub base: TypeSignature<R>,
    /// Indexer parameters
    pub params: Vec<SignatureParameter<R>>,
}

/// `LocalVarSig` (II.23.2.6), referenced from a `StandAloneSig` row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureLocalVariables<R> {
    /// Locals in slot order
    pub locals: Vec<SignatureLocalVariable<R>>,
}

/// One local slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureLocalVariable<R> {
    /// Modifiers before the type
    pub modifiers: Vec<CustomModifier<R>>,
    /// Preceded by `BYREF`
    pub is_byref: bool,
    /// Preceded by `PINNED`
    pub is_pinned: bool,
    /// Slot type
    pub base: TypeSignature<R>,
}

/// `TypeSpec` blob (II.23.2.14)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureTypeSpec<R> {
    /// The specified type
    pub base: TypeSignature<R>,
}

/// `MethodSpec` instantiation blob (II.23.2.15)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureMethodSpec<R> {
    /// One type per generic parameter of the method
    pub generic_args: Vec<TypeSignature<R>>,
}

/// Signatures with tokens in place of type references, as read back from a blob.
pub type TokenSignature = TypeSignature<Token>;

fn map_all<T, U, F>(items: &[T], map: &mut F, each: impl Fn(&T, &mut F) -> Result<U>) -> Result<Vec<U>> {
    items.iter().map(|item| each(item, map)).collect()
}

impl<R> TypeSignature<R> {
    /// Convert every type reference with `map`, keeping the shape of the signature.
    ///
    /// # Errors
    /// Returns the first error `map` returns.
    pub fn try_map<S, F>(&self, map: &mut F) -> Result<TypeSignature<S>>
    where
        F: FnMut(&R) -> Result<S>,
    {
        Ok(match self {
            TypeSignature::Void => TypeSignature::Void,
            TypeSignature::Boolean => TypeSignature::Boolean,
            TypeSignature::Char => TypeSignature::Char,
            TypeSignature::I1 => TypeSignature::I1,
            TypeSignature::U1 => TypeSignature::U1,
            TypeSignature::I2 => TypeSignature::I2,
            TypeSignature::U2 => TypeSignature::U2,
            TypeSignature::I4 => TypeSignature::I4,
            TypeSignature::U4 => TypeSignature::U4,
            TypeSignature::I8 => TypeSignature::I8,
            TypeSignature::U8 => TypeSignature::U8,
            TypeSignature::R4 => TypeSignature::R4,
            TypeSignature::R8 => TypeSignature::R8,
            TypeSignature::String => TypeSignature::String,
            TypeSignature::TypedByRef => TypeSignature::TypedByRef,
            TypeSignature::I => TypeSignature::I,
            TypeSignature::U => TypeSignature::U,
            TypeSignature::Object => TypeSignature::Object,
            TypeSignature::GenericParamType(index) => TypeSignature::GenericParamType(*index),
            TypeSignature::GenericParamMethod(index) => TypeSignature::GenericParamMethod(*index),
            TypeSignature::ValueType(reference) => TypeSignature::ValueType(map(reference)?),
            TypeSignature::Class(reference) => TypeSignature::Class(map(reference)?),
            TypeSignature::ByRef(inner) => TypeSignature::ByRef(Box::new(inner.try_map(map)?)),
            TypeSignature::Pinned(inner) => TypeSignature::Pinned(Box::new(inner.try_map(map)?)),
            TypeSignature::Ptr(pointer) => TypeSignature::Ptr(SignaturePointer {
                modifiers: map_all(&pointer.modifiers, map, CustomModifier::try_map)?,
                base: Box::new(pointer.base.try_map(map)?),
            }),
            TypeSignature::SzArray(array) => TypeSignature::SzArray(SignatureSzArray {
                modifiers: map_all(&array.modifiers, map, CustomModifier::try_map)?,
                base: Box::new(array.base.try_map(map)?),
            }),
            TypeSignature::Array(array) => TypeSignature::Array(SignatureArray {
                base: Box::new(array.base.try_map(map)?),
                rank: array.rank,
                dimensions: array.dimensions.clone(),
            }),
            TypeSignature::GenericInst(base, args) => TypeSignature::GenericInst(
                Box::new(base.try_map(map)?),
                map_all(args, map, TypeSignature::try_map)?,
            ),
            TypeSignature::FnPtr(method) => TypeSignature::FnPtr(Box::new(method.try_map(map)?)),
        })
    }

    /// Returns true for the primitive types that encode as a single element type byte.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            TypeSignature::Void
                | TypeSignature::Boolean
                | TypeSignature::Char
                | TypeSignature::I1
                | TypeSignature::U1
                | TypeSignature::I2
                | TypeSignature::U2
                | TypeSignature::I4
                | TypeSignature::U4
                | TypeSignature::I8
                | TypeSignature::U8
                | TypeSignature::R4
                | TypeSignature::R8
                | TypeSignature::String
                | TypeSignature::TypedByRef
                | TypeSignature::I
                | TypeSignature::U
                | TypeSignature::Object
        )
    }
}

impl<R> CustomModifier<R> {
    /// See [`TypeSignature::try_map`]
    ///
    /// # Errors
    /// Returns the first error `map` returns.
    pub fn try_map<S, F>(&self, map: &mut F) -> Result<CustomModifier<S>>
    where
        F: FnMut(&R) -> Result<S>,
    {
        Ok(CustomModifier {
            is_required: self.is_required,
            modifier_type: map(&self.modifier_type)?,
        })
    }
}

impl<R> SignatureParameter<R> {
    /// A parameter of type `base` without modifiers
    #[must_use]
    pub fn new(base: TypeSignature<R>) -> Self {
        SignatureParameter {
            modifiers: Vec::new(),
            by_ref: false,
            base,
        }
    }

    /// See [`TypeSignature::try_map`]
    ///
    /// # Errors
    /// Returns the first error `map` returns.
    pub fn try_map<S, F>(&self, map: &mut F) -> Result<SignatureParameter<S>>
    where
        F: FnMut(&R) -> Result<S>,
    {
        Ok(SignatureParameter {
            modifiers: map_all(&self.modifiers, map, CustomModifier::try_map)?,
            by_ref: self.by_ref,
            base: self.base.try_map(map)?,
        })
    }
}

impl<R> SignatureMethod<R> {
    /// A default-convention static method signature.
    #[must_use]
    pub fn new(return_type: TypeSignature<R>, params: Vec<TypeSignature<R>>) -> Self {
        SignatureMethod {
            has_this: false,
            explicit_this: false,
            vararg: false,
            cdecl: false,
            stdcall: false,
            thiscall: false,
            fastcall: false,
            param_count_generic: 0,
            return_type: SignatureParameter::new(return_type),
            params: params.into_iter().map(SignatureParameter::new).collect(),
            varargs: Vec::new(),
        }
    }

    /// The same signature as an instance method
    #[must_use]
    pub fn instance(mut self) -> Self {
        self.has_this = true;
        self
    }

    /// The same signature with `count` generic parameters
    #[must_use]
    pub fn generic(mut self, count: u32) -> Self {
        self.param_count_generic = count;
        self
    }

    /// See [`TypeSignature::try_map`]
    ///
    /// # Errors
    /// Returns the first error `map` returns.
    pub fn try_map<S, F>(&self, map: &mut F) -> Result<SignatureMethod<S>>
    where
        F: FnMut(&R) -> Result<S>,
    {
        Ok(SignatureMethod {
            has_this: self.has_this,
            explicit_this: self.explicit_this,
            vararg: self.vararg,
            cdecl: self.cdecl,
            stdcall: self.stdcall,
            thiscall: self.thiscall,
            fastcall: self.fastcall,
            param_count_generic: self.param_count_generic,
            return_type: self.return_type.try_map(map)?,
            params: map_all(&self.params, map, SignatureParameter::try_map)?,
            varargs: map_all(&self.varargs, map, SignatureParameter::try_map)?,
        })
    }
}

impl<R> SignatureField<R> {
    /// A field of type `base` without modifiers
    #[must_use]
    pub fn new(base: TypeSignature<R>) -> Self {
        SignatureField {
            modifiers: Vec::new(),
            base,
        }
    }

    /// See [`TypeSignature::try_map`]
    ///
    /// # Errors
    /// Returns the first error `map` returns.
    pub fn try_map<S, F>(&self, map: &mut F) -> Result<SignatureField<S>>
    where
        F: FnMut(&R) -> Result<S>,
    {
        Ok(SignatureField {
            modifiers: map_all(&self.modifiers, map, CustomModifier::try_map)?,
            base: self.base.try_map(map)?,
        })
    }
}

impl<R> SignatureProperty<R> {
    /// See [`TypeSignature::try_map`]
    ///
    /// # Errors
    /// Returns the first error `map` returns.
    pub fn try_map<S, F>(&self, map: &mut F) -> Result<SignatureProperty<S>>
    where
        F: FnMut(&R) -> Result<S>,
    {
        Ok(SignatureProperty {
            has_this: self.has_this,
            modifiers: map_all(&self.modifiers, map, CustomModifier::try_map)?,
            base: self.base.try_map(map)?,
            params: map_all(&self.params, map, SignatureParameter::try_map)?,
        })
    }
}

impl<R> SignatureLocalVariable<R> {
    /// A plain local of type `base`
    #[must_use]
    pub fn new(base: TypeSignature<R>) -> Self {
        SignatureLocalVariable {
            modifiers: Vec::new(),
            is_byref: false,
            is_pinned: false,
            base,
        }
    }

    /// See [`TypeSignature::try_map`]
    ///
    /// # Errors
    /// Returns the first error `map` returns.
    pub fn try_map<S, F>(&self, map: &mut F) -> Result<SignatureLocalVariable<S>>
    where
        F: FnMut(&R) -> Result<S>,
    {
        Ok(SignatureLocalVariable {
            modifiers: map_all(&self.modifiers, map, CustomModifier::try_map)?,
            is_byref: self.is_byref,
            is_pinned: self.is_pinned,
            base: self.base.try_map(map)?,
        })
    }
}

impl<R> SignatureLocalVariables<R> {
    /// See [`TypeSignature::try_map`]
    ///
    /// # Errors
    /// Returns the first error `map` returns.
    pub fn try_map<S, F>(&self, map: &mut F) -> Result<SignatureLocalVariables<S>>
    where
        F: FnMut(&R) -> Result<S>,
    {
        Ok(SignatureLocalVariables {
            locals: map_all(&self.locals, map, SignatureLocalVariable::try_map)?,
        })
    }
}

impl<R> SignatureTypeSpec<R> {
    /// See [`TypeSignature::try_map`]
    ///
    /// # Errors
    /// Returns the first error `map` returns.
    pub fn try_map<S, F>(&self, map: &mut F) -> Result<SignatureTypeSpec<S>>
    where
        F: FnMut(&R) -> Result<S>,
    {
        Ok(SignatureTypeSpec {
            base: self.base.try_map(map)?,
        })
    }
}

impl<R> SignatureMethodSpec<R> {
    /// See [`TypeSignature::try_map`]
    ///
    /// # Errors
    /// Returns the first error `map` returns.
    pub fn try_map<S, F>(&self, map: &mut F) -> Result<SignatureMethodSpec<S>>
    where
        F: FnMut(&R) -> Result<S>,
    {
        Ok(SignatureMethodSpec {
            generic_args: map_all(&self.generic_args, map, TypeSignature::try_map)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_map_keeps_shape() {
        let sig: TypeSignature<&str> = TypeSignature::GenericInst(
            Box::new(TypeSignature::Class("List")),
            vec![TypeSignature::SzArray(SignatureSzArray {
                modifiers: vec![CustomModifier {
                    is_required: true,
                    modifier_type: "IsConst",
                }],
                base: Box::new(TypeSignature::ValueType("Point")),
            })],
        );

        let mapped = sig.try_map(&mut |name: &&str| Ok(name.len())).unwrap();
        assert_eq!(
            mapped,
            TypeSignature::GenericInst(
                Box::new(TypeSignature::Class(4)),
                vec![TypeSignature::SzArray(SignatureSzArray {
                    modifiers: vec![CustomModifier {
                        is_required: true,
                        modifier_type: 7,
                    }],
                    base: Box::new(TypeSignature::ValueType(5)),
                })],
            )
        );
    }

    #[test]
    fn try_map_propagates_errors() {
        let method = SignatureMethod::new(
            TypeSignature::Void,
            vec![TypeSignature::I4, TypeSignature::Class("Missing")],
        );

        let result: Result<SignatureMethod<u32>> =
            method.try_map(&mut |_: &&str| Err(malformed_error!("unresolved")));
        assert!(result.is_err());
    }

    #[test]
    fn primitives() {
        assert!(TypeSignature::<Token>::I4.is_primitive());
        assert!(TypeSignature::<Token>::Object.is_primitive());
        assert!(!TypeSignature::Class(Token::new(0x0200_0001)).is_primitive());
    }
}
