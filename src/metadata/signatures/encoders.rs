//! Signature encoders for `#Blob` heap entries.
//!
//! Each encoder renders one signature kind into its ECMA-335 binary form. Type references are
//! turned into tokens by a caller-supplied resolver, which lets the emitter encode signatures
//! that still point at arena elements: the resolver is only invoked once row numbers are final.
//!
//! Inside a blob a type reference is a `TypeDefOrRefOrSpecEncoded` value: the same
//! `(row << 2) | tag` combination as the `TypeDefOrRef` coded index, but written as a
//! compressed integer instead of a fixed 2 or 4 byte column.
//!
//! # Available Encoders
//!
//! - [`encode_method_signature`] - Method signatures for MethodDef, MemberRef and StandAloneSig
//! - [`encode_field_signature`] - Field signatures for Field and MemberRef
//! - [`encode_property_signature`] - Property signatures for Property
//! - [`encode_local_var_signature`] - Local variable signatures for StandAloneSig
//! - [`encode_typespec_signature`] - Type specification signatures for TypeSpec
//! - [`encode_method_spec_signature`] - Generic instantiations for MethodSpec

use crate::{
    metadata::{
        signatures::{
            CustomModifier, SignatureField, SignatureLocalVariables, SignatureMethod,
            SignatureMethodSpec, SignatureParameter, SignatureProperty, SignatureTypeSpec,
            TypeSignature, CALLING_CONVENTION, ELEMENT_TYPE, SIGNATURE_HEADER,
        },
        tables::CodedIndexType,
        token::Token,
    },
    utils::{to_u32, write_compressed_int, write_compressed_uint},
    Result,
};

/// Resolver for signatures that already carry tokens.
///
/// # Errors
/// Never fails; the signature is `Result` shaped to fit the encoder contract.
#[allow(clippy::trivially_copy_pass_by_ref, clippy::unnecessary_wraps)]
pub fn resolve_token(token: &Token) -> Result<Token> {
    Ok(*token)
}

/// Encodes `token` as `TypeDefOrRefOrSpecEncoded` (ECMA-335 II.23.2.8).
///
/// # Errors
/// Returns an error if the token is not a TypeDef, TypeRef or TypeSpec token.
pub fn write_type_def_or_ref(token: Token, buffer: &mut Vec<u8>) -> Result<()> {
    let Some(table) = token.table_id() else {
        return Err(malformed_error!(
            "Token {} does not address a metadata table",
            token
        ));
    };

    let coded = CodedIndexType::TypeDefOrRef.encode(table, token.row())?;
    write_compressed_uint(coded, buffer)
}

/// Encodes a custom modifier: `CMOD_REQD` or `CMOD_OPT` followed by the modifier type.
fn encode_custom_modifier<R, F>(
    modifier: &CustomModifier<R>,
    resolve: &F,
    buffer: &mut Vec<u8>,
) -> Result<()>
where
    F: Fn(&R) -> Result<Token>,
{
    buffer.push(if modifier.is_required {
        ELEMENT_TYPE::CMOD_REQD
    } else {
        ELEMENT_TYPE::CMOD_OPT
    });

    write_type_def_or_ref(resolve(&modifier.modifier_type)?, buffer)
}

fn encode_custom_modifiers<R, F>(
    modifiers: &[CustomModifier<R>],
    resolve: &F,
    buffer: &mut Vec<u8>,
) -> Result<()>
where
    F: Fn(&R) -> Result<Token>,
{
    for modifier in modifiers {
        encode_custom_modifier(modifier, resolve, buffer)?;
    }
    Ok(())
}

/// Encodes one type, recursing into its components.
///
/// # Errors
/// Returns an error if a reference cannot be resolved or a count overflows the compressed
/// integer range.
pub fn encode_type_signature<R, F>(
    signature: &TypeSignature<R>,
    resolve: &F,
    buffer: &mut Vec<u8>,
) -> Result<()>
where
    F: Fn(&R) -> Result<Token>,
{
    match signature {
        TypeSignature::Void => buffer.push(ELEMENT_TYPE::VOID),
        TypeSignature::Boolean => buffer.push(ELEMENT_TYPE::BOOLEAN),
        TypeSignature::Char => buffer.push(ELEMENT_TYPE::CHAR),
        TypeSignature::I1 => buffer.push(ELEMENT_TYPE::I1),
        TypeSignature::U1 => buffer.push(ELEMENT_TYPE::U1),
        TypeSignature::I2 => buffer.push(ELEMENT_TYPE::I2),
        TypeSignature::U2 => buffer.push(ELEMENT_TYPE::U2),
        TypeSignature::I4 => buffer.push(ELEMENT_TYPE::I4),
        TypeSignature::U4 => buffer.push(ELEMENT_TYPE::U4),
        TypeSignature::I8 => buffer.push(ELEMENT_TYPE::I8),
        TypeSignature::U8 => buffer.push(ELEMENT_TYPE::U8),
        TypeSignature::R4 => buffer.push(ELEMENT_TYPE::R4),
        TypeSignature::R8 => buffer.push(ELEMENT_TYPE::R8),
        TypeSignature::String => buffer.push(ELEMENT_TYPE::STRING),
        TypeSignature::TypedByRef => buffer.push(ELEMENT_TYPE::TYPEDBYREF),
        TypeSignature::I => buffer.push(ELEMENT_TYPE::I),
        TypeSignature::U => buffer.push(ELEMENT_TYPE::U),
        TypeSignature::Object => buffer.push(ELEMENT_TYPE::OBJECT),
        TypeSignature::Ptr(pointer) => {
            buffer.push(ELEMENT_TYPE::PTR);
            encode_custom_modifiers(&pointer.modifiers, resolve, buffer)?;
            encode_type_signature(&pointer.base, resolve, buffer)?;
        }
        TypeSignature::ByRef(inner) => {
            buffer.push(ELEMENT_TYPE::BYREF);
            encode_type_signature(inner, resolve, buffer)?;
        }
        TypeSignature::Pinned(inner) => {
            buffer.push(ELEMENT_TYPE::PINNED);
            encode_type_signature(inner, resolve, buffer)?;
        }
        TypeSignature::ValueType(reference) => {
            buffer.push(ELEMENT_TYPE::VALUETYPE);
            write_type_def_or_ref(resolve(reference)?, buffer)?;
        }
        TypeSignature::Class(reference) => {
            buffer.push(ELEMENT_TYPE::CLASS);
            write_type_def_or_ref(resolve(reference)?, buffer)?;
        }
        TypeSignature::GenericParamType(index) => {
            buffer.push(ELEMENT_TYPE::VAR);
            write_compressed_uint(*index, buffer)?;
        }
        TypeSignature::GenericParamMethod(index) => {
            buffer.push(ELEMENT_TYPE::MVAR);
            write_compressed_uint(*index, buffer)?;
        }
        TypeSignature::Array(array) => {
            buffer.push(ELEMENT_TYPE::ARRAY);
            encode_type_signature(&array.base, resolve, buffer)?;
            write_compressed_uint(array.rank, buffer)?;

            // Sizes and lower bounds are prefixes: a dimension without a size ends the
            // size list, and likewise for lower bounds.
            let sizes: Vec<u32> = array.dimensions.iter().map_while(|d| d.size).collect();
            write_compressed_uint(to_u32(sizes.len())?, buffer)?;
            for size in sizes {
                write_compressed_uint(size, buffer)?;
            }

            let bounds: Vec<i32> = array
                .dimensions
                .iter()
                .map_while(|d| d.lower_bound)
                .collect();
            write_compressed_uint(to_u32(bounds.len())?, buffer)?;
            for bound in bounds {
                write_compressed_int(bound, buffer)?;
            }
        }
        TypeSignature::SzArray(array) => {
            buffer.push(ELEMENT_TYPE::SZARRAY);
            encode_custom_modifiers(&array.modifiers, resolve, buffer)?;
            encode_type_signature(&array.base, resolve, buffer)?;
        }
        TypeSignature::GenericInst(base, args) => {
            if !matches!(
                base.as_ref(),
                TypeSignature::Class(_) | TypeSignature::ValueType(_)
            ) {
                return Err(malformed_error!(
                    "GENERICINST - base type must be a class or value type"
                ));
            }

            buffer.push(ELEMENT_TYPE::GENERICINST);
            encode_type_signature(base, resolve, buffer)?;
            write_compressed_uint(to_u32(args.len())?, buffer)?;
            for arg in args {
                encode_type_signature(arg, resolve, buffer)?;
            }
        }
        TypeSignature::FnPtr(method) => {
            buffer.push(ELEMENT_TYPE::FNPTR);
            encode_method_signature_into(method, resolve, buffer)?;
        }
    }

    Ok(())
}

/// Encodes a parameter: custom modifiers, an optional `BYREF` marker, then the type.
fn encode_parameter<R, F>(
    parameter: &SignatureParameter<R>,
    resolve: &F,
    buffer: &mut Vec<u8>,
) -> Result<()>
where
    F: Fn(&R) -> Result<Token>,
{
    encode_custom_modifiers(&parameter.modifiers, resolve, buffer)?;
    if parameter.by_ref {
        buffer.push(ELEMENT_TYPE::BYREF);
    }
    encode_type_signature(&parameter.base, resolve, buffer)
}

fn encode_method_signature_into<R, F>(
    signature: &SignatureMethod<R>,
    resolve: &F,
    buffer: &mut Vec<u8>,
) -> Result<()>
where
    F: Fn(&R) -> Result<Token>,
{
    let mut calling_convention = if signature.vararg {
        CALLING_CONVENTION::VARARG
    } else if signature.fastcall {
        CALLING_CONVENTION::FASTCALL
    } else if signature.thiscall {
        CALLING_CONVENTION::THISCALL
    } else if signature.stdcall {
        CALLING_CONVENTION::STDCALL
    } else if signature.cdecl {
        CALLING_CONVENTION::C
    } else {
        CALLING_CONVENTION::DEFAULT
    };

    if signature.has_this {
        calling_convention |= CALLING_CONVENTION::HASTHIS;
    }
    if signature.explicit_this {
        calling_convention |= CALLING_CONVENTION::EXPLICITTHIS;
    }
    if signature.param_count_generic > 0 {
        calling_convention |= CALLING_CONVENTION::GENERIC;
    }
    buffer.push(calling_convention);

    if signature.param_count_generic > 0 {
        write_compressed_uint(signature.param_count_generic, buffer)?;
    }

    let param_count = to_u32(signature.params.len() + signature.varargs.len())?;
    write_compressed_uint(param_count, buffer)?;

    encode_parameter(&signature.return_type, resolve, buffer)?;
    for param in &signature.params {
        encode_parameter(param, resolve, buffer)?;
    }

    if !signature.varargs.is_empty() {
        buffer.push(ELEMENT_TYPE::SENTINEL);
        for param in &signature.varargs {
            encode_parameter(param, resolve, buffer)?;
        }
    }

    Ok(())
}

/// Encodes a method signature: calling convention, generic arity, parameter count, the
/// return type and every parameter. Vararg parameters follow a `SENTINEL`.
///
/// # Errors
/// Returns an error if a type reference cannot be resolved or a count overflows.
///
/// # Examples
///
/// ```rust
/// use dotemit::metadata::signatures::{
///     encode_method_signature, resolve_token, SignatureMethod, TypeSignature,
/// };
///
/// let sig = SignatureMethod::new(TypeSignature::Void, vec![TypeSignature::I4]).instance();
/// assert_eq!(encode_method_signature(&sig, &resolve_token)?, vec![0x20, 0x01, 0x01, 0x08]);
/// # Ok::<(), dotemit::Error>(())
/// ```
pub fn encode_method_signature<R, F>(signature: &SignatureMethod<R>, resolve: &F) -> Result<Vec<u8>>
where
    F: Fn(&R) -> Result<Token>,
{
    let mut buffer = Vec::new();
    encode_method_signature_into(signature, resolve, &mut buffer)?;
    Ok(buffer)
}

/// Encodes a field signature: the `FIELD` prolog, custom modifiers and the field type.
///
/// # Errors
/// Returns an error if a type reference cannot be resolved.
pub fn encode_field_signature<R, F>(signature: &SignatureField<R>, resolve: &F) -> Result<Vec<u8>>
where
    F: Fn(&R) -> Result<Token>,
{
    let mut buffer = vec![SIGNATURE_HEADER::FIELD];
    encode_custom_modifiers(&signature.modifiers, resolve, &mut buffer)?;
    encode_type_signature(&signature.base, resolve, &mut buffer)?;
    Ok(buffer)
}

/// Encodes a property signature: `PROPERTY` (with `HASTHIS` for instance properties), the
/// parameter count, custom modifiers, the property type and the indexer parameters.
///
/// # Errors
/// Returns an error if a type reference cannot be resolved or a count overflows.
pub fn encode_property_signature<R, F>(
    signature: &SignatureProperty<R>,
    resolve: &F,
) -> Result<Vec<u8>>
where
    F: Fn(&R) -> Result<Token>,
{
    let mut head = SIGNATURE_HEADER::PROPERTY;
    if signature.has_this {
        head |= CALLING_CONVENTION::HASTHIS;
    }

    let mut buffer = vec![head];
    write_compressed_uint(to_u32(signature.params.len())?, &mut buffer)?;
    encode_custom_modifiers(&signature.modifiers, resolve, &mut buffer)?;
    encode_type_signature(&signature.base, resolve, &mut buffer)?;
    for param in &signature.params {
        encode_parameter(param, resolve, &mut buffer)?;
    }

    Ok(buffer)
}

/// Encodes a local variable signature: `LOCAL_SIG`, the count, then per local its custom
/// modifiers, `PINNED` and `BYREF` markers and type.
///
/// # Errors
/// Returns an error if a type reference cannot be resolved or the count overflows.
///
/// # Examples
///
/// ```rust
/// use dotemit::metadata::signatures::{
///     encode_local_var_signature, resolve_token, SignatureLocalVariable,
///     SignatureLocalVariables, TypeSignature,
/// };
///
/// let locals = SignatureLocalVariables {
///     locals: vec![
///         SignatureLocalVariable::new(TypeSignature::I4),
///         SignatureLocalVariable::new(TypeSignature::String),
///     ],
/// };
/// assert_eq!(encode_local_var_signature(&locals, &resolve_token)?, vec![0x07, 0x02, 0x08, 0x0E]);
/// # Ok::<(), dotemit::Error>(())
/// ```
pub fn encode_local_var_signature<R, F>(
    signature: &SignatureLocalVariables<R>,
    resolve: &F,
) -> Result<Vec<u8>>
where
    F: Fn(&R) -> Result<Token>,
{
    let mut buffer = vec![SIGNATURE_HEADER::LOCAL_SIG];
    write_compressed_uint(to_u32(signature.locals.len())?, &mut buffer)?;

    for local in &signature.locals {
        if matches!(local.base, TypeSignature::TypedByRef) {
            buffer.push(ELEMENT_TYPE::TYPEDBYREF);
            continue;
        }

        encode_custom_modifiers(&local.modifiers, resolve, &mut buffer)?;
        if local.is_pinned {
            buffer.push(ELEMENT_TYPE::PINNED);
        }
        if local.is_byref {
            buffer.push(ELEMENT_TYPE::BYREF);
        }
        encode_type_signature(&local.base, resolve, &mut buffer)?;
    }

    Ok(buffer)
}

/// Encodes a type specification: just the type, without a prolog.
///
/// # Errors
/// Returns an error if a type reference cannot be resolved.
pub fn encode_typespec_signature<R, F>(
    signature: &SignatureTypeSpec<R>,
    resolve: &F,
) -> Result<Vec<u8>>
where
    F: Fn(&R) -> Result<Token>,
{
    let mut buffer = Vec::new();
    encode_type_signature(&signature.base, resolve, &mut buffer)?;
    Ok(buffer)
}

/// Encodes a method instantiation: `GENERIC_INST`, the argument count and each argument.
///
/// # Errors
/// Returns an error if a type reference cannot be resolved or the count overflows.
pub fn encode_method_spec_signature<R, F>(
    signature: &SignatureMethodSpec<R>,
    resolve: &F,
) -> Result<Vec<u8>>
where
    F: Fn(&R) -> Result<Token>,
{
    let mut buffer = vec![SIGNATURE_HEADER::GENERIC_INST];
    write_compressed_uint(to_u32(signature.generic_args.len())?, &mut buffer)?;
    for arg in &signature.generic_args {
        encode_type_signature(arg, resolve, &mut buffer)?;
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::signatures::{
        ArrayDimensions, SignatureArray, SignatureLocalVariable, SignatureSzArray,
    };
    use crate::metadata::tables::TableId;

    fn type_def_token(row: u32) -> Token {
        Token::from_parts(TableId::TypeDef, row).unwrap()
    }

    #[test]
    fn field_with_class_reference() {
        // TypeRef row 3 -> (3 << 2) | 1 = 0x0D
        let field = SignatureField::new(TypeSignature::Class(Token::new(0x0100_0003)));
        assert_eq!(
            encode_field_signature(&field, &resolve_token).unwrap(),
            vec![0x06, 0x12, 0x0D]
        );

        // TypeDef row 0x40 -> 0x100 needs two bytes
        let field = SignatureField::new(TypeSignature::ValueType(type_def_token(0x40)));
        assert_eq!(
            encode_field_signature(&field, &resolve_token).unwrap(),
            vec![0x06, 0x11, 0x81, 0x00]
        );
    }

    #[test]
    fn rejects_non_type_tokens() {
        let field = SignatureField::new(TypeSignature::Class(Token::new(0x0600_0001)));
        assert!(encode_field_signature(&field, &resolve_token).is_err());
    }

    #[test]
    fn resolver_errors_propagate() {
        let field = SignatureField::new(TypeSignature::Class("Missing"));
        let result = encode_field_signature(&field, &|_: &&str| {
            Err(crate::Error::UnresolvedReference {
                from: "field".to_string(),
                target: "Missing".to_string(),
            })
        });
        assert!(matches!(
            result,
            Err(crate::Error::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn generic_method() {
        // T Method<T>(T item)
        let sig = SignatureMethod::new(
            TypeSignature::<Token>::GenericParamMethod(0),
            vec![TypeSignature::GenericParamMethod(0)],
        )
        .instance()
        .generic(1);

        assert_eq!(
            encode_method_signature(&sig, &resolve_token).unwrap(),
            vec![0x30, 0x01, 0x01, 0x1E, 0x00, 0x1E, 0x00]
        );
    }

    #[test]
    fn vararg_method() {
        let mut sig = SignatureMethod::new(TypeSignature::<Token>::Void, vec![TypeSignature::I4]);
        sig.vararg = true;
        sig.varargs.push(SignatureParameter::new(TypeSignature::String));

        assert_eq!(
            encode_method_signature(&sig, &resolve_token).unwrap(),
            vec![0x05, 0x02, 0x01, 0x08, 0x41, 0x0E]
        );
    }

    #[test]
    fn arrays() {
        let sig = SignatureTypeSpec {
            base: TypeSignature::<Token>::Array(SignatureArray {
                base: Box::new(TypeSignature::I4),
                rank: 2,
                dimensions: vec![
                    ArrayDimensions {
                        size: Some(3),
                        lower_bound: Some(-1),
                    },
                    ArrayDimensions {
                        size: None,
                        lower_bound: None,
                    },
                ],
            }),
        };

        // ARRAY I4 rank=2 sizes=1 [3] bounds=1 [-1]
        assert_eq!(
            encode_typespec_signature(&sig, &resolve_token).unwrap(),
            vec![0x14, 0x08, 0x02, 0x01, 0x03, 0x01, 0x01]
        );
    }

    #[test]
    fn locals() {
        let locals = SignatureLocalVariables {
            locals: vec![
                SignatureLocalVariable {
                    modifiers: Vec::new(),
                    is_byref: true,
                    is_pinned: true,
                    base: TypeSignature::<Token>::U1,
                },
                SignatureLocalVariable::new(TypeSignature::SzArray(SignatureSzArray {
                    modifiers: Vec::new(),
                    base: Box::new(TypeSignature::Object),
                })),
                SignatureLocalVariable::new(TypeSignature::TypedByRef),
            ],
        };

        assert_eq!(
            encode_local_var_signature(&locals, &resolve_token).unwrap(),
            vec![0x07, 0x03, 0x45, 0x10, 0x05, 0x1D, 0x1C, 0x16]
        );
    }

    #[test]
    fn property_and_method_spec() {
        let property = SignatureProperty {
            has_this: true,
            modifiers: Vec::new(),
            base: TypeSignature::<Token>::String,
            params: vec![SignatureParameter::new(TypeSignature::I4)],
        };
        assert_eq!(
            encode_property_signature(&property, &resolve_token).unwrap(),
            vec![0x28, 0x01, 0x0E, 0x08]
        );

        let spec = SignatureMethodSpec {
            generic_args: vec![TypeSignature::<Token>::I4, TypeSignature::String],
        };
        assert_eq!(
            encode_method_spec_signature(&spec, &resolve_token).unwrap(),
            vec![0x0A, 0x02, 0x08, 0x0E]
        );
    }

    #[test]
    fn generic_inst_needs_class_base() {
        let sig = SignatureTypeSpec {
            base: TypeSignature::<Token>::GenericInst(Box::new(TypeSignature::I4), vec![]),
        };
        assert!(encode_typespec_signature(&sig, &resolve_token).is_err());
    }
}
