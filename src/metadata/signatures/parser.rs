use crate::{
    file::parser::Parser,
    metadata::{
        signatures::{
            ArrayDimensions, CustomModifier, SignatureArray, SignatureField,
            SignatureLocalVariable, SignatureLocalVariables, SignatureMethod, SignatureMethodSpec,
            SignatureParameter, SignaturePointer, SignatureProperty, SignatureSzArray,
            SignatureTypeSpec, TypeSignature, CALLING_CONVENTION, ELEMENT_TYPE, SIGNATURE_HEADER,
        },
        token::Token,
    },
    Result,
};

/// Deepest type nesting accepted before a blob is rejected
const MAX_NESTING: usize = 50;

/// Element types that stand alone, without any trailing data
fn primitive(tag: u8) -> Option<TypeSignature<Token>> {
    Some(match tag {
        ELEMENT_TYPE::VOID => TypeSignature::Void,
        ELEMENT_TYPE::BOOLEAN => TypeSignature::Boolean,
        ELEMENT_TYPE::CHAR => TypeSignature::Char,
        ELEMENT_TYPE::I1 => TypeSignature::I1,
        ELEMENT_TYPE::U1 => TypeSignature::U1,
        ELEMENT_TYPE::I2 => TypeSignature::I2,
        ELEMENT_TYPE::U2 => TypeSignature::U2,
        ELEMENT_TYPE::I4 => TypeSignature::I4,
        ELEMENT_TYPE::U4 => TypeSignature::U4,
        ELEMENT_TYPE::I8 => TypeSignature::I8,
        ELEMENT_TYPE::U8 => TypeSignature::U8,
        ELEMENT_TYPE::R4 => TypeSignature::R4,
        ELEMENT_TYPE::R8 => TypeSignature::R8,
        ELEMENT_TYPE::STRING => TypeSignature::String,
        ELEMENT_TYPE::TYPEDBYREF => TypeSignature::TypedByRef,
        ELEMENT_TYPE::I => TypeSignature::I,
        ELEMENT_TYPE::U => TypeSignature::U,
        ELEMENT_TYPE::OBJECT => TypeSignature::Object,
        _ => return None,
    })
}

/// Reads signature blobs back into their typed form.
///
/// This is the inverse of the `encode_*` functions: type references come back as
/// [`Token`]s decoded from their `TypeDefOrRefOrSpecEncoded` form, so a blob written by the
/// builder can be checked against the signature it was built from.
///
/// ```rust
/// use dotemit::metadata::signatures::{SignatureParser, TypeSignature};
///
/// // instance void M(string)
/// let sig = SignatureParser::new(&[0x20, 0x01, 0x01, 0x0E]).parse_method_signature()?;
/// assert!(sig.has_this);
/// assert_eq!(sig.params[0].base, TypeSignature::String);
/// # Ok::<(), dotemit::Error>(())
/// ```
///
/// A parser is consumed by one signature; the free `parse_*` functions wrap it.
pub struct SignatureParser<'a> {
    input: Parser<'a>,
    nesting: usize,
}

impl<'a> SignatureParser<'a> {
    /// Starts reading at the first byte of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        SignatureParser {
            input: Parser::new(data),
            nesting: 0,
        }
    }

    fn next_is(&self, tag: u8) -> Result<bool> {
        Ok(self.input.peek_byte()? == tag)
    }

    /// Consumes `tag` if it is the next byte
    fn take(&mut self, tag: u8) -> Result<bool> {
        if self.next_is(tag)? {
            self.input.advance_by(1)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn expect_header(&mut self, expected: u8, what: &str) -> Result<()> {
        let found = self.input.read_le::<u8>()?;
        if found != expected {
            return Err(malformed_error!(
                "{} signature must start with {:#04x}, found {:#04x}",
                what,
                expected,
                found
            ));
        }
        Ok(())
    }

    fn parse_type(&mut self) -> Result<TypeSignature<Token>> {
        if self.nesting + 1 >= MAX_NESTING {
            return Err(malformed_error!(
                "Signature nesting exceeds {} levels",
                MAX_NESTING
            ));
        }

        self.nesting += 1;
        let parsed = self.parse_type_at_depth();
        self.nesting -= 1;
        parsed
    }

    fn parse_type_at_depth(&mut self) -> Result<TypeSignature<Token>> {
        let tag = self.input.read_le::<u8>()?;
        if let Some(simple) = primitive(tag) {
            return Ok(simple);
        }

        let parsed = match tag {
            ELEMENT_TYPE::CLASS => TypeSignature::Class(self.input.read_compressed_token()?),
            ELEMENT_TYPE::VALUETYPE => {
                TypeSignature::ValueType(self.input.read_compressed_token()?)
            }
            ELEMENT_TYPE::VAR => TypeSignature::GenericParamType(self.input.read_compressed_uint()?),
            ELEMENT_TYPE::MVAR => {
                TypeSignature::GenericParamMethod(self.input.read_compressed_uint()?)
            }
            ELEMENT_TYPE::BYREF => TypeSignature::ByRef(Box::new(self.parse_type()?)),
            ELEMENT_TYPE::PINNED => TypeSignature::Pinned(Box::new(self.parse_type()?)),
            ELEMENT_TYPE::PTR => {
                let modifiers = self.parse_custom_mods()?;
                TypeSignature::Ptr(SignaturePointer {
                    modifiers,
                    base: Box::new(self.parse_type()?),
                })
            }
            ELEMENT_TYPE::SZARRAY => {
                let modifiers = self.parse_custom_mods()?;
                TypeSignature::SzArray(SignatureSzArray {
                    modifiers,
                    base: Box::new(self.parse_type()?),
                })
            }
            ELEMENT_TYPE::ARRAY => TypeSignature::Array(self.parse_array()?),
            ELEMENT_TYPE::GENERICINST => self.parse_generic_inst()?,
            ELEMENT_TYPE::FNPTR => TypeSignature::FnPtr(Box::new(self.parse_method_signature()?)),
            other => return Err(malformed_error!("Unknown element type {:#04x}", other)),
        };
        Ok(parsed)
    }

    /// `ARRAY Type Rank NumSizes Size* NumLoBounds LoBound*` (II.23.2.13)
    fn parse_array(&mut self) -> Result<SignatureArray<Token>> {
        let base = Box::new(self.parse_type()?);
        let rank = self.input.read_compressed_uint()?;

        let size_count = self.input.read_compressed_uint()?;
        let mut dimensions = (0..size_count)
            .map(|_| {
                Ok(ArrayDimensions {
                    size: Some(self.input.read_compressed_uint()?),
                    lower_bound: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let bound_count = self.input.read_compressed_uint()? as usize;
        for index in 0..bound_count {
            let bound = self.input.read_compressed_int()?;
            match dimensions.get_mut(index) {
                Some(dimension) => dimension.lower_bound = Some(bound),
                None => dimensions.push(ArrayDimensions {
                    size: None,
                    lower_bound: Some(bound),
                }),
            }
        }

        Ok(SignatureArray {
            base,
            rank,
            dimensions,
        })
    }

    fn parse_generic_inst(&mut self) -> Result<TypeSignature<Token>> {
        if !self.next_is(ELEMENT_TYPE::CLASS)? && !self.next_is(ELEMENT_TYPE::VALUETYPE)? {
            return Err(malformed_error!(
                "Generic instantiation of {:#04x}, expected CLASS or VALUETYPE",
                self.input.peek_byte()?
            ));
        }

        let open = self.parse_type()?;
        let arguments = self.parse_types()?;
        Ok(TypeSignature::GenericInst(Box::new(open), arguments))
    }

    /// A compressed count followed by that many types
    fn parse_types(&mut self) -> Result<Vec<TypeSignature<Token>>> {
        let count = self.input.read_compressed_uint()?;
        (0..count).map(|_| self.parse_type()).collect()
    }

    fn parse_custom_mods(&mut self) -> Result<Vec<CustomModifier<Token>>> {
        let mut modifiers = Vec::new();
        while self.input.has_more_data() {
            let is_required = match self.input.peek_byte()? {
                ELEMENT_TYPE::CMOD_REQD => true,
                ELEMENT_TYPE::CMOD_OPT => false,
                _ => break,
            };
            self.input.advance_by(1)?;
            modifiers.push(CustomModifier {
                is_required,
                modifier_type: self.input.read_compressed_token()?,
            });
        }
        Ok(modifiers)
    }

    /// `CustomMod* [BYREF] Type`, shared by parameters and the return type
    fn parse_param(&mut self) -> Result<SignatureParameter<Token>> {
        let modifiers = self.parse_custom_mods()?;
        let by_ref = self.take(ELEMENT_TYPE::BYREF)?;
        Ok(SignatureParameter {
            modifiers,
            by_ref,
            base: self.parse_type()?,
        })
    }

    /// Parses a `MethodDefSig`, `MethodRefSig` or `StandAloneMethodSig` (II.23.2.1 - II.23.2.3).
    ///
    /// Parameters after a `SENTINEL` land in `varargs`.
    ///
    /// # Errors
    /// Returns an error for a calling convention above `VARARG`, a truncated blob or an
    /// unknown element type.
    pub fn parse_method_signature(&mut self) -> Result<SignatureMethod<Token>> {
        let convention = self.input.read_le::<u8>()?;
        let kind = convention & CALLING_CONVENTION::KIND_MASK;
        if kind > CALLING_CONVENTION::VARARG {
            return Err(malformed_error!(
                "Unknown calling convention {:#04x}",
                convention
            ));
        }

        let param_count_generic = if convention & CALLING_CONVENTION::GENERIC == 0 {
            0
        } else {
            self.input.read_compressed_uint()?
        };
        let count = self.input.read_compressed_uint()?;
        let return_type = self.parse_param()?;

        let mut params = Vec::new();
        let mut varargs = Vec::new();
        for _ in 0..count {
            if varargs.is_empty() && self.take(ELEMENT_TYPE::SENTINEL)? {
                varargs.push(self.parse_param()?);
                continue;
            }
            let param = self.parse_param()?;
            if varargs.is_empty() {
                params.push(param);
            } else {
                varargs.push(param);
            }
        }

        Ok(SignatureMethod {
            has_this: convention & CALLING_CONVENTION::HASTHIS != 0,
            explicit_this: convention & CALLING_CONVENTION::EXPLICITTHIS != 0,
            vararg: kind == CALLING_CONVENTION::VARARG,
            cdecl: kind == CALLING_CONVENTION::C,
            stdcall: kind == CALLING_CONVENTION::STDCALL,
            thiscall: kind == CALLING_CONVENTION::THISCALL,
            fastcall: kind == CALLING_CONVENTION::FASTCALL,
            param_count_generic,
            return_type,
            params,
            varargs,
        })
    }

    /// Parses a `FieldSig` (II.23.2.4).
    ///
    /// # Errors
    /// Returns an error if the blob does not start with `FIELD` or its type is malformed.
    pub fn parse_field_signature(&mut self) -> Result<SignatureField<Token>> {
        self.expect_header(SIGNATURE_HEADER::FIELD, "Field")?;
        let modifiers = self.parse_custom_mods()?;
        Ok(SignatureField {
            modifiers,
            base: self.parse_type()?,
        })
    }

    /// Parses a `PropertySig` (II.23.2.5).
    ///
    /// # Errors
    /// Returns an error if the `PROPERTY` bit is missing or a type is malformed.
    pub fn parse_property_signature(&mut self) -> Result<SignatureProperty<Token>> {
        let header = self.input.read_le::<u8>()?;
        if header & SIGNATURE_HEADER::PROPERTY == 0 {
            return Err(malformed_error!(
                "Property signature header {:#04x} lacks the PROPERTY bit",
                header
            ));
        }

        let count = self.input.read_compressed_uint()?;
        let modifiers = self.parse_custom_mods()?;
        let base = self.parse_type()?;
        let params = (0..count)
            .map(|_| self.parse_param())
            .collect::<Result<Vec<_>>>()?;

        Ok(SignatureProperty {
            has_this: header & CALLING_CONVENTION::HASTHIS != 0,
            modifiers,
            base,
            params,
        })
    }

    /// Parses a `LocalVarSig` (II.23.2.6).
    ///
    /// # Errors
    /// Returns an error if the blob does not start with `LOCAL_SIG` or a local is malformed.
    pub fn parse_local_var_signature(&mut self) -> Result<SignatureLocalVariables<Token>> {
        self.expect_header(SIGNATURE_HEADER::LOCAL_SIG, "Local variable")?;

        let count = self.input.read_compressed_uint()?;
        let mut locals = Vec::with_capacity(count.min(0x1000) as usize);
        for _ in 0..count {
            locals.push(self.parse_local()?);
        }
        Ok(SignatureLocalVariables { locals })
    }

    /// `TYPEDBYREF | (CustomMod | PINNED)* [BYREF] Type` (II.23.2.9)
    fn parse_local(&mut self) -> Result<SignatureLocalVariable<Token>> {
        if self.take(ELEMENT_TYPE::TYPEDBYREF)? {
            return Ok(SignatureLocalVariable::new(TypeSignature::TypedByRef));
        }

        let mut modifiers = Vec::new();
        let mut is_pinned = false;
        while self.input.has_more_data() {
            if self.take(ELEMENT_TYPE::PINNED)? {
                is_pinned = true;
                continue;
            }
            let found = self.parse_custom_mods()?;
            if found.is_empty() {
                break;
            }
            modifiers.extend(found);
        }

        let is_byref = self.take(ELEMENT_TYPE::BYREF)?;
        Ok(SignatureLocalVariable {
            modifiers,
            is_byref,
            is_pinned,
            base: self.parse_type()?,
        })
    }

    /// Parses a `TypeSpec` blob, which is a bare type (II.23.2.14).
    ///
    /// # Errors
    /// Returns an error if the type is malformed.
    pub fn parse_type_spec_signature(&mut self) -> Result<SignatureTypeSpec<Token>> {
        Ok(SignatureTypeSpec {
            base: self.parse_type()?,
        })
    }

    /// Parses a `MethodSpec` instantiation (II.23.2.15).
    ///
    /// # Errors
    /// Returns an error if the blob does not start with `GENERICINST` or an argument is
    /// malformed.
    pub fn parse_method_spec_signature(&mut self) -> Result<SignatureMethodSpec<Token>> {
        self.expect_header(SIGNATURE_HEADER::GENERIC_INST, "Method instantiation")?;
        Ok(SignatureMethodSpec {
            generic_args: self.parse_types()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_type(bytes: &[u8]) -> Result<TypeSignature<Token>> {
        SignatureParser::new(bytes).parse_type()
    }

    #[test]
    fn standalone_element_types() {
        for tag in 0x01..=0x0E {
            assert!(parse_type(&[tag]).is_ok(), "tag {tag:#04x}");
        }
        assert_eq!(parse_type(&[0x1C]).unwrap(), TypeSignature::Object);
        assert_eq!(parse_type(&[0x19]).unwrap(), TypeSignature::U);
        assert!(parse_type(&[0x17]).is_err());
    }

    #[test]
    fn encoded_type_references() {
        // TypeSpec row 0x10, TypeRef row 0xD, TypeDef row 4
        assert_eq!(
            parse_type(&[0x12, 0x42]).unwrap(),
            TypeSignature::Class(Token::new(0x1B00_0010))
        );
        assert_eq!(
            parse_type(&[0x11, 0x35]).unwrap(),
            TypeSignature::ValueType(Token::new(0x0100_000D))
        );
        assert_eq!(
            parse_type(&[0x12, 0x10]).unwrap(),
            TypeSignature::Class(Token::new(0x0200_0004))
        );
        assert_eq!(parse_type(&[0x13, 0x02]).unwrap(), TypeSignature::GenericParamType(2));
    }

    #[test]
    fn multi_dimensional_array() {
        // int32[0...3, 5...] : rank 2, one size, two lower bounds
        let parsed = parse_type(&[0x14, 0x08, 0x02, 0x01, 0x04, 0x02, 0x00, 0x0A]).unwrap();
        let TypeSignature::Array(array) = parsed else {
            panic!("expected an array");
        };
        assert_eq!(array.rank, 2);
        assert_eq!(
            array.dimensions,
            vec![
                ArrayDimensions {
                    size: Some(4),
                    lower_bound: Some(0)
                },
                ArrayDimensions {
                    size: None,
                    lower_bound: Some(5)
                },
            ]
        );
    }

    #[test]
    fn generic_instantiation_needs_a_type() {
        assert_eq!(
            parse_type(&[0x15, 0x11, 0x05, 0x01, 0x0E]).unwrap(),
            TypeSignature::GenericInst(
                Box::new(TypeSignature::ValueType(Token::new(0x0100_0001))),
                vec![TypeSignature::String]
            )
        );
        assert!(parse_type(&[0x15, 0x0E, 0x01, 0x08]).is_err());
    }

    #[test]
    fn sentinel_splits_varargs() {
        // vararg int32 Sum(int32, ..., float64, float64)
        let sig = SignatureParser::new(&[0x05, 0x03, 0x08, 0x08, 0x41, 0x0D, 0x0D])
            .parse_method_signature()
            .unwrap();
        assert!(sig.vararg);
        assert_eq!(sig.params.len(), 1);
        assert_eq!(sig.varargs.len(), 2);
        assert_eq!(sig.varargs[1].base, TypeSignature::R8);
    }

    #[test]
    fn pinned_byref_local_and_typedbyref() {
        let sig = SignatureParser::new(&[0x07, 0x02, 0x45, 0x10, 0x05, 0x16])
            .parse_local_var_signature()
            .unwrap();
        assert!(sig.locals[0].is_pinned && sig.locals[0].is_byref);
        assert_eq!(sig.locals[0].base, TypeSignature::U1);
        assert_eq!(sig.locals[1].base, TypeSignature::TypedByRef);
    }

    #[test]
    fn nesting_limit() {
        let mut deep = vec![ELEMENT_TYPE::PTR; 64];
        deep.push(ELEMENT_TYPE::I4);
        assert!(parse_type(&deep).is_err());

        let mut shallow = vec![ELEMENT_TYPE::PTR; 10];
        shallow.push(ELEMENT_TYPE::I4);
        assert!(parse_type(&shallow).is_ok());
    }

    #[test]
    fn wrong_headers() {
        assert!(SignatureParser::new(&[0x07, 0x08]).parse_field_signature().is_err());
        assert!(SignatureParser::new(&[0x06, 0x00]).parse_local_var_signature().is_err());
        assert!(SignatureParser::new(&[0x01, 0x08]).parse_method_spec_signature().is_err());
        assert!(SignatureParser::new(&[0x00, 0x00, 0x08]).parse_property_signature().is_err());
        assert!(SignatureParser::new(&[0x09, 0x00, 0x01]).parse_method_signature().is_err());
    }
}
