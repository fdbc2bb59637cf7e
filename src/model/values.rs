//! Constant values, custom attributes and security declarations.
//!
//! Constant blobs (ECMA-335 II.22.9) hold the little-endian value of a primitive, a UTF-16
//! string, or four zero bytes for a null reference. Custom attribute blobs (II.23.3) start
//! with the prolog `0x0001`, followed by the fixed constructor arguments, a 2-byte count and
//! the named field/property arguments.

use widestring::U16String;

use crate::{
    emit::MetadataBuilder,
    metadata::signatures::ELEMENT_TYPE,
    model::handles::MethodHandle,
    utils::{to_u32, write_compressed_uint},
    Error, Result,
};

/// Value of a `Constant` row
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    /// `bool`
    Bool(bool),
    /// `char`, a single UTF-16 code unit
    Char(char),
    /// `sbyte`
    I1(i8),
    /// `byte`
    U1(u8),
    /// `short`
    I2(i16),
    /// `ushort`
    U2(u16),
    /// `int`
    I4(i32),
    /// `uint`
    U4(u32),
    /// `long`
    I8(i64),
    /// `ulong`
    U8(u64),
    /// `float`
    R4(f32),
    /// `double`
    R8(f64),
    /// A string, stored as UTF-16
    String(String),
    /// The null reference
    Null,
}

impl ConstantValue {
    /// The element type written into the `Type` column
    #[must_use]
    pub fn element_type(&self) -> u8 {
        match self {
            ConstantValue::Bool(_) => ELEMENT_TYPE::BOOLEAN,
            ConstantValue::Char(_) => ELEMENT_TYPE::CHAR,
            ConstantValue::I1(_) => ELEMENT_TYPE::I1,
            ConstantValue::U1(_) => ELEMENT_TYPE::U1,
            ConstantValue::I2(_) => ELEMENT_TYPE::I2,
            ConstantValue::U2(_) => ELEMENT_TYPE::U2,
            ConstantValue::I4(_) => ELEMENT_TYPE::I4,
            ConstantValue::U4(_) => ELEMENT_TYPE::U4,
            ConstantValue::I8(_) => ELEMENT_TYPE::I8,
            ConstantValue::U8(_) => ELEMENT_TYPE::U8,
            ConstantValue::R4(_) => ELEMENT_TYPE::R4,
            ConstantValue::R8(_) => ELEMENT_TYPE::R8,
            ConstantValue::String(_) => ELEMENT_TYPE::STRING,
            ConstantValue::Null => ELEMENT_TYPE::CLASS,
        }
    }

    /// Add the value blob to the heap of `builder` and return its offset.
    ///
    /// # Errors
    /// Returns [`Error::PhaseOrder`] after registration, or [`Error::FormatOverflow`] for a
    /// character outside the basic multilingual plane.
    #[allow(clippy::cast_sign_loss)] // two's complement bytes are the wire format
    pub fn intern(&self, builder: &mut MetadataBuilder) -> Result<u32> {
        let blobs = builder.blobs_mut()?;
        match self {
            ConstantValue::Bool(value) => blobs.add_u64(u64::from(*value), 1),
            ConstantValue::Char(value) => blobs.add_char(*value),
            ConstantValue::I1(value) => blobs.add_u64(*value as u8 as u64, 1),
            ConstantValue::U1(value) => blobs.add_u64(u64::from(*value), 1),
            ConstantValue::I2(value) => blobs.add_u64(*value as u16 as u64, 2),
            ConstantValue::U2(value) => blobs.add_u64(u64::from(*value), 2),
            ConstantValue::I4(value) => blobs.add_u64(*value as u32 as u64, 4),
            ConstantValue::U4(value) => blobs.add_u64(u64::from(*value), 4),
            ConstantValue::I8(value) => blobs.add_u64(*value as u64, 8),
            ConstantValue::U8(value) => blobs.add_u64(*value, 8),
            ConstantValue::R4(value) => blobs.add_f32(*value),
            ConstantValue::R8(value) => blobs.add_f64(*value),
            ConstantValue::String(value) => {
                let bytes = U16String::from_str(value)
                    .as_slice()
                    .iter()
                    .flat_map(|unit| unit.to_le_bytes())
                    .collect::<Vec<u8>>();
                blobs.add(&bytes)
            }
            ConstantValue::Null => blobs.add_u64(0, 4),
        }
    }
}

/// `CorSerializationType` tags of custom attribute named arguments (II.23.3)
#[allow(non_snake_case, missing_docs)]
pub mod SERIALIZATION_TYPE {
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0A;
    pub const U8: u8 = 0x0B;
    pub const R4: u8 = 0x0C;
    pub const R8: u8 = 0x0D;
    pub const STRING: u8 = 0x0E;
    pub const SZARRAY: u8 = 0x1D;
    pub const TYPE: u8 = 0x50;
    pub const TAGGED_OBJECT: u8 = 0x51;
    pub const FIELD: u8 = 0x53;
    pub const PROPERTY: u8 = 0x54;
    pub const ENUM: u8 = 0x55;
}

/// One argument value of a custom attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeArgument {
    /// `bool`
    Bool(bool),
    /// `char`
    Char(char),
    /// `sbyte`
    I1(i8),
    /// `byte`
    U1(u8),
    /// `short`
    I2(i16),
    /// `ushort`
    U2(u16),
    /// `int`
    I4(i32),
    /// `uint`
    U4(u32),
    /// `long`
    I8(i64),
    /// `ulong`
    U8(u64),
    /// `float`
    R4(f32),
    /// `double`
    R8(f64),
    /// A string, `None` for null
    String(Option<String>),
    /// A `System.Type`, as its assembly qualified name, `None` for null
    Type(Option<String>),
    /// An enum value: the enum's assembly qualified name and its underlying value
    Enum(String, Box<AttributeArgument>),
    /// A single-dimensional array; the element kind is taken from the first element
    Array(Vec<AttributeArgument>),
}

fn write_ser_string(value: Option<&str>, out: &mut Vec<u8>) -> Result<()> {
    match value {
        None => out.push(0xFF),
        Some(value) => {
            write_compressed_uint(to_u32(value.len())?, out)?;
            out.extend_from_slice(value.as_bytes());
        }
    }
    Ok(())
}

impl AttributeArgument {
    /// Append the `FieldOrPropType` of this argument
    fn write_type(&self, out: &mut Vec<u8>) -> Result<()> {
        let tag = match self {
            AttributeArgument::Bool(_) => SERIALIZATION_TYPE::BOOLEAN,
            AttributeArgument::Char(_) => SERIALIZATION_TYPE::CHAR,
            AttributeArgument::I1(_) => SERIALIZATION_TYPE::I1,
            AttributeArgument::U1(_) => SERIALIZATION_TYPE::U1,
            AttributeArgument::I2(_) => SERIALIZATION_TYPE::I2,
            AttributeArgument::U2(_) => SERIALIZATION_TYPE::U2,
            AttributeArgument::I4(_) => SERIALIZATION_TYPE::I4,
            AttributeArgument::U4(_) => SERIALIZATION_TYPE::U4,
            AttributeArgument::I8(_) => SERIALIZATION_TYPE::I8,
            AttributeArgument::U8(_) => SERIALIZATION_TYPE::U8,
            AttributeArgument::R4(_) => SERIALIZATION_TYPE::R4,
            AttributeArgument::R8(_) => SERIALIZATION_TYPE::R8,
            AttributeArgument::String(_) => SERIALIZATION_TYPE::STRING,
            AttributeArgument::Type(_) => SERIALIZATION_TYPE::TYPE,
            AttributeArgument::Enum(name, _) => {
                out.push(SERIALIZATION_TYPE::ENUM);
                return write_ser_string(Some(name), out);
            }
            AttributeArgument::Array(values) => {
                let Some(first) = values.first() else {
                    return Err(malformed_error!(
                        "Element type of an empty attribute array is unknown"
                    ));
                };
                out.push(SERIALIZATION_TYPE::SZARRAY);
                return first.write_type(out);
            }
        };

        out.push(tag);
        Ok(())
    }

    /// Append the value of this argument
    #[allow(clippy::cast_sign_loss)]
    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            AttributeArgument::Bool(value) => out.push(u8::from(*value)),
            AttributeArgument::Char(value) => {
                let unit = u16::try_from(u32::from(*value)).map_err(|_| Error::FormatOverflow {
                    what: "char attribute argument",
                    value: u64::from(u32::from(*value)),
                    max: u64::from(u16::MAX),
                })?;
                out.extend_from_slice(&unit.to_le_bytes());
            }
            AttributeArgument::I1(value) => out.push(*value as u8),
            AttributeArgument::U1(value) => out.push(*value),
            AttributeArgument::I2(value) => out.extend_from_slice(&value.to_le_bytes()),
            AttributeArgument::U2(value) => out.extend_from_slice(&value.to_le_bytes()),
            AttributeArgument::I4(value) => out.extend_from_slice(&value.to_le_bytes()),
            AttributeArgument::U4(value) => out.extend_from_slice(&value.to_le_bytes()),
            AttributeArgument::I8(value) => out.extend_from_slice(&value.to_le_bytes()),
            AttributeArgument::U8(value) => out.extend_from_slice(&value.to_le_bytes()),
            AttributeArgument::R4(value) => out.extend_from_slice(&value.to_le_bytes()),
            AttributeArgument::R8(value) => out.extend_from_slice(&value.to_le_bytes()),
            AttributeArgument::String(value) | AttributeArgument::Type(value) => {
                write_ser_string(value.as_deref(), out)?;
            }
            AttributeArgument::Enum(_, value) => value.write_value(out)?,
            AttributeArgument::Array(values) => {
                out.extend_from_slice(&to_u32(values.len())?.to_le_bytes());
                for value in values {
                    value.write_value(out)?;
                }
            }
        }
        Ok(())
    }
}

/// A named field or property argument of a custom attribute
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArgument {
    /// Whether a field (`true`) or a property (`false`) is set
    pub is_field: bool,
    /// Name of the field or property
    pub name: String,
    /// The value
    pub value: AttributeArgument,
}

/// A custom attribute attached to an entity
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttribute {
    /// The attribute constructor
    pub constructor: MethodHandle,
    /// Constructor arguments, in parameter order
    pub fixed: Vec<AttributeArgument>,
    /// Field and property assignments
    pub named: Vec<NamedArgument>,
}

impl CustomAttribute {
    /// An attribute invoking `constructor` without arguments
    #[must_use]
    pub fn new(constructor: MethodHandle) -> Self {
        CustomAttribute {
            constructor,
            fixed: Vec::new(),
            named: Vec::new(),
        }
    }

    /// Add a constructor argument
    #[must_use]
    pub fn arg(mut self, value: AttributeArgument) -> Self {
        self.fixed.push(value);
        self
    }

    /// Add a named property assignment
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, value: AttributeArgument) -> Self {
        self.named.push(NamedArgument {
            is_field: false,
            name: name.into(),
            value,
        });
        self
    }

    /// Add a named field assignment
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: AttributeArgument) -> Self {
        self.named.push(NamedArgument {
            is_field: true,
            name: name.into(),
            value,
        });
        self
    }

    /// Encode the value blob.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] for an empty array in a named argument, or
    /// [`Error::FormatOverflow`] if a count does not fit its field.
    pub fn encode_value(&self) -> Result<Vec<u8>> {
        let mut blob = vec![0x01, 0x00];
        for argument in &self.fixed {
            argument.write_value(&mut blob)?;
        }

        let count = u16::try_from(self.named.len()).map_err(|_| Error::FormatOverflow {
            what: "named attribute argument count",
            value: self.named.len() as u64,
            max: u64::from(u16::MAX),
        })?;
        blob.extend_from_slice(&count.to_le_bytes());

        for named in &self.named {
            blob.push(if named.is_field {
                SERIALIZATION_TYPE::FIELD
            } else {
                SERIALIZATION_TYPE::PROPERTY
            });
            named.value.write_type(&mut blob)?;
            write_ser_string(Some(&named.name), &mut blob)?;
            named.value.write_value(&mut blob)?;
        }

        Ok(blob)
    }
}

/// A `DeclSecurity` row: a security action and its serialized permission set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityDeclaration {
    /// The `SecurityAction` value
    pub action: u16,
    /// The permission set blob, XML or the binary `.` format
    pub permission_set: Vec<u8>,
}
