//! Encoding and decoding of CIL method bodies.
//!
//! A body is a method header, the instruction stream and, when the method has protected
//! regions, an exception section 4-byte aligned after the code (ECMA-335 II.25.4).
//!
//! - **Tiny header**: one byte, `(code_size << 2) | 0x2`. Only for bodies with less than 64 bytes
//!   of code, a max stack of at most 8, no locals and no exception regions.
//! - **Fat header**: 12 bytes, flags and header size in 3 dwords, max stack, code size and the
//!   `StandAloneSig` token of the local variable signature.
//!
//! The instruction stream is opaque here; only its length and the label offsets inside it
//! matter.
//!
//! # Examples
//!
//! ```rust
//! use dotemit::metadata::{
//!     method::{CodeRegion, ExceptionRegion, Handler, HandlerKind, MethodBody, RawMethodBody},
//!     signatures::resolve_token,
//!     token::Token,
//! };
//!
//! let mut body = MethodBody::<Token>::new(vec![0x00; 12], 2);
//! let try_start = body.label_at(0);
//! let try_end = body.label_at(10);
//! let handler_end = body.label_at(12);
//! body.regions.push(ExceptionRegion::new(
//!     CodeRegion { start: try_start, end: try_end },
//!     Handler {
//!         kind: HandlerKind::Catch(Token::new(0x0100_0001)),
//!         body: CodeRegion { start: try_end, end: handler_end },
//!     },
//! ));
//!
//! let encoded = body.encode("Program::Main", Token::new(0), &resolve_token)?;
//! let parsed = RawMethodBody::from(&encoded.bytes)?;
//! assert!(parsed.is_fat);
//! assert!(!parsed.is_fat_section);
//! assert_eq!(parsed.exception_handlers.len(), 1);
//! # Ok::<(), dotemit::Error>(())
//! ```

use log::warn;

use crate::{
    file::io::{read_le, write_le},
    metadata::{
        method::{
            needs_fat_section, read_exception_sections, write_exception_section, ExceptionHandler,
            ExceptionRegion, Label, LabelMap, MethodBodyFlags,
        },
        signatures::SignatureLocalVariable,
        token::Token,
    },
    utils::to_u32,
    Error::OutOfBounds,
    Result,
};

/// Largest code size a tiny header can describe
pub const MAX_TINY_CODE_SIZE: usize = 63;
/// Largest max stack a tiny header implies
pub const MAX_TINY_STACK: u16 = 8;
/// Size of a fat header in bytes
pub const FAT_HEADER_SIZE: usize = 12;

/// A method body ready to be encoded.
///
/// `R` is how catch types and local variable types refer to type rows, see
/// [`crate::metadata::signatures`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody<R> {
    /// The instruction stream
    pub code: Vec<u8>,
    /// Maximum number of items on the operand stack
    pub max_stack: u16,
    /// Zero-initialize locals on entry
    pub init_locals: bool,
    /// Local variables; emitted as a `StandAloneSig` when not empty
    pub locals: Vec<SignatureLocalVariable<R>>,
    /// Protected regions, in the order their clauses are written
    pub regions: Vec<ExceptionRegion<R>>,
    labels: Vec<Option<u32>>,
}

/// The bytes of an encoded body and the layout decisions taken for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    /// Header, code and exception section
    pub bytes: Vec<u8>,
    /// Whether the fat header was used
    pub is_fat: bool,
    /// Whether the exception section used the fat layout
    pub is_fat_section: bool,
}

impl<R> MethodBody<R> {
    /// A body without locals or regions
    #[must_use]
    pub fn new(code: Vec<u8>, max_stack: u16) -> Self {
        MethodBody {
            code,
            max_stack,
            init_locals: true,
            locals: Vec::new(),
            regions: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Define a new, unmarked label
    #[allow(clippy::cast_possible_truncation)] // a body never holds 2^32 labels
    pub fn define_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() as u32 - 1)
    }

    /// Place `label` at byte `offset` of the instruction stream.
    ///
    /// # Errors
    /// Returns an error if the label was not defined by this body.
    pub fn mark_label(&mut self, label: Label, offset: u32) -> Result<()> {
        match self.labels.get_mut(label.0 as usize) {
            Some(slot) => {
                *slot = Some(offset);
                Ok(())
            }
            None => Err(malformed_error!("Label {} is not defined", label.0)),
        }
    }

    /// Define a label and mark it at `offset`
    #[allow(clippy::cast_possible_truncation)]
    pub fn label_at(&mut self, offset: u32) -> Label {
        self.labels.push(Some(offset));
        Label(self.labels.len() as u32 - 1)
    }

    /// The offset of `label`, if marked
    #[must_use]
    pub fn label_offset(&self, label: Label) -> Option<u32> {
        self.labels.get(label.0 as usize).copied().flatten()
    }

    /// Returns true if this body needs the fat header.
    #[must_use]
    pub fn needs_fat_header(&self) -> bool {
        self.code.len() > MAX_TINY_CODE_SIZE
            || self.max_stack > MAX_TINY_STACK
            || !self.locals.is_empty()
            || !self.regions.is_empty()
    }

    /// Resolve every region of this body into clauses and decide the section layout.
    ///
    /// The layout is decided once, before anything is written: fat if any region is fat or the
    /// clause count exceeds what a tiny section can hold.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedRegion`] for regions without handlers or with labels
    /// that do not resolve inside the instruction stream.
    pub fn clauses<F>(&self, method: &str, resolve: &F) -> Result<(Vec<ExceptionHandler>, bool)>
    where
        F: Fn(&R) -> Result<Token>,
    {
        let labels = LabelMap {
            offsets: &self.labels,
            code_length: to_u32(self.code.len())?,
            method,
        };

        let mut clauses = Vec::new();
        let mut fat = false;
        for region in &self.regions {
            fat |= region.is_fat(&labels)?;
            clauses.extend(region.clauses(&labels, resolve)?);
        }

        let fat = fat || needs_fat_section(&clauses);
        Ok((clauses, fat))
    }

    /// Encode header, code and exception section.
    ///
    /// `local_var_sig` is the `StandAloneSig` token of the locals, or a null token when the
    /// body has none.
    ///
    /// # Errors
    /// Returns an error for malformed regions, catch types `resolve` cannot turn into tokens,
    /// and code sizes that overflow 32 bits.
    #[allow(clippy::cast_possible_truncation)] // tiny code size is checked against 63
    pub fn encode<F>(&self, method: &str, local_var_sig: Token, resolve: &F) -> Result<EncodedBody>
    where
        F: Fn(&R) -> Result<Token>,
    {
        let code_size = to_u32(self.code.len())?;
        let mut bytes = Vec::with_capacity(FAT_HEADER_SIZE + self.code.len());

        if !self.needs_fat_header() {
            bytes.push(((code_size as u8) << 2) | MethodBodyFlags::TINY_FORMAT.bits() as u8);
            bytes.extend_from_slice(&self.code);
            return Ok(EncodedBody {
                bytes,
                is_fat: false,
                is_fat_section: false,
            });
        }

        if self.max_stack > MAX_TINY_STACK
            && self.code.len() <= MAX_TINY_CODE_SIZE
            && self.locals.is_empty()
            && self.regions.is_empty()
        {
            warn!(
                "{} needs a fat header only for its max stack of {}",
                method, self.max_stack
            );
        }

        let (clauses, is_fat_section) = self.clauses(method, resolve)?;

        let mut flags = MethodBodyFlags::FAT_FORMAT;
        if self.init_locals {
            flags |= MethodBodyFlags::INIT_LOCALS;
        }
        if !clauses.is_empty() {
            flags |= MethodBodyFlags::MORE_SECTS;
        }

        let header_dwords = (FAT_HEADER_SIZE / 4) as u16;
        write_le::<u16>(&mut bytes, flags.bits() | (header_dwords << 12));
        write_le::<u16>(&mut bytes, self.max_stack);
        write_le::<u32>(&mut bytes, code_size);
        write_le::<u32>(&mut bytes, local_var_sig.value());
        bytes.extend_from_slice(&self.code);

        if !clauses.is_empty() {
            crate::utils::pad_to(&mut bytes, 4, 0);
            write_exception_section(&clauses, is_fat_section, &mut bytes)?;
        }

        Ok(EncodedBody {
            bytes,
            is_fat: true,
            is_fat_section,
        })
    }

    /// Convert catch and local types with `map`.
    ///
    /// # Errors
    /// Returns the first error `map` returns.
    pub fn try_map<S, F>(&self, map: &mut F) -> Result<MethodBody<S>>
    where
        F: FnMut(&R) -> Result<S>,
    {
        Ok(MethodBody {
            code: self.code.clone(),
            max_stack: self.max_stack,
            init_locals: self.init_locals,
            locals: self
                .locals
                .iter()
                .map(|local| local.try_map(map))
                .collect::<Result<Vec<_>>>()?,
            regions: self
                .regions
                .iter()
                .map(|region| region.try_map(map))
                .collect::<Result<Vec<_>>>()?,
            labels: self.labels.clone(),
        })
    }
}

/// A method body parsed back from its bytes.
///
/// This is what round-trip tests compare an encoded [`MethodBody`] against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMethodBody {
    /// Size of the method (length of all instructions, not counting the header) in bytes
    pub size_code: usize,
    /// Size of the method header in bytes
    pub size_header: usize,
    /// `MetaData` token for a signature describing the layout of the local variables for the method. 0 == no local variables
    pub local_var_sig_token: u32,
    /// Maximum number of items on the operand stack
    pub max_stack: usize,
    /// Flag, indicating the type of the method header
    pub is_fat: bool,
    /// Flag, indicating to call default constructor on all local variables
    pub is_init_local: bool,
    /// Flag, indicating the exception section used the fat layout
    pub is_fat_section: bool,
    /// A list of exception handlers this method has
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl RawMethodBody {
    /// Parse a method body from the start of `data`.
    ///
    /// # Errors
    /// Returns an error if the data is empty, out of bounds, or malformed.
    pub fn from(data: &[u8]) -> Result<RawMethodBody> {
        if data.is_empty() {
            return Err(malformed_error!("Provided data for body parsing is empty"));
        }

        let first_byte = read_le::<u8>(data)?;
        match MethodBodyFlags::from_bits_truncate(u16::from(first_byte & 0b_00000011_u8)) {
            MethodBodyFlags::TINY_FORMAT => {
                let size_code = (first_byte >> 2) as usize;
                if size_code + 1 > data.len() {
                    return Err(OutOfBounds);
                }

                Ok(RawMethodBody {
                    size_code,
                    size_header: 1,
                    local_var_sig_token: 0,
                    max_stack: MAX_TINY_STACK as usize,
                    is_fat: false,
                    is_init_local: false,
                    is_fat_section: false,
                    exception_handlers: Vec::new(),
                })
            }
            MethodBodyFlags::FAT_FORMAT => {
                if data.len() < FAT_HEADER_SIZE {
                    return Err(OutOfBounds);
                }

                let first_duo = read_le::<u16>(data)?;
                let size_header = ((first_duo >> 12) * 4) as usize;
                let size_code = read_le::<u32>(&data[4..])? as usize;
                if data.len() < size_code + size_header {
                    return Err(OutOfBounds);
                }

                let flags_header =
                    MethodBodyFlags::from_bits_truncate(first_duo & 0b_0000111111111111_u16);

                let (exception_handlers, is_fat_section) =
                    if flags_header.contains(MethodBodyFlags::MORE_SECTS) {
                        let cursor = (size_header + size_code + 3) & !3;
                        read_exception_sections(data, cursor)?
                    } else {
                        (Vec::new(), false)
                    };

                Ok(RawMethodBody {
                    size_code,
                    size_header,
                    local_var_sig_token: read_le::<u32>(&data[8..])?,
                    max_stack: read_le::<u16>(&data[2..])? as usize,
                    is_fat: true,
                    is_init_local: flags_header.contains(MethodBodyFlags::INIT_LOCALS),
                    is_fat_section,
                    exception_handlers,
                })
            }
            _ => Err(malformed_error!(
                "MethodHeader is neither FAT nor TINY - {}",
                first_byte
            )),
        }
    }

    /// Get the full size of this method, without its exception section
    #[must_use]
    pub fn size(&self) -> usize {
        self.size_code + self.size_header
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        method::{CodeRegion, ExceptionHandlerFlags, Handler, HandlerKind},
        signatures::{resolve_token, TypeSignature},
    };

    fn catch_region(body: &mut MethodBody<Token>, try_len: u32, handler_len: u32) {
        let start = body.label_at(0);
        let middle = body.label_at(try_len);
        let end = body.label_at(try_len + handler_len);
        body.regions.push(ExceptionRegion::new(
            CodeRegion { start, end: middle },
            Handler {
                kind: HandlerKind::Catch(Token::new(0x0100_0003)),
                body: CodeRegion { start: middle, end },
            },
        ));
    }

    #[test]
    fn tiny() {
        let body = MethodBody::<Token>::new(vec![0x16, 0x2A], 1);
        let encoded = body.encode("M", Token::new(0), &resolve_token).unwrap();

        assert!(!encoded.is_fat);
        assert_eq!(encoded.bytes, vec![0x0A, 0x16, 0x2A]);

        let parsed = RawMethodBody::from(&encoded.bytes).unwrap();
        assert!(!parsed.is_fat);
        assert_eq!(parsed.size_code, 2);
        assert_eq!(parsed.size(), 3);
    }

    #[test]
    fn tiny_limits() {
        assert!(!MethodBody::<Token>::new(vec![0; 63], 8).needs_fat_header());
        assert!(MethodBody::<Token>::new(vec![0; 64], 8).needs_fat_header());
        assert!(MethodBody::<Token>::new(vec![0; 1], 9).needs_fat_header());

        let mut with_locals = MethodBody::new(vec![0x2A], 1);
        with_locals
            .locals
            .push(SignatureLocalVariable::new(TypeSignature::<Token>::I4));
        assert!(with_locals.needs_fat_header());
    }

    #[test]
    fn fat_header() {
        let mut body = MethodBody::new(vec![0x00; 70], 5);
        body.locals
            .push(SignatureLocalVariable::new(TypeSignature::<Token>::I4));
        let encoded = body
            .encode("M", Token::new(0x1100_0001), &resolve_token)
            .unwrap();

        assert!(encoded.is_fat);
        // FAT_FORMAT | INIT_LOCALS, 3 dwords
        assert_eq!(&encoded.bytes[..2], &[0x13, 0x30]);
        assert_eq!(encoded.bytes.len(), 12 + 70);

        let parsed = RawMethodBody::from(&encoded.bytes).unwrap();
        assert!(parsed.is_fat);
        assert!(parsed.is_init_local);
        assert_eq!(parsed.max_stack, 5);
        assert_eq!(parsed.size_code, 70);
        assert_eq!(parsed.size_header, 12);
        assert_eq!(parsed.local_var_sig_token, 0x1100_0001);
        assert!(parsed.exception_handlers.is_empty());
    }

    #[test]
    fn tiny_exception_section() {
        let mut body = MethodBody::new(vec![0x00; 13], 2);
        catch_region(&mut body, 10, 3);
        let encoded = body.encode("M", Token::new(0), &resolve_token).unwrap();

        assert!(encoded.is_fat);
        assert!(!encoded.is_fat_section);
        // header 12 + code 13, aligned to 28, section 4 + 12
        assert_eq!(encoded.bytes.len(), 28 + 16);
        assert_eq!(encoded.bytes[28], 0x01);

        let parsed = RawMethodBody::from(&encoded.bytes).unwrap();
        assert!(!parsed.is_fat_section);
        assert_eq!(
            parsed.exception_handlers,
            vec![ExceptionHandler {
                flags: ExceptionHandlerFlags::EXCEPTION,
                try_offset: 0,
                try_length: 10,
                handler_offset: 10,
                handler_length: 3,
                class_token: Token::new(0x0100_0003),
                filter_offset: 0,
            }]
        );
    }

    #[test]
    fn region_fatness_boundary() {
        let mut tiny = MethodBody::new(vec![0x00; 260], 2);
        catch_region(&mut tiny, 255, 5);
        assert!(!tiny.clauses("M", &resolve_token).unwrap().1);

        let mut fat = MethodBody::new(vec![0x00; 261], 2);
        catch_region(&mut fat, 256, 5);
        let encoded = fat.encode("M", Token::new(0), &resolve_token).unwrap();
        assert!(encoded.is_fat_section);

        let parsed = RawMethodBody::from(&encoded.bytes).unwrap();
        assert!(parsed.is_fat_section);
        assert_eq!(parsed.exception_handlers[0].try_length, 256);
    }

    #[test]
    fn unmarked_label() {
        let mut body = MethodBody::<Token>::new(vec![0x00; 8], 1);
        let start = body.label_at(0);
        let end = body.define_label();
        body.regions.push(ExceptionRegion::new(
            CodeRegion { start, end },
            Handler {
                kind: HandlerKind::Finally,
                body: CodeRegion { start, end },
            },
        ));

        assert!(matches!(
            body.encode("M", Token::new(0), &resolve_token),
            Err(crate::Error::MalformedRegion { .. })
        ));

        body.mark_label(end, 4).unwrap();
        assert_eq!(body.label_offset(end), Some(4));
        assert!(body.mark_label(Label(7), 1).is_err());
    }

    #[test]
    fn invalid() {
        assert!(RawMethodBody::from(&[]).is_err());
        assert!(RawMethodBody::from(&[0x01]).is_err());
        // Tiny header announcing 2 bytes of code, only 1 present
        assert!(RawMethodBody::from(&[0x0A, 0x00]).is_err());
    }
}
