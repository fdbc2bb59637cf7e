//! Labels and protected regions of a method body.
//!
//! Regions are described with labels instead of raw offsets so a body can be assembled before
//! its final layout is known. Each [`ExceptionRegion`] is one try range with one or more
//! handlers; when encoded, every handler becomes one clause that repeats the try range.
//!
//! A region is fat when any of its ranges overflows the tiny clause fields: a span longer than
//! 255 bytes or a start beyond `0xFFFF`. Fatness belongs to the whole region because its
//! clauses share one try range and are written in one section layout.

use crate::{
    metadata::{
        method::{ExceptionHandler, ExceptionHandlerFlags},
        token::Token,
    },
    Error, Result,
};

/// A position in the instruction stream, defined before its offset is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub(crate) u32);

impl Label {
    /// Index of this label within its body
    #[must_use]
    pub fn index(&self) -> u32 {
        self.0
    }
}

/// A half-open range of the instruction stream, `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeRegion {
    /// First byte of the range
    pub start: Label,
    /// One past the last byte of the range
    pub end: Label,
}

/// What a handler does
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HandlerKind<R> {
    /// Catches exceptions of the given type
    Catch(R),
    /// Runs the filter code at the label to decide whether to handle
    Filter(Label),
    /// Always runs when leaving the try range
    Finally,
    /// Runs only when leaving the try range through an exception
    Fault,
}

/// One handler attached to a protected range
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handler<R> {
    /// What the handler does
    pub kind: HandlerKind<R>,
    /// The handler code
    pub body: CodeRegion,
}

/// A protected range and its handlers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExceptionRegion<R> {
    /// The protected range
    pub try_block: CodeRegion,
    /// Handlers, at least one
    pub handlers: Vec<Handler<R>>,
}

/// Offset and length of a resolved range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    /// Byte offset of the range start
    pub offset: u32,
    /// Length in bytes
    pub length: u32,
}

impl ResolvedRange {
    /// Returns true if the range does not fit the tiny clause fields.
    #[must_use]
    pub fn is_fat(&self) -> bool {
        self.length > 0xFF || self.offset > 0xFFFF
    }
}

/// Label offsets of a body, used to resolve regions.
pub struct LabelMap<'a> {
    /// Offset per label index, `None` while unmarked
    pub offsets: &'a [Option<u32>],
    /// Length of the instruction stream
    pub code_length: u32,
    /// Name of the method, for diagnostics
    pub method: &'a str,
}

impl LabelMap<'_> {
    fn malformed(&self, reason: String) -> Error {
        Error::MalformedRegion {
            method: self.method.to_string(),
            reason,
        }
    }

    /// The offset of `label`.
    ///
    /// # Errors
    /// Returns [`Error::MalformedRegion`] if the label is unknown, unmarked or beyond the end of
    /// the instruction stream.
    pub fn offset(&self, label: Label) -> Result<u32> {
        match self.offsets.get(label.0 as usize) {
            Some(Some(offset)) if *offset <= self.code_length => Ok(*offset),
            Some(Some(offset)) => Err(self.malformed(format!(
                "label {} at {} is beyond the code length {}",
                label.0, offset, self.code_length
            ))),
            Some(None) => Err(self.malformed(format!("label {} is never marked", label.0))),
            None => Err(self.malformed(format!("label {} is not defined", label.0))),
        }
    }

    /// Resolve a range into offset and length.
    ///
    /// # Errors
    /// Returns [`Error::MalformedRegion`] for unresolved labels and inverted or empty ranges.
    pub fn resolve(&self, region: &CodeRegion) -> Result<ResolvedRange> {
        let start = self.offset(region.start)?;
        let end = self.offset(region.end)?;
        if end <= start {
            return Err(self.malformed(format!(
                "range {}..{} is empty or inverted",
                start, end
            )));
        }

        Ok(ResolvedRange {
            offset: start,
            length: end - start,
        })
    }
}

impl<R> ExceptionRegion<R> {
    /// A region protecting `try_block` with a single handler
    #[must_use]
    pub fn new(try_block: CodeRegion, handler: Handler<R>) -> Self {
        ExceptionRegion {
            try_block,
            handlers: vec![handler],
        }
    }

    /// Returns true if this region must be encoded with fat clauses.
    ///
    /// The try range and every handler range are checked; one fat range makes the whole region
    /// fat.
    ///
    /// # Errors
    /// Returns [`Error::MalformedRegion`] if the region has no handlers or a range does not
    /// resolve.
    pub fn is_fat(&self, labels: &LabelMap<'_>) -> Result<bool> {
        if self.handlers.is_empty() {
            return Err(labels.malformed("region has no handlers".to_string()));
        }

        let mut fat = labels.resolve(&self.try_block)?.is_fat();
        for handler in &self.handlers {
            fat |= labels.resolve(&handler.body)?.is_fat();
            if let HandlerKind::Filter(filter) = handler.kind {
                fat |= labels.offset(filter)? > 0xFFFF;
            }
        }

        Ok(fat)
    }

    /// Resolve this region into one clause per handler.
    ///
    /// # Errors
    /// Returns [`Error::MalformedRegion`] for unresolvable ranges, or the error of `resolve`
    /// for a catch type that cannot be turned into a token.
    pub fn clauses<F>(&self, labels: &LabelMap<'_>, resolve: &F) -> Result<Vec<ExceptionHandler>>
    where
        F: Fn(&R) -> Result<Token>,
    {
        if self.handlers.is_empty() {
            return Err(labels.malformed("region has no handlers".to_string()));
        }

        let try_range = labels.resolve(&self.try_block)?;
        self.handlers
            .iter()
            .map(|handler| {
                let range = labels.resolve(&handler.body)?;
                let mut clause = ExceptionHandler {
                    flags: ExceptionHandlerFlags::EXCEPTION,
                    try_offset: try_range.offset,
                    try_length: try_range.length,
                    handler_offset: range.offset,
                    handler_length: range.length,
                    class_token: Token::new(0),
                    filter_offset: 0,
                };

                match &handler.kind {
                    HandlerKind::Catch(class) => clause.class_token = resolve(class)?,
                    HandlerKind::Filter(filter) => {
                        clause.flags = ExceptionHandlerFlags::FILTER;
                        clause.filter_offset = labels.offset(*filter)?;
                    }
                    HandlerKind::Finally => clause.flags = ExceptionHandlerFlags::FINALLY,
                    HandlerKind::Fault => clause.flags = ExceptionHandlerFlags::FAULT,
                }

                Ok(clause)
            })
            .collect()
    }

    /// Convert the catch types with `map`.
    ///
    /// # Errors
    /// Returns the first error `map` returns.
    pub fn try_map<S, F>(&self, map: &mut F) -> Result<ExceptionRegion<S>>
    where
        F: FnMut(&R) -> Result<S>,
    {
        let handlers = self
            .handlers
            .iter()
            .map(|handler| {
                Ok(Handler {
                    kind: match &handler.kind {
                        HandlerKind::Catch(class) => HandlerKind::Catch(map(class)?),
                        HandlerKind::Filter(label) => HandlerKind::Filter(*label),
                        HandlerKind::Finally => HandlerKind::Finally,
                        HandlerKind::Fault => HandlerKind::Fault,
                    },
                    body: handler.body,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ExceptionRegion {
            try_block: self.try_block,
            handlers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(offsets: &[Option<u32>], code_length: u32) -> LabelMap<'_> {
        LabelMap {
            offsets,
            code_length,
            method: "Test::Run",
        }
    }

    fn range(start: u32, end: u32) -> CodeRegion {
        CodeRegion {
            start: Label(start),
            end: Label(end),
        }
    }

    #[test]
    fn fatness_boundary() {
        // labels: 0 -> 0, 1 -> 255, 2 -> 256, 3 -> 260, 4 -> 516
        let offsets = [Some(0), Some(255), Some(256), Some(260), Some(516)];
        let map = labels(&offsets, 600);

        let tiny = ExceptionRegion::new(
            range(0, 1),
            Handler {
                kind: HandlerKind::<Token>::Finally,
                body: range(2, 3),
            },
        );
        assert!(!tiny.is_fat(&map).unwrap());

        let fat_try = ExceptionRegion::new(
            range(0, 2),
            Handler {
                kind: HandlerKind::<Token>::Fault,
                body: range(2, 3),
            },
        );
        assert!(fat_try.is_fat(&map).unwrap());

        // A tiny try range with one 256 byte handler is fat as a whole
        let fat_handler = ExceptionRegion {
            try_block: range(0, 1),
            handlers: vec![
                Handler {
                    kind: HandlerKind::Catch(Token::new(0x0100_0001)),
                    body: range(2, 3),
                },
                Handler {
                    kind: HandlerKind::Finally,
                    body: range(3, 4),
                },
            ],
        };
        assert!(fat_handler.is_fat(&map).unwrap());
    }

    #[test]
    fn malformed_regions() {
        let offsets = [Some(0), Some(10), None, Some(20)];
        let map = labels(&offsets, 15);

        let empty = ExceptionRegion::<Token> {
            try_block: range(0, 1),
            handlers: Vec::new(),
        };
        assert!(matches!(
            empty.is_fat(&map),
            Err(Error::MalformedRegion { .. })
        ));

        let unmarked = ExceptionRegion::new(
            range(0, 2),
            Handler {
                kind: HandlerKind::<Token>::Finally,
                body: range(0, 1),
            },
        );
        assert!(unmarked.is_fat(&map).is_err());

        let beyond_code = ExceptionRegion::new(
            range(0, 3),
            Handler {
                kind: HandlerKind::<Token>::Finally,
                body: range(0, 1),
            },
        );
        assert!(beyond_code.is_fat(&map).is_err());

        let inverted = ExceptionRegion::new(
            range(1, 0),
            Handler {
                kind: HandlerKind::<Token>::Finally,
                body: range(0, 1),
            },
        );
        assert!(inverted.is_fat(&map).is_err());
        assert!(map.offset(Label(9)).is_err());
    }

    #[test]
    fn one_clause_per_handler() {
        let offsets = [Some(0), Some(4), Some(8), Some(12)];
        let map = labels(&offsets, 12);

        let region = ExceptionRegion {
            try_block: range(0, 1),
            handlers: vec![
                Handler {
                    kind: HandlerKind::Catch("System.Exception"),
                    body: range(1, 2),
                },
                Handler {
                    kind: HandlerKind::Finally,
                    body: range(2, 3),
                },
            ],
        };

        let clauses = region
            .clauses(&map, &|_: &&str| Ok(Token::new(0x0100_0002)))
            .unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].class_token, Token::new(0x0100_0002));
        assert_eq!((clauses[0].try_offset, clauses[0].try_length), (0, 4));
        assert_eq!((clauses[1].try_offset, clauses[1].try_length), (0, 4));
        assert_eq!(clauses[1].flags, ExceptionHandlerFlags::FINALLY);
        assert_eq!((clauses[1].handler_offset, clauses[1].handler_length), (8, 4));
    }
}
