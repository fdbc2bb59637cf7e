//! Table elements: the arena entries that become table rows.
//!
//! Every row of the image starts life as an [`Element`] in the registry arena. Elements refer
//! to each other by [`ElementId`], never by row number, because the sort phase renumbers
//! several tables after registration. Row numbers are read out of the arena only when rows
//! are written.
//!
//! An element's payload is one [`Value`] per column of its table schema. Values that need
//! information only later phases have (signatures with embedded type references, body RVAs,
//! list starts, coded indices) stay symbolic until then.

use std::fmt;

use crate::metadata::{
    signatures::{
        SignatureField, SignatureLocalVariables, SignatureMethod, SignatureMethodSpec,
        SignatureProperty, SignatureTypeSpec,
    },
    tables::TableId,
};

/// Index of an element in the registry arena.
///
/// Stable for the whole build, unlike the row number of the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) u32);

impl ElementId {
    /// Position of the element in the arena
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A signature waiting for final row numbers before it can be encoded into the `#Blob` heap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PendingSignature {
    /// `Field.Signature`
    Field(SignatureField<ElementId>),
    /// `MethodDef.Signature`, `MemberRef.Signature`
    Method(SignatureMethod<ElementId>),
    /// `Property.Type`
    Property(SignatureProperty<ElementId>),
    /// `StandAloneSig.Signature` of a method's locals
    LocalVariables(SignatureLocalVariables<ElementId>),
    /// `TypeSpec.Signature`
    TypeSpec(SignatureTypeSpec<ElementId>),
    /// `MethodSpec.Instantiation`
    MethodSpec(SignatureMethodSpec<ElementId>),
}

/// One column value of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A fixed-width constant
    Const(u32),
    /// A heap offset or GUID index, known at registration
    Heap(u32),
    /// A blob column whose signature is encoded in the signature phase
    Signature(PendingSignature),
    /// A table or coded index column; `None` is the null reference
    Ref(Option<ElementId>),
    /// The first row of a run of children, e.g. `TypeDef.FieldList`
    List(Vec<ElementId>),
    /// `MethodDef.RVA`, resolved from the method body layout
    BodyRva,
}

impl Value {
    /// A reference column pointing at `id`
    #[must_use]
    pub fn to(id: ElementId) -> Self {
        Value::Ref(Some(id))
    }

    /// The null reference
    #[must_use]
    pub fn null() -> Self {
        Value::Ref(None)
    }
}

/// An arena entry: one future row.
#[derive(Debug, Clone)]
pub struct Element {
    /// Table this element is a row of
    pub table: TableId,
    /// 1-based row, set on registration and reassigned once by the sort phase
    pub row: u32,
    /// Identity used for duplicate detection and diagnostics
    pub identity: String,
    /// Column values in schema order
    pub values: Vec<Value>,
}

impl Element {
    /// Element referenced by column `column`, if that column is a non-null reference
    #[must_use]
    pub fn reference(&self, column: usize) -> Option<ElementId> {
        match self.values.get(column) {
            Some(Value::Ref(target)) => *target,
            _ => None,
        }
    }

    /// Constant of column `column`, 0 if that column is not a constant
    #[must_use]
    pub fn constant(&self, column: usize) -> u32 {
        match self.values.get(column) {
            Some(Value::Const(value) | Value::Heap(value)) => *value,
            _ => 0,
        }
    }
}
