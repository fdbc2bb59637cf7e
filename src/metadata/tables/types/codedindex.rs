//! # Coded Index Types Module
//!
//! Coded indices combine a table identifier and row index into a single value by using the
//! lower bits to encode which table is being referenced, and the remaining bits for the row.
//! This allows a column to reference different kinds of entities (e.g. `TypeDef`, `TypeRef`
//! or `TypeSpec`) with one unified value.
//!
//! The list of participating tables, and their order, is fixed by the format: the position of
//! a table in [`CodedIndexType::tables`] is its tag. `CustomAttributeType` reserves tags that
//! no table uses, which is why the slots are `Option`s.
//!
//! Inside signature blobs a different encoding of the same idea is used
//! (`TypeDefOrRefOrSpecEncoded`, compressed, tag in the two low bits); see
//! [`crate::metadata::signatures`].
//!
//! ## References
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Section II.24.2.6

use strum::{EnumCount, EnumIter};

use crate::{
    file::io::read_le_at_dyn,
    metadata::{
        tables::{TableId, TableInfo},
        token::Token,
    },
    utils::tag_bits,
    Error, Result,
};

/// All coded index kinds defined in ECMA-335 II.24.2.6.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, EnumIter, EnumCount)]
#[repr(usize)]
pub enum CodedIndexType {
    /// References `TypeDef`, `TypeRef`, or `TypeSpec` tables.
    TypeDefOrRef,

    /// References `Field`, `Param`, or `Property` tables.
    ///
    /// Used by the parent column of the `Constant` table.
    HasConstant,

    /// References any entity that can have custom attributes attached (22 tables).
    HasCustomAttribute,

    /// References `Field` or `Param` tables.
    HasFieldMarshal,

    /// References `TypeDef`, `MethodDef`, or `Assembly` tables.
    HasDeclSecurity,

    /// References `TypeDef`, `TypeRef`, `ModuleRef`, `MethodDef`, or `TypeSpec` tables.
    MemberRefParent,

    /// References `Event` or `Property` tables.
    HasSemantics,

    /// References `MethodDef` or `MemberRef` tables.
    MethodDefOrRef,

    /// References `Field` or `MethodDef` tables.
    MemberForwarded,

    /// References `File`, `AssemblyRef`, or `ExportedType` tables.
    Implementation,

    /// References `MethodDef` (tag 2) or `MemberRef` (tag 3); tags 0, 1 and 4 are reserved.
    CustomAttributeType,

    /// References `Module`, `ModuleRef`, `AssemblyRef`, or `TypeRef` tables.
    ResolutionScope,

    /// References `TypeDef` or `MethodDef` tables.
    TypeOrMethodDef,
}

impl CodedIndexType {
    /// The tag-ordered table slots of this coded index kind.
    ///
    /// The index of a slot is the tag value written into the low bits; `None` marks a reserved
    /// tag.
    #[must_use]
    pub fn tables(&self) -> &'static [Option<TableId>] {
        match self {
            CodedIndexType::TypeDefOrRef => &[
                Some(TableId::TypeDef),
                Some(TableId::TypeRef),
                Some(TableId::TypeSpec),
            ],
            CodedIndexType::HasConstant => &[
                Some(TableId::Field),
                Some(TableId::Param),
                Some(TableId::Property),
            ],
            CodedIndexType::HasCustomAttribute => &[
                Some(TableId::MethodDef),
                Some(TableId::Field),
                Some(TableId::TypeRef),
                Some(TableId::TypeDef),
                Some(TableId::Param),
                Some(TableId::InterfaceImpl),
                Some(TableId::MemberRef),
                Some(TableId::Module),
                // Labeled 'Permission' in the standard, which is the DeclSecurity table
                Some(TableId::DeclSecurity),
                Some(TableId::Property),
                Some(TableId::Event),
                Some(TableId::StandAloneSig),
                Some(TableId::ModuleRef),
                Some(TableId::TypeSpec),
                Some(TableId::Assembly),
                Some(TableId::AssemblyRef),
                Some(TableId::File),
                Some(TableId::ExportedType),
                Some(TableId::ManifestResource),
                Some(TableId::GenericParam),
                Some(TableId::GenericParamConstraint),
                Some(TableId::MethodSpec),
            ],
            CodedIndexType::HasFieldMarshal => &[Some(TableId::Field), Some(TableId::Param)],
            CodedIndexType::HasDeclSecurity => &[
                Some(TableId::TypeDef),
                Some(TableId::MethodDef),
                Some(TableId::Assembly),
            ],
            CodedIndexType::MemberRefParent => &[
                Some(TableId::TypeDef),
                Some(TableId::TypeRef),
                Some(TableId::ModuleRef),
                Some(TableId::MethodDef),
                Some(TableId::TypeSpec),
            ],
            CodedIndexType::HasSemantics => &[Some(TableId::Event), Some(TableId::Property)],
            CodedIndexType::MethodDefOrRef => {
                &[Some(TableId::MethodDef), Some(TableId::MemberRef)]
            }
            CodedIndexType::MemberForwarded => &[Some(TableId::Field), Some(TableId::MethodDef)],
            CodedIndexType::Implementation => &[
                Some(TableId::File),
                Some(TableId::AssemblyRef),
                Some(TableId::ExportedType),
            ],
            CodedIndexType::CustomAttributeType => &[
                None,
                None,
                Some(TableId::MethodDef),
                Some(TableId::MemberRef),
                None,
            ],
            CodedIndexType::ResolutionScope => &[
                Some(TableId::Module),
                Some(TableId::ModuleRef),
                Some(TableId::AssemblyRef),
                Some(TableId::TypeRef),
            ],
            CodedIndexType::TypeOrMethodDef => &[Some(TableId::TypeDef), Some(TableId::MethodDef)],
        }
    }

    /// Number of low bits holding the tag, `ceil(log2(slots))`.
    #[must_use]
    pub fn tag_bits(&self) -> u8 {
        tag_bits(self.tables().len())
    }

    /// The tag assigned to `table`, if the table participates in this coded index.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // at most 22 slots
    pub fn tag_of(&self, table: TableId) -> Option<u32> {
        self.tables()
            .iter()
            .position(|slot| *slot == Some(table))
            .map(|tag| tag as u32)
    }

    /// Combine `table` and `row` into the on-disk value `(row << tag_bits) | tag`.
    ///
    /// A `row` of zero encodes the null reference with the table's tag, which readers treat as
    /// "absent"; use `0` directly for a column that has no target at all.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if `table` does not participate in this coded index, or
    /// [`Error::FormatOverflow`] if the shifted row does not fit 32 bits.
    pub fn encode(&self, table: TableId, row: u32) -> Result<u32> {
        let Some(tag) = self.tag_of(table) else {
            return Err(malformed_error!(
                "{:?} can not be referenced through {:?}",
                table,
                self
            ));
        };

        let bits = self.tag_bits();
        let max_row = u32::MAX >> bits;
        if row > max_row {
            return Err(Error::FormatOverflow {
                what: "coded index row",
                value: u64::from(row),
                max: u64::from(max_row),
            });
        }

        Ok((row << bits) | tag)
    }

    /// Split an on-disk value into its table and row.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if the tag is out of range or reserved.
    pub fn decode(&self, value: u32) -> Result<(TableId, u32)> {
        let bits = self.tag_bits();
        let tag = value & ((1 << bits) - 1);
        let row = value >> bits;

        match self.tables().get(tag as usize) {
            Some(Some(table)) => Ok((*table, row)),
            _ => Err(malformed_error!(
                "Invalid tag {} for coded index {:?}",
                tag,
                self
            )),
        }
    }
}

/// A decoded coded index value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodedIndex {
    /// The table this index is referring to.
    pub tag: TableId,

    /// The 1-based row within that table; 0 is the null reference.
    pub row: u32,

    /// The metadata token for this coded index.
    pub token: Token,
}

impl CodedIndex {
    /// Creates a new `CodedIndex` with the specified table and row.
    #[must_use]
    pub fn new(tag: TableId, row: u32) -> CodedIndex {
        CodedIndex {
            tag,
            row,
            token: Token::new((u32::from(tag as u8) << 24) | (row & 0x00FF_FFFF)),
        }
    }

    /// Reads and decodes a coded index at `offset`, at the width `info` decided for `ci_type`.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if the buffer is too small, or [`Error::Malformed`] for an
    /// invalid tag.
    pub fn read(
        data: &[u8],
        offset: &mut usize,
        info: &TableInfo,
        ci_type: CodedIndexType,
    ) -> Result<Self> {
        let value = read_le_at_dyn(data, offset, info.coded_index_bytes(ci_type) == 4)?;
        let (tag, row) = ci_type.decode(value)?;
        Ok(CodedIndex::new(tag, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn tag_bit_widths() {
        let expected = [
            (CodedIndexType::TypeDefOrRef, 2),
            (CodedIndexType::HasConstant, 2),
            (CodedIndexType::HasCustomAttribute, 5),
            (CodedIndexType::HasFieldMarshal, 1),
            (CodedIndexType::HasDeclSecurity, 2),
            (CodedIndexType::MemberRefParent, 3),
            (CodedIndexType::HasSemantics, 1),
            (CodedIndexType::MethodDefOrRef, 1),
            (CodedIndexType::MemberForwarded, 1),
            (CodedIndexType::Implementation, 2),
            (CodedIndexType::CustomAttributeType, 3),
            (CodedIndexType::ResolutionScope, 2),
            (CodedIndexType::TypeOrMethodDef, 1),
        ];

        assert_eq!(expected.len(), CodedIndexType::COUNT);
        for (kind, bits) in expected {
            assert_eq!(kind.tag_bits(), bits, "{kind:?}");
        }
    }

    #[test]
    fn custom_attribute_type_tags() {
        let kind = CodedIndexType::CustomAttributeType;
        assert_eq!(kind.tag_of(TableId::MethodDef), Some(2));
        assert_eq!(kind.tag_of(TableId::MemberRef), Some(3));
        assert_eq!(kind.encode(TableId::MemberRef, 5).unwrap(), (5 << 3) | 3);
        assert!(kind.decode(1).is_err());
        assert!(kind.decode(4).is_err());
    }

    #[test]
    fn encode_decode() {
        for kind in CodedIndexType::iter() {
            for table in kind.tables().iter().flatten() {
                let value = kind.encode(*table, 0x1234).unwrap();
                assert_eq!(kind.decode(value).unwrap(), (*table, 0x1234));
            }
        }
    }

    #[test]
    fn encode_foreign_table() {
        assert!(CodedIndexType::HasSemantics
            .encode(TableId::TypeDef, 1)
            .is_err());
    }

    #[test]
    fn coded_index_token() {
        let index = CodedIndex::new(TableId::TypeSpec, 3);
        assert_eq!(index.token.value(), 0x1B00_0003);
    }
}
