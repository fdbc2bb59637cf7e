//! Column layout of every metadata table (ECMA-335 II.22).
//!
//! Each table is a fixed sequence of [`Column`]s. The width of a heap index, table index or
//! coded index column depends on the [`TableInfo`] of the build, so the byte size of a row is
//! only known once every table is frozen. Sizing, writing and reading all go through this one
//! table so the three can never disagree.

use crate::{
    file::io::{read_le_at_width, write_le_width},
    metadata::{
        tables::types::{CodedIndexType, TableId, TableInfo},
        token::Token,
    },
    Result,
};

/// One column of a metadata table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// A fixed 2-byte constant
    U16,
    /// A fixed 4-byte constant
    U32,
    /// An index into the `#Strings` heap
    Str,
    /// An index into the `#GUID` heap
    Guid,
    /// An index into the `#Blob` heap
    Blob,
    /// A simple index into another table
    Table(TableId),
    /// A coded index into one of several tables
    Coded(CodedIndexType),
}

impl Column {
    /// The on-disk width of this column under `info`.
    #[must_use]
    pub fn width(&self, info: &TableInfo) -> u8 {
        match self {
            Column::U16 => 2,
            Column::U32 => 4,
            Column::Str => info.str_bytes(),
            Column::Guid => info.guid_bytes(),
            Column::Blob => info.blob_bytes(),
            Column::Table(table) => info.table_index_bytes(*table),
            Column::Coded(kind) => info.coded_index_bytes(*kind),
        }
    }
}

use Column::{Blob, Coded, Guid, Str, Table, U16, U32};

impl TableId {
    /// The columns of this table, in on-disk order.
    #[must_use]
    pub fn columns(&self) -> &'static [Column] {
        match self {
            TableId::Module => &[U16, Str, Guid, Guid, Guid],
            TableId::TypeRef => &[Coded(CodedIndexType::ResolutionScope), Str, Str],
            TableId::TypeDef => &[
                U32,
                Str,
                Str,
                Coded(CodedIndexType::TypeDefOrRef),
                Table(TableId::Field),
                Table(TableId::MethodDef),
            ],
            TableId::FieldPtr => &[Table(TableId::Field)],
            TableId::Field => &[U16, Str, Blob],
            TableId::MethodPtr => &[Table(TableId::MethodDef)],
            TableId::MethodDef => &[U32, U16, U16, Str, Blob, Table(TableId::Param)],
            TableId::ParamPtr => &[Table(TableId::Param)],
            TableId::Param => &[U16, U16, Str],
            TableId::InterfaceImpl => &[
                Table(TableId::TypeDef),
                Coded(CodedIndexType::TypeDefOrRef),
            ],
            TableId::MemberRef => &[Coded(CodedIndexType::MemberRefParent), Str, Blob],
            // Type is a single byte followed by a zero padding byte
            TableId::Constant => &[U16, Coded(CodedIndexType::HasConstant), Blob],
            TableId::CustomAttribute => &[
                Coded(CodedIndexType::HasCustomAttribute),
                Coded(CodedIndexType::CustomAttributeType),
                Blob,
            ],
            TableId::FieldMarshal => &[Coded(CodedIndexType::HasFieldMarshal), Blob],
            TableId::DeclSecurity => &[U16, Coded(CodedIndexType::HasDeclSecurity), Blob],
            TableId::ClassLayout => &[U16, U32, Table(TableId::TypeDef)],
            TableId::FieldLayout => &[U32, Table(TableId::Field)],
            TableId::StandAloneSig => &[Blob],
            TableId::EventMap => &[Table(TableId::TypeDef), Table(TableId::Event)],
            TableId::EventPtr => &[Table(TableId::Event)],
            TableId::Event => &[U16, Str, Coded(CodedIndexType::TypeDefOrRef)],
            TableId::PropertyMap => &[Table(TableId::TypeDef), Table(TableId::Property)],
            TableId::PropertyPtr => &[Table(TableId::Property)],
            TableId::Property => &[U16, Str, Blob],
            TableId::MethodSemantics => &[
                U16,
                Table(TableId::MethodDef),
                Coded(CodedIndexType::HasSemantics),
            ],
            TableId::MethodImpl => &[
                Table(TableId::TypeDef),
                Coded(CodedIndexType::MethodDefOrRef),
                Coded(CodedIndexType::MethodDefOrRef),
            ],
            TableId::ModuleRef => &[Str],
            TableId::TypeSpec => &[Blob],
            TableId::ImplMap => &[
                U16,
                Coded(CodedIndexType::MemberForwarded),
                Str,
                Table(TableId::ModuleRef),
            ],
            TableId::FieldRVA => &[U32, Table(TableId::Field)],
            TableId::EncLog => &[U32, U32],
            TableId::EncMap => &[U32],
            TableId::Assembly => &[U32, U16, U16, U16, U16, U32, Blob, Str, Str],
            TableId::AssemblyProcessor => &[U32],
            TableId::AssemblyOS => &[U32, U32, U32],
            TableId::AssemblyRef => &[U16, U16, U16, U16, U32, Blob, Str, Str, Blob],
            TableId::AssemblyRefProcessor => &[U32, Table(TableId::AssemblyRef)],
            TableId::AssemblyRefOS => &[U32, U32, U32, Table(TableId::AssemblyRef)],
            TableId::File => &[U32, Str, Blob],
            TableId::ExportedType => &[
                U32,
                U32,
                Str,
                Str,
                Coded(CodedIndexType::Implementation),
            ],
            TableId::ManifestResource => &[U32, U32, Str, Coded(CodedIndexType::Implementation)],
            TableId::NestedClass => &[Table(TableId::TypeDef), Table(TableId::TypeDef)],
            TableId::GenericParam => &[U16, U16, Coded(CodedIndexType::TypeOrMethodDef), Str],
            TableId::MethodSpec => &[Coded(CodedIndexType::MethodDefOrRef), Blob],
            TableId::GenericParamConstraint => &[
                Table(TableId::GenericParam),
                Coded(CodedIndexType::TypeDefOrRef),
            ],
        }
    }

    /// The byte size of one row of this table under `info`.
    #[must_use]
    pub fn row_size(&self, info: &TableInfo) -> u32 {
        self.columns()
            .iter()
            .map(|column| u32::from(column.width(info)))
            .sum()
    }
}

/// A table row as plain column values, in schema order.
///
/// The emitter produces these from resolved elements; the reader produces them from the tables
/// stream. Heap columns hold heap offsets, table columns hold row numbers and coded columns
/// hold the already combined `(row << tag_bits) | tag` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// The table this row belongs to
    pub table: TableId,
    /// 1-based row id
    pub rid: u32,
    /// Column values in schema order
    pub values: Vec<u32>,
}

impl RawRow {
    /// The token addressing this row.
    #[must_use]
    pub fn token(&self) -> Token {
        Token::new((u32::from(self.table as u8) << 24) | self.rid)
    }

    /// Value of column `index`, 0 if the column does not exist.
    #[must_use]
    pub fn get(&self, index: usize) -> u32 {
        self.values.get(index).copied().unwrap_or(0)
    }

    /// Parse one row of `table` at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the data is truncated.
    pub fn row_read(
        table: TableId,
        data: &[u8],
        offset: &mut usize,
        rid: u32,
        info: &TableInfo,
    ) -> Result<Self> {
        let values = table
            .columns()
            .iter()
            .map(|column| read_le_at_width(data, offset, column.width(info)))
            .collect::<Result<Vec<u32>>>()?;

        Ok(RawRow { table, rid, values })
    }

    /// Append this row to `buffer` using the widths in `info`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the value count does not match the schema, or
    /// [`crate::Error::FormatOverflow`] if a value does not fit its column.
    pub fn row_write(&self, buffer: &mut Vec<u8>, info: &TableInfo) -> Result<()> {
        let columns = self.table.columns();
        if columns.len() != self.values.len() {
            return Err(malformed_error!(
                "{:?} row {} has {} values, expected {}",
                self.table,
                self.rid,
                self.values.len(),
                columns.len()
            ));
        }

        for (column, value) in columns.iter().zip(&self.values) {
            write_le_width(buffer, *value, column.width(info))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::HeapSizes;
    use strum::IntoEnumIterator;

    #[test]
    fn small_row_sizes() {
        let info = TableInfo::new([], HeapSizes::empty());

        assert_eq!(TableId::Module.row_size(&info), 10);
        assert_eq!(TableId::TypeDef.row_size(&info), 14);
        assert_eq!(TableId::Field.row_size(&info), 6);
        assert_eq!(TableId::MethodDef.row_size(&info), 14);
        assert_eq!(TableId::Constant.row_size(&info), 6);
        assert_eq!(TableId::Assembly.row_size(&info), 22);
        assert_eq!(TableId::AssemblyRef.row_size(&info), 20);
    }

    #[test]
    fn wide_row_sizes() {
        let info = TableInfo::new(
            [(TableId::Field, 0x1_0000)],
            HeapSizes::STRINGS | HeapSizes::GUID | HeapSizes::BLOB,
        );

        // Module: 2 + 4 + 3 * 4
        assert_eq!(TableId::Module.row_size(&info), 18);
        // TypeDef: 4 + 4 + 4 + coded(TypeDefOrRef, 2) + Field(4) + MethodDef(2)
        assert_eq!(TableId::TypeDef.row_size(&info), 20);
        // HasConstant covers Field, so it widens
        assert_eq!(TableId::Constant.row_size(&info), 10);
    }

    #[test]
    fn every_table_has_columns() {
        for table in TableId::iter() {
            assert!(!table.columns().is_empty(), "{table:?}");
        }
    }

    #[test]
    fn write_then_read() {
        let info = TableInfo::new([(TableId::TypeDef, 3)], HeapSizes::BLOB);
        let row = RawRow {
            table: TableId::NestedClass,
            rid: 1,
            values: vec![2, 3],
        };

        let mut buffer = Vec::new();
        row.row_write(&mut buffer, &info).unwrap();
        assert_eq!(buffer, vec![2, 0, 3, 0]);

        let mut offset = 0;
        let read = RawRow::row_read(TableId::NestedClass, &buffer, &mut offset, 1, &info).unwrap();
        assert_eq!(read, row);
        assert_eq!(read.token().value(), 0x2900_0001);
    }

    #[test]
    fn value_count_mismatch() {
        let info = TableInfo::default();
        let row = RawRow {
            table: TableId::Field,
            rid: 1,
            values: vec![0],
        };
        let mut buffer = Vec::new();
        assert!(row.row_write(&mut buffer, &info).is_err());
    }
}
