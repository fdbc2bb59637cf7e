use strum::IntoEnumIterator;

use crate::{
    file::io::read_le_at,
    metadata::tables::{CodedIndexType, HeapSizes, RawRow, TableId, TableInfo},
    utils::to_u32,
    Error::OutOfBounds,
    Result,
};

/// The `TablesHeader` is the parsed '#~' stream: its header fields, the width decisions that
/// follow from the row counts, and every row of every present table decoded by schema.
///
/// This is the reading half of the emitter's table writer and is what the round-trip tests
/// use to check that emitted rows, sort order and coded indices survive serialization.
///
/// # Examples
///
/// ```rust,no_run
/// use dotemit::metadata::{streams::TablesHeader, tables::TableId};
///
/// # fn example(stream: &[u8]) -> dotemit::Result<()> {
/// let tables = TablesHeader::from(stream)?;
/// for row in tables.rows(TableId::TypeDef) {
///     println!("TypeDef {} extends {:#x}", row.rid, row.get(3));
/// }
/// # Ok(())
/// # }
/// ```
pub struct TablesHeader {
    /// Reserved, always 0
    pub reserved: u32,
    /// Major version of the table schema, 2
    pub major_version: u8,
    /// Minor version of the table schema, 0
    pub minor_version: u8,
    /// Heap index width flags
    pub heap_sizes: HeapSizes,
    /// Reserved, always 1
    pub reserved_1: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    /// Width decisions rebuilt from the row counts
    pub info: TableInfo,
    tables: Vec<Vec<RawRow>>,
}

impl TablesHeader {
    /// Parse a '#~' stream
    ///
    /// # Errors
    /// Returns an error if the stream is truncated or its header is inconsistent
    pub fn from(data: &[u8]) -> Result<TablesHeader> {
        if data.len() < 24 {
            return Err(OutOfBounds);
        }

        let mut offset = 0;
        let reserved = read_le_at::<u32>(data, &mut offset)?;
        let major_version = read_le_at::<u8>(data, &mut offset)?;
        let minor_version = read_le_at::<u8>(data, &mut offset)?;
        let heap_sizes = HeapSizes::from_bits_truncate(read_le_at::<u8>(data, &mut offset)?);
        let reserved_1 = read_le_at::<u8>(data, &mut offset)?;
        let valid = read_le_at::<u64>(data, &mut offset)?;
        let sorted = read_le_at::<u64>(data, &mut offset)?;

        if valid >> TableId::GenericParamConstraint as u8 > 1 {
            return Err(malformed_error!(
                "Valid vector references unknown tables - {:#x}",
                valid
            ));
        }

        let info = TableInfo::read(data, valid)?;
        let mut row_offset = 24 + 4 * valid.count_ones() as usize;

        let mut tables = vec![Vec::new(); TableId::GenericParamConstraint as usize + 1];
        for table in TableId::iter() {
            let count = info.rows(table);
            if count == 0 {
                continue;
            }

            let row_size = table.row_size(&info) as usize;
            if row_offset + row_size * count as usize > data.len() {
                return Err(OutOfBounds);
            }

            let rows = &mut tables[table as usize];
            rows.reserve(count as usize);
            for rid in 1..=count {
                rows.push(RawRow::row_read(table, data, &mut row_offset, rid, &info)?);
            }
        }

        Ok(TablesHeader {
            reserved,
            major_version,
            minor_version,
            heap_sizes,
            reserved_1,
            valid,
            sorted,
            info,
            tables,
        })
    }

    /// Check if a table is present
    #[must_use]
    pub fn has_table(&self, table: TableId) -> bool {
        self.valid & table.mask() != 0
    }

    /// Check if a table is flagged as sorted
    #[must_use]
    pub fn is_sorted(&self, table: TableId) -> bool {
        self.sorted & table.mask() != 0
    }

    /// Number of rows in `table`
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.info.rows(table)
    }

    /// All rows of `table`, in row order
    #[must_use]
    pub fn rows(&self, table: TableId) -> &[RawRow] {
        &self.tables[table as usize]
    }

    /// The row with 1-based id `rid`
    #[must_use]
    pub fn row(&self, table: TableId, rid: u32) -> Option<&RawRow> {
        rid.checked_sub(1)
            .and_then(|index| self.tables[table as usize].get(index as usize))
    }

    /// Decode a coded index column value
    ///
    /// # Errors
    /// Returns an error for an invalid tag
    pub fn decode(&self, kind: CodedIndexType, value: u32) -> Result<(TableId, u32)> {
        kind.decode(value)
    }

    /// Binary search a sorted table for the row whose `column` equals `key`.
    ///
    /// Returns the first matching row, or `None`. The table must be ordered by that column,
    /// which the emitter guarantees for every table it flags in [`TablesHeader::sorted`].
    ///
    /// # Errors
    /// Returns an error if `table` is not flagged as sorted.
    pub fn find_by_key(&self, table: TableId, column: usize, key: u32) -> Result<Option<&RawRow>> {
        if !self.is_sorted(table) {
            return Err(malformed_error!("{:?} is not a sorted table", table));
        }

        let rows = self.rows(table);
        let first = rows.partition_point(|row| row.get(column) < key);
        Ok(rows.get(first).filter(|row| row.get(column) == key))
    }

    /// Total number of rows over all tables
    ///
    /// # Errors
    /// Returns an error if the sum overflows 32 bits
    pub fn total_rows(&self) -> Result<u32> {
        to_u32(self.tables.iter().map(Vec::len).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(rows: &[(TableId, Vec<Vec<u32>>)], sorted: u64) -> Vec<u8> {
        let valid = rows.iter().fold(0u64, |acc, (table, _)| acc | table.mask());
        let info = TableInfo::new(
            rows.iter()
                .map(|(table, values)| (*table, values.len() as u32)),
            HeapSizes::empty(),
        );

        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&[2, 0, 0, 1]);
        data.extend_from_slice(&valid.to_le_bytes());
        data.extend_from_slice(&sorted.to_le_bytes());
        for (_, values) in rows {
            data.extend_from_slice(&(values.len() as u32).to_le_bytes());
        }
        for (table, values) in rows {
            for (index, row) in values.iter().enumerate() {
                RawRow {
                    table: *table,
                    rid: index as u32 + 1,
                    values: row.clone(),
                }
                .row_write(&mut data, &info)
                .unwrap();
            }
        }
        data
    }

    #[test]
    fn parse_rows() {
        let data = stream(
            &[
                (TableId::Module, vec![vec![0, 1, 1, 0, 0]]),
                (TableId::TypeRef, vec![vec![6, 10, 20], vec![6, 30, 20]]),
            ],
            0,
        );

        let tables = TablesHeader::from(&data).unwrap();
        assert_eq!(tables.major_version, 2);
        assert_eq!(tables.reserved_1, 1);
        assert!(tables.has_table(TableId::TypeRef));
        assert!(!tables.has_table(TableId::TypeDef));
        assert_eq!(tables.row_count(TableId::TypeRef), 2);
        assert_eq!(tables.row(TableId::TypeRef, 2).unwrap().get(1), 30);
        assert!(tables.row(TableId::TypeRef, 0).is_none());
        assert_eq!(tables.total_rows().unwrap(), 3);
        assert_eq!(
            tables
                .decode(CodedIndexType::ResolutionScope, 6)
                .unwrap(),
            (TableId::AssemblyRef, 1)
        );
    }

    #[test]
    fn binary_search() {
        let data = stream(
            &[(
                TableId::Constant,
                vec![vec![8, 4, 1], vec![8, 8, 3], vec![8, 12, 5]],
            )],
            TableId::Constant.mask(),
        );

        let tables = TablesHeader::from(&data).unwrap();
        assert_eq!(
            tables.find_by_key(TableId::Constant, 1, 8).unwrap().unwrap().rid,
            2
        );
        assert!(tables.find_by_key(TableId::Constant, 1, 9).unwrap().is_none());
        assert!(tables.find_by_key(TableId::TypeDef, 0, 1).is_err());
    }

    #[test]
    fn truncated() {
        let mut data = stream(&[(TableId::TypeRef, vec![vec![6, 10, 20]])], 0);
        data.truncate(data.len() - 1);
        assert!(TablesHeader::from(&data).is_err());
    }
}
