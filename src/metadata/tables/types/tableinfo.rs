use bitflags::bitflags;
use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::io::{read_le, read_le_at},
    metadata::tables::types::{CodedIndexType, TableId},
    Error::OutOfBounds,
    Result,
};

bitflags! {
    /// The `HeapSizes` byte of the tables stream header: which heaps need 4-byte indices.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HeapSizes: u8 {
        /// `#Strings` indices are 4 bytes
        const STRINGS = 0x01;
        /// `#GUID` indices are 4 bytes
        const GUID = 0x02;
        /// `#Blob` indices are 4 bytes
        const BLOB = 0x04;
    }
}

/// Holds information about the size that reference index fields have
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct TableRowInfo {
    /// The count of rows in this table
    pub rows: u32,
    /// Number of bits required to represent any valid row index
    pub bits: u8,
    /// If the count is > `u16::max`, the indexes of other tables into this table will be 4 bytes instead of 2
    pub is_large: bool,
}

impl TableRowInfo {
    /// Creates a new `TableRowInfo` for a table with `rows` rows.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(rows: u32) -> Self {
        let bits = if rows == 0 {
            1
        } else {
            // 32 - leading_zeros is at most 32
            (32 - rows.leading_zeros()) as u8
        };

        Self {
            rows,
            bits,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// The width decisions of one build: row counts of every table, the resulting table-index and
/// coded-index widths, and the three heap-index widths.
///
/// The emitter creates it once all rows are registered and sorted; the reader rebuilds it from
/// the row counts in the tables stream header. Both use the same width rules, which is what
/// makes the emitted rows readable.
#[derive(Clone, Debug, PartialEq)]
pub struct TableInfo {
    rows: Vec<TableRowInfo>,
    coded_indexes: Vec<u8>,
    heap_sizes: HeapSizes,
}

impl Default for TableInfo {
    fn default() -> Self {
        TableInfo::new([], HeapSizes::empty())
    }
}

impl TableInfo {
    /// Build a `TableInfo` from the final row count of each table and the heap width flags.
    ///
    /// Tables not mentioned in `row_counts` have zero rows.
    pub fn new(row_counts: impl IntoIterator<Item = (TableId, u32)>, heap_sizes: HeapSizes) -> Self {
        let mut rows = vec![TableRowInfo::new(0); TableId::COUNT];
        for (table, count) in row_counts {
            rows[table as usize] = TableRowInfo::new(count);
        }

        let mut table_info = TableInfo {
            rows,
            coded_indexes: vec![0; CodedIndexType::COUNT],
            heap_sizes,
        };

        table_info.calculate_coded_index_bits();
        table_info
    }

    /// Parse the row counts from a tables stream header.
    ///
    /// ## Arguments
    /// * `data` - The tables stream, starting at its header
    /// * `valid_bitvec` - The valid bitvector from the header, showing which tables are present
    ///
    /// # Errors
    /// Returns an error if the header is truncated
    pub fn read(data: &[u8], valid_bitvec: u64) -> Result<Self> {
        let mut next_row_offset = 24;
        let mut counts = Vec::new();

        for table_id in TableId::iter() {
            if data.len() < next_row_offset {
                return Err(OutOfBounds);
            }

            if valid_bitvec & table_id.mask() == 0 {
                continue;
            }

            counts.push((table_id, read_le_at::<u32>(data, &mut next_row_offset)?));
        }

        let heap_size_flags = read_le::<u8>(data.get(6..).ok_or(OutOfBounds)?)?;
        Ok(TableInfo::new(
            counts,
            HeapSizes::from_bits_truncate(heap_size_flags),
        ))
    }

    /// Returns true, if a requested table is larger than 2^16 rows and hence requires 4 bytes instead of 2 bytes
    #[must_use]
    pub fn is_large(&self, id: TableId) -> bool {
        self.rows[id as usize].is_large
    }

    /// The heap width flags
    #[must_use]
    pub fn heap_sizes(&self) -> HeapSizes {
        self.heap_sizes
    }

    /// Indicates the size of indexes referring into the '#Strings' heap. True means 4 bytes, False is 2 bytes
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.heap_sizes.contains(HeapSizes::STRINGS)
    }

    /// Indicates the size of indexes referring into the '#GUID' heap. True means 4 bytes, False is 2 bytes
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.heap_sizes.contains(HeapSizes::GUID)
    }

    /// Indicates the size of indexes referring into the '#Blob' heap. True means 4 bytes, False is 2 bytes
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.heap_sizes.contains(HeapSizes::BLOB)
    }

    /// Width of a '#Strings' index in bytes
    #[must_use]
    pub fn str_bytes(&self) -> u8 {
        if self.is_large_str() {
            4
        } else {
            2
        }
    }

    /// Width of a '#GUID' index in bytes
    #[must_use]
    pub fn guid_bytes(&self) -> u8 {
        if self.is_large_guid() {
            4
        } else {
            2
        }
    }

    /// Width of a '#Blob' index in bytes
    #[must_use]
    pub fn blob_bytes(&self) -> u8 {
        if self.is_large_blob() {
            4
        } else {
            2
        }
    }

    /// Returns the row information of a specific table.
    #[must_use]
    pub fn get(&self, table: TableId) -> &TableRowInfo {
        &self.rows[table as usize]
    }

    /// Row count of `table`.
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.rows[table as usize].rows
    }

    /// Returns the number of bits required to represent an index into a specific table.
    #[must_use]
    pub fn table_index_bits(&self, table_id: TableId) -> u8 {
        self.rows[table_id as usize].bits
    }

    /// Returns the number of bytes required to represent an index into a specific table.
    #[must_use]
    pub fn table_index_bytes(&self, table_id: TableId) -> u8 {
        if self.rows[table_id as usize].bits > 16 {
            4
        } else {
            2
        }
    }

    /// Returns the cached bit size for a specific coded index type.
    #[must_use]
    pub fn coded_index_bits(&self, coded_index_type: CodedIndexType) -> u8 {
        self.coded_indexes[coded_index_type as usize]
    }

    /// Returns the byte size of a coded index column of the given kind.
    #[must_use]
    pub fn coded_index_bytes(&self, coded_index_type: CodedIndexType) -> u8 {
        if self.coded_indexes[coded_index_type as usize] > 16 {
            4
        } else {
            2
        }
    }

    /// Largest row count every table of `coded_index_type` may have while the index stays at
    /// 2 bytes.
    #[must_use]
    pub fn coded_index_threshold(coded_index_type: CodedIndexType) -> u32 {
        (1u32 << (16 - coded_index_type.tag_bits())) - 1
    }

    fn calculate_coded_index_size(&self, coded_index_type: CodedIndexType) -> u8 {
        let max_bits = coded_index_type
            .tables()
            .iter()
            .flatten()
            .map(|table| self.table_index_bits(*table))
            .max()
            .unwrap_or(1);

        max_bits + coded_index_type.tag_bits()
    }

    fn calculate_coded_index_bits(&mut self) {
        for coded_index in CodedIndexType::iter() {
            let size = self.calculate_coded_index_size(coded_index);
            self.coded_indexes[coded_index as usize] = size;
        }
    }
}
