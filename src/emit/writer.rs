//! Serialization of the `#~` stream.
//!
//! Rows are produced from registry elements by resolving every symbolic [`Value`] into the
//! plain column value the schema expects, then written with the widths frozen in the
//! [`TableInfo`] of the build.

use std::collections::HashMap;

use strum::IntoEnumIterator;

use crate::{
    emit::{
        element::{ElementId, Value},
        registry::TableRegistry,
    },
    file::io::write_le,
    metadata::{
        streams::pad_stream,
        tables::{Column, RawRow, TableId, TableInfo},
    },
    Result,
};

/// Fixed fields of the tables stream header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TablesStreamHeader {
    /// Schema major version
    pub major_version: u8,
    /// Schema minor version
    pub minor_version: u8,
    /// Bit vector of sorted tables
    pub sorted: u64,
}

/// First child row of every list column, keyed by owner and column.
///
/// An owner without children points at the first child of the next owner that has any, or
/// one past the last child row, so that consecutive owners describe contiguous runs.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the children of an owner are not contiguous rows in
/// ascending order, which the run encoding can not express.
pub fn list_starts(registry: &TableRegistry) -> Result<HashMap<(ElementId, usize), u32>> {
    let mut starts = HashMap::new();

    for owner_table in TableId::iter() {
        for (column, schema) in owner_table.columns().iter().enumerate() {
            let Column::Table(child_table) = schema else {
                continue;
            };

            let mut next = registry.row_count(*child_table) + 1;
            for owner in registry.rows(owner_table).iter().rev() {
                let Some(Value::List(children)) = registry.get(*owner)?.values.get(column) else {
                    continue;
                };

                if let Some(first) = children.first() {
                    let first_row = registry.row_of(*first)?;
                    for (offset, child) in children.iter().enumerate() {
                        let row = registry.row_of(*child)?;
                        if row as usize != first_row as usize + offset {
                            return Err(malformed_error!(
                                "Children of {} are not contiguous in {:?}",
                                registry.describe(*owner),
                                child_table
                            ));
                        }
                    }
                    next = first_row;
                }

                starts.insert((*owner, column), next);
            }
        }
    }

    Ok(starts)
}

/// Resolves elements into rows and writes the tables stream.
pub struct TablesWriter<'a> {
    registry: &'a TableRegistry,
    info: &'a TableInfo,
    list_starts: HashMap<(ElementId, usize), u32>,
    body_rvas: &'a HashMap<ElementId, u32>,
}

impl<'a> TablesWriter<'a> {
    /// A writer for `registry` under the widths of `info`.
    ///
    /// `body_rvas` holds the RVA of every method that has a body.
    ///
    /// # Errors
    /// Returns an error if a child list is not contiguous.
    pub fn new(
        registry: &'a TableRegistry,
        info: &'a TableInfo,
        body_rvas: &'a HashMap<ElementId, u32>,
    ) -> Result<Self> {
        Ok(TablesWriter {
            registry,
            info,
            list_starts: list_starts(registry)?,
            body_rvas,
        })
    }

    /// The plain row of element `id`.
    ///
    /// # Errors
    /// Returns an error for unresolved references or signatures that were never built.
    pub fn resolve_row(&self, id: ElementId) -> Result<RawRow> {
        let element = self.registry.get(id)?;
        let columns = element.table.columns();

        let values = element
            .values
            .iter()
            .zip(columns)
            .enumerate()
            .map(|(index, (value, column))| match value {
                Value::Const(value) | Value::Heap(value) => Ok(*value),
                Value::Ref(target) => self.registry.reference_value(id, *column, *target),
                Value::List(_) => self.list_starts.get(&(id, index)).copied().ok_or_else(|| {
                    malformed_error!(
                        "{} column {} is a list over a non table column",
                        self.registry.describe(id),
                        index
                    )
                }),
                Value::BodyRva => Ok(self.body_rvas.get(&id).copied().unwrap_or(0)),
                Value::Signature(_) => Err(malformed_error!(
                    "Signature of {} was never built",
                    self.registry.describe(id)
                )),
            })
            .collect::<Result<Vec<u32>>>()?;

        Ok(RawRow {
            table: element.table,
            rid: element.row,
            values,
        })
    }

    /// Serialize the complete `#~` stream, padded to 4 bytes.
    ///
    /// # Errors
    /// Returns an error if a row does not resolve or a value does not fit its column.
    pub fn write(&self, header: TablesStreamHeader) -> Result<Vec<u8>> {
        let valid = TableId::iter()
            .filter(|table| self.info.rows(*table) > 0)
            .fold(0u64, |mask, table| mask | table.mask());

        let mut buffer = Vec::new();
        write_le::<u32>(&mut buffer, 0);
        write_le::<u8>(&mut buffer, header.major_version);
        write_le::<u8>(&mut buffer, header.minor_version);
        write_le::<u8>(&mut buffer, self.info.heap_sizes().bits());
        write_le::<u8>(&mut buffer, 1);
        write_le::<u64>(&mut buffer, valid);
        write_le::<u64>(&mut buffer, header.sorted);

        for table in TableId::iter() {
            let rows = self.info.rows(table);
            if rows > 0 {
                write_le::<u32>(&mut buffer, rows);
            }
        }

        for table in TableId::iter() {
            for id in self.registry.rows(table) {
                self.resolve_row(*id)?.row_write(&mut buffer, self.info)?;
            }
        }

        pad_stream(&mut buffer);
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{streams::TablesHeader, tables::HeapSizes};

    fn type_def(registry: &mut TableRegistry, name: &str, fields: Vec<ElementId>) -> ElementId {
        registry
            .register(
                TableId::TypeDef,
                name,
                vec![
                    Value::Const(0),
                    Value::Heap(0),
                    Value::Heap(0),
                    Value::null(),
                    Value::List(fields),
                    Value::List(Vec::new()),
                ],
            )
            .unwrap()
    }

    fn field(registry: &mut TableRegistry, name: &str) -> ElementId {
        registry
            .register(
                TableId::Field,
                name,
                vec![Value::Const(0), Value::Heap(0), Value::Heap(0)],
            )
            .unwrap()
    }

    #[test]
    fn list_runs() {
        let mut registry = TableRegistry::new();
        let f1 = field(&mut registry, "f1");
        let f2 = field(&mut registry, "f2");
        let f3 = field(&mut registry, "f3");

        let empty_first = type_def(&mut registry, "A", Vec::new());
        let two = type_def(&mut registry, "B", vec![f1, f2]);
        let empty_middle = type_def(&mut registry, "C", Vec::new());
        let one = type_def(&mut registry, "D", vec![f3]);
        let empty_last = type_def(&mut registry, "E", Vec::new());

        let starts = list_starts(&registry).unwrap();
        assert_eq!(starts[&(empty_first, 4)], 1);
        assert_eq!(starts[&(two, 4)], 1);
        assert_eq!(starts[&(empty_middle, 4)], 3);
        assert_eq!(starts[&(one, 4)], 3);
        assert_eq!(starts[&(empty_last, 4)], 4);
        // No methods at all: every MethodList points one past the end
        assert_eq!(starts[&(two, 5)], 1);
    }

    #[test]
    fn non_contiguous_children() {
        let mut registry = TableRegistry::new();
        let f1 = field(&mut registry, "f1");
        let _f2 = field(&mut registry, "f2");
        let f3 = field(&mut registry, "f3");
        type_def(&mut registry, "A", vec![f1, f3]);

        assert!(list_starts(&registry).is_err());
    }

    #[test]
    fn stream_reads_back() {
        let mut registry = TableRegistry::new();
        let f1 = field(&mut registry, "f1");
        let owner = type_def(&mut registry, "A", vec![f1]);
        registry
            .register(
                TableId::NestedClass,
                "A in A",
                vec![Value::to(owner), Value::to(owner)],
            )
            .unwrap();

        let info = TableInfo::new(registry.row_counts(), HeapSizes::BLOB);
        let rvas = HashMap::new();
        let writer = TablesWriter::new(&registry, &info, &rvas).unwrap();
        let stream = writer
            .write(TablesStreamHeader {
                major_version: 2,
                minor_version: 0,
                sorted: TableId::NestedClass.mask(),
            })
            .unwrap();

        assert_eq!(stream.len() % 4, 0);
        assert_eq!(
            stream.len() as u64,
            crate::emit::layout::tables_stream_size(&info)
        );

        let header = TablesHeader::from(&stream).unwrap();
        assert_eq!(header.major_version, 2);
        assert_eq!(header.heap_sizes, HeapSizes::BLOB);
        assert_eq!(header.row_count(TableId::Field), 1);
        assert_eq!(header.rows(TableId::TypeDef)[0].get(4), 1);
        assert_eq!(header.rows(TableId::NestedClass)[0].values, vec![1, 1]);
        assert!(header.is_sorted(TableId::NestedClass));
        assert!(!header.has_table(TableId::MethodDef));
    }

    #[test]
    fn unbuilt_signature() {
        use crate::{
            emit::element::PendingSignature,
            metadata::signatures::{SignatureField, TypeSignature},
        };

        let mut registry = TableRegistry::new();
        let id = registry
            .register(
                TableId::Field,
                "f",
                vec![
                    Value::Const(0),
                    Value::Heap(0),
                    Value::Signature(PendingSignature::Field(SignatureField::new(
                        TypeSignature::I4,
                    ))),
                ],
            )
            .unwrap();

        let info = TableInfo::new(registry.row_counts(), HeapSizes::empty());
        let rvas = HashMap::new();
        let writer = TablesWriter::new(&registry, &info, &rvas).unwrap();
        assert!(writer.resolve_row(id).is_err());
    }
}
