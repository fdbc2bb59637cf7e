//! The sort phase: order the tables readers binary search.
//!
//! ECMA-335 II.22 requires a number of tables to be sorted by a key column so lookups can
//! binary search them. Keys are on-disk values: rows for simple indices, `(row << tag_bits) |
//! tag` for coded indices. A key may point into a table that is itself sorted, so the order
//! of [`SORTED_TABLES`] matters: `GenericParamConstraint` follows `GenericParam`, and
//! `CustomAttribute` comes last because its parent can be a row of almost any other table.
//!
//! Sorting is stable: rows with equal keys keep their registration order.

use log::debug;

use crate::{
    emit::{
        element::{ElementId, Value},
        registry::TableRegistry,
    },
    metadata::tables::TableId,
    Result,
};

/// The sorted tables in the order they are sorted, each with its key columns.
pub const SORTED_TABLES: [(TableId, &[usize]); 14] = [
    (TableId::NestedClass, &[0]),
    (TableId::GenericParam, &[2, 0]),
    (TableId::GenericParamConstraint, &[0]),
    (TableId::InterfaceImpl, &[0, 1]),
    (TableId::Constant, &[1]),
    (TableId::FieldMarshal, &[0]),
    (TableId::DeclSecurity, &[1]),
    (TableId::ClassLayout, &[2]),
    (TableId::FieldLayout, &[1]),
    (TableId::FieldRVA, &[1]),
    (TableId::MethodSemantics, &[2]),
    (TableId::MethodImpl, &[0]),
    (TableId::ImplMap, &[1]),
    (TableId::CustomAttribute, &[0]),
];

/// The `sorted` bit vector of the tables stream header
#[must_use]
pub fn sorted_mask() -> u64 {
    SORTED_TABLES
        .iter()
        .fold(0, |mask, (table, _)| mask | table.mask())
}

/// On-disk value of `column` of `id`, as used for ordering
fn key_value(registry: &TableRegistry, id: ElementId, column: usize) -> Result<u32> {
    let element = registry.get(id)?;
    let schema = element.table.columns()[column];
    match &element.values[column] {
        Value::Ref(target) => registry.reference_value(id, schema, *target),
        Value::Const(value) | Value::Heap(value) => Ok(*value),
        other => Err(malformed_error!(
            "{} has a non scalar sort key {:?}",
            registry.describe(id),
            other
        )),
    }
}

/// Sort every table of [`SORTED_TABLES`] by its key and reassign its rows.
///
/// # Errors
/// Returns an error if a key references an element this registry does not hold.
pub fn sort_tables(registry: &mut TableRegistry) -> Result<()> {
    for (table, columns) in SORTED_TABLES {
        let rows = registry.rows(table);
        if rows.len() < 2 {
            continue;
        }

        let mut keyed = rows
            .iter()
            .map(|id| {
                let key = columns
                    .iter()
                    .map(|column| key_value(registry, *id, *column))
                    .collect::<Result<Vec<u32>>>()?;
                Ok((key, *id))
            })
            .collect::<Result<Vec<_>>>()?;

        if keyed.windows(2).all(|pair| pair[0].0 <= pair[1].0) {
            continue;
        }

        keyed.sort_by(|left, right| left.0.cmp(&right.0));
        debug!("Sorted {} rows of {:?}", keyed.len(), table);
        registry.reorder(table, keyed.into_iter().map(|(_, id)| id).collect())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(registry: &mut TableRegistry, name: &str) -> ElementId {
        registry
            .register(
                TableId::Field,
                name,
                vec![Value::Const(0), Value::Heap(0), Value::Heap(0)],
            )
            .unwrap()
    }

    fn constant(registry: &mut TableRegistry, parent: ElementId, name: &str) -> ElementId {
        registry
            .register(
                TableId::Constant,
                name,
                vec![Value::Const(8), Value::to(parent), Value::Heap(1)],
            )
            .unwrap()
    }

    #[test]
    fn constants_follow_parents() {
        let mut registry = TableRegistry::new();
        let a = field(&mut registry, "a");
        let b = field(&mut registry, "b");
        let c = field(&mut registry, "c");

        let on_c = constant(&mut registry, c, "c");
        let on_a = constant(&mut registry, a, "a");
        let on_b = constant(&mut registry, b, "b");

        sort_tables(&mut registry).unwrap();
        assert_eq!(registry.rows(TableId::Constant), &[on_a, on_b, on_c]);
        assert_eq!(registry.row_of(on_c).unwrap(), 3);
    }

    #[test]
    fn stable_for_equal_keys() {
        let mut registry = TableRegistry::new();
        let a = field(&mut registry, "a");
        let b = field(&mut registry, "b");

        let first = registry
            .register(
                TableId::FieldMarshal,
                "b1",
                vec![Value::to(b), Value::Heap(1)],
            )
            .unwrap();
        let second = registry
            .register(
                TableId::FieldMarshal,
                "a1",
                vec![Value::to(a), Value::Heap(2)],
            )
            .unwrap();
        let third = registry
            .register(
                TableId::FieldMarshal,
                "b2",
                vec![Value::to(b), Value::Heap(3)],
            )
            .unwrap();

        sort_tables(&mut registry).unwrap();
        assert_eq!(registry.rows(TableId::FieldMarshal), &[second, first, third]);
    }

    #[test]
    fn mask() {
        let mask = sorted_mask();
        assert_ne!(mask & TableId::CustomAttribute.mask(), 0);
        assert_ne!(mask & TableId::GenericParam.mask(), 0);
        assert_eq!(mask & TableId::TypeDef.mask(), 0);
        assert_eq!(mask.count_ones(), 14);
    }
}
