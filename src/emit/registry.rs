//! The table registry: one ordered sequence of elements per table.
//!
//! Registration appends an element to its table and hands out the 1-based row it occupies.
//! Rows are stable except for the tables the sort phase reorders, which is why everything
//! outside the registry holds [`ElementId`]s.

use std::collections::HashMap;

use log::trace;
use strum::{EnumCount, IntoEnumIterator};

use crate::{
    emit::element::{Element, ElementId, Value},
    metadata::{
        tables::{Column, TableId},
        token::{Token, MAX_TOKEN_ROW},
    },
    Error, Result,
};

/// All elements of one build, grouped by table in row order.
#[derive(Debug, Clone)]
pub struct TableRegistry {
    elements: Vec<Element>,
    tables: Vec<Vec<ElementId>>,
    identities: HashMap<(TableId, String), ElementId>,
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRegistry {
    /// An empty registry
    #[must_use]
    pub fn new() -> Self {
        TableRegistry {
            elements: Vec::new(),
            tables: vec![Vec::new(); TableId::COUNT],
            identities: HashMap::new(),
        }
    }

    /// Append an element to `table` and return its id.
    ///
    /// `values` holds one value per column of the table schema. `identity` must be unique
    /// within the table.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateElement`] if `identity` is already registered in `table`,
    /// [`Error::FormatOverflow`] if the table is full, or [`Error::Malformed`] if the value
    /// count does not match the schema.
    pub fn register(
        &mut self,
        table: TableId,
        identity: impl Into<String>,
        values: Vec<Value>,
    ) -> Result<ElementId> {
        let identity = identity.into();
        if values.len() != table.columns().len() {
            return Err(malformed_error!(
                "{:?} element {} has {} values, expected {}",
                table,
                identity,
                values.len(),
                table.columns().len()
            ));
        }

        if self.identities.contains_key(&(table, identity.clone())) {
            return Err(Error::DuplicateElement { table, identity });
        }

        let rows = &mut self.tables[table as usize];
        let row = u32::try_from(rows.len() + 1).unwrap_or(u32::MAX);
        if row > MAX_TOKEN_ROW {
            return Err(Error::FormatOverflow {
                what: "table row count",
                value: u64::from(row),
                max: u64::from(MAX_TOKEN_ROW),
            });
        }

        let id = ElementId(u32::try_from(self.elements.len()).map_err(|_| {
            Error::FormatOverflow {
                what: "element count",
                value: self.elements.len() as u64,
                max: u64::from(u32::MAX),
            }
        })?);

        trace!("{:?} row {} <- {}", table, row, identity);
        rows.push(id);
        self.identities.insert((table, identity.clone()), id);
        self.elements.push(Element {
            table,
            row,
            identity,
            values,
        });

        Ok(id)
    }

    /// The element registered in `table` under `identity`
    #[must_use]
    pub fn find(&self, table: TableId, identity: &str) -> Option<ElementId> {
        self.identities.get(&(table, identity.to_string())).copied()
    }

    /// The element behind `id`
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedReference`] if `id` was not handed out by this registry.
    pub fn get(&self, id: ElementId) -> Result<&Element> {
        self.elements
            .get(id.index())
            .ok_or_else(|| Error::UnresolvedReference {
                from: "registry".to_string(),
                target: id.to_string(),
            })
    }

    /// The element behind `id`, for modification
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedReference`] if `id` was not handed out by this registry.
    pub fn get_mut(&mut self, id: ElementId) -> Result<&mut Element> {
        self.elements
            .get_mut(id.index())
            .ok_or_else(|| Error::UnresolvedReference {
                from: "registry".to_string(),
                target: id.to_string(),
            })
    }

    /// Replace column `column` of `id`.
    ///
    /// Used for values only known after the element was registered, such as the child list
    /// of a type whose fields are registered after it.
    ///
    /// # Errors
    /// Returns an error if `id` is unknown or `column` is outside the schema.
    pub fn set(&mut self, id: ElementId, column: usize, value: Value) -> Result<()> {
        let element = self.get_mut(id)?;
        let table = element.table;
        match element.values.get_mut(column) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(malformed_error!(
                "{:?} has no column {}",
                table,
                column
            )),
        }
    }

    /// Current row of `id`
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedReference`] if `id` is unknown.
    pub fn row_of(&self, id: ElementId) -> Result<u32> {
        Ok(self.get(id)?.row)
    }

    /// Current token of `id`
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedReference`] if `id` is unknown.
    pub fn token_of(&self, id: ElementId) -> Result<Token> {
        let element = self.get(id)?;
        Token::from_parts(element.table, element.row)
    }

    /// Element ids of `table` in row order
    #[must_use]
    pub fn rows(&self, table: TableId) -> &[ElementId] {
        &self.tables[table as usize]
    }

    /// Number of rows in `table`
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // bounded by MAX_TOKEN_ROW on registration
    pub fn row_count(&self, table: TableId) -> u32 {
        self.tables[table as usize].len() as u32
    }

    /// Row count of every table
    pub fn row_counts(&self) -> impl Iterator<Item = (TableId, u32)> + '_ {
        TableId::iter().map(|table| (table, self.row_count(table)))
    }

    /// Number of elements over all tables
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// All elements, in registration order
    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &Element)> {
        self.elements
            .iter()
            .enumerate()
            .map(|(index, element)| (ElementId(index as u32), element))
    }

    /// The value a reference column holds on disk: a row for table columns, the combined
    /// `(row << tag_bits) | tag` for coded columns, 0 for the null reference.
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedReference`] for an unknown target, or [`Error::Malformed`]
    /// if the target's table can not be referenced through the column.
    pub fn reference_value(
        &self,
        from: ElementId,
        column: Column,
        target: Option<ElementId>,
    ) -> Result<u32> {
        let Some(target) = target else {
            return Ok(0);
        };

        let Some(element) = self.elements.get(target.index()) else {
            return Err(Error::UnresolvedReference {
                from: self.describe(from),
                target: target.to_string(),
            });
        };

        match column {
            Column::Table(table) if table == element.table => Ok(element.row),
            Column::Coded(kind) => kind.encode(element.table, element.row),
            _ => Err(malformed_error!(
                "{} references {:?} row {} through column {:?}",
                self.describe(from),
                element.table,
                element.row,
                column
            )),
        }
    }

    /// `Table:identity` of `id`, for diagnostics
    #[must_use]
    pub fn describe(&self, id: ElementId) -> String {
        match self.elements.get(id.index()) {
            Some(element) => format!("{:?}:{}", element.table, element.identity),
            None => id.to_string(),
        }
    }

    /// Replace the row order of `table` and renumber its elements.
    ///
    /// `order` must be a permutation of the current rows.
    pub(crate) fn reorder(&mut self, table: TableId, order: Vec<ElementId>) -> Result<()> {
        if order.len() != self.tables[table as usize].len() {
            return Err(malformed_error!(
                "Reordering {:?} with {} of {} rows",
                table,
                order.len(),
                self.tables[table as usize].len()
            ));
        }

        for (index, id) in order.iter().enumerate() {
            let element = self.get_mut(*id)?;
            let row = index as u32 + 1;
            if element.row != row {
                trace!("{:?} {} moves {} -> {}", table, element.identity, element.row, row);
            }
            element.row = row;
        }

        self.tables[table as usize] = order;
        Ok(())
    }
}
