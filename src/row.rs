//! Flat rows returned by the storage backend.
//!
//! A [`Row`] maps (alias, column) to a value. The contract for executors:
//! every row carries a value, possibly [`FilterValue::Null`], for every
//! column of every alias in the plan, and a left-joined branch with no match
//! contributes an all-null segment rather than omitting the row.

use std::collections::HashMap;

use smol_str::SmolStr;

use crate::filter::FilterValue;

/// One flat row of an executed join plan.
#[derive(Debug, Clone, Default)]
pub struct Row {
    segments: HashMap<SmolStr, HashMap<SmolStr, FilterValue>>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, builder-style.
    pub fn set(
        mut self,
        alias: impl Into<SmolStr>,
        column: impl Into<SmolStr>,
        value: impl Into<FilterValue>,
    ) -> Self {
        self.insert(alias, column, value);
        self
    }

    /// Set a value in place.
    pub fn insert(
        &mut self,
        alias: impl Into<SmolStr>,
        column: impl Into<SmolStr>,
        value: impl Into<FilterValue>,
    ) {
        self.segments
            .entry(alias.into())
            .or_default()
            .insert(column.into(), value.into());
    }

    /// Get the value for an alias column, if present.
    pub fn get(&self, alias: &str, column: &str) -> Option<&FilterValue> {
        self.segments.get(alias)?.get(column)
    }

    /// Check whether an alias column is null or absent.
    pub fn is_null(&self, alias: &str, column: &str) -> bool {
        self.get(alias, column).is_none_or(FilterValue::is_null)
    }
}

/// Ordered rows produced by one plan execution.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    rows: Vec<Row>,
}

impl RowSet {
    /// Create an empty row set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row.
    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate rows in order.
    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }
}

impl From<Vec<Row>> for RowSet {
    fn from(rows: Vec<Row>) -> Self {
        Self { rows }
    }
}

impl FromIterator<Row> for RowSet {
    fn from_iter<T: IntoIterator<Item = Row>>(iter: T) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_get_and_null() {
        let row = Row::new()
            .set("customers", "id", 1i64)
            .set("customers", "name", FilterValue::Null);

        assert_eq!(row.get("customers", "id"), Some(&FilterValue::Int(1)));
        assert!(row.is_null("customers", "name"));
        assert!(row.is_null("customers", "missing"));
        assert!(row.is_null("ghosts", "id"));
    }

    #[test]
    fn test_rowset_order() {
        let rows: RowSet = vec![
            Row::new().set("t0", "id", 2i64),
            Row::new().set("t0", "id", 1i64),
        ]
        .into();

        let ids: Vec<_> = rows.iter().map(|r| r.get("t0", "id").cloned()).collect();
        assert_eq!(
            ids,
            vec![Some(FilterValue::Int(2)), Some(FilterValue::Int(1))]
        );
    }
}
