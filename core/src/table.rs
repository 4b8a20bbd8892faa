//! In-memory data table handed to base models and predictor builders

use crate::error::{ComposerError, Result};
use crate::types::{RowId, Value, casefold};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A named table of rows keyed by row id
///
/// Column names are case-folded on construction. Cells are `None` when the
/// value is missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: IndexMap<RowId, Vec<Option<Value>>>,
}

impl Table {
    /// Create an empty table
    #[must_use]
    pub fn new(name: impl AsRef<str>, columns: &[&str]) -> Self {
        Self {
            name: casefold(name.as_ref()),
            columns: columns.iter().map(|c| casefold(c)).collect(),
            rows: IndexMap::new(),
        }
    }

    /// Table name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column names in table order
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of a column in the table
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = casefold(name);
        self.columns.iter().position(|c| *c == name)
    }

    /// Insert (or replace) a row
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::InvalidArgument` if the row width does not
    /// match the number of columns
    pub fn insert_row(&mut self, rowid: RowId, values: Vec<Option<Value>>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(ComposerError::invalid(format!(
                "Row {rowid} has {} values, table '{}' has {} columns",
                values.len(),
                self.name,
                self.columns.len()
            )));
        }
        self.rows.insert(rowid, values);
        Ok(())
    }

    /// Builder-style row insertion
    ///
    /// # Errors
    ///
    /// See [`Table::insert_row`]
    pub fn with_row(mut self, rowid: RowId, values: Vec<Option<Value>>) -> Result<Self> {
        self.insert_row(rowid, values)?;
        Ok(self)
    }

    /// Look up a row
    #[must_use]
    pub fn row(&self, rowid: RowId) -> Option<&[Option<Value>]> {
        self.rows.get(&rowid).map(Vec::as_slice)
    }

    /// Look up a row or fail with `RowNotFound`
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::RowNotFound` when the row is absent
    pub fn require_row(&self, rowid: RowId) -> Result<&[Option<Value>]> {
        self.row(rowid).ok_or_else(|| ComposerError::RowNotFound {
            table: self.name.clone(),
            rowid,
        })
    }

    /// Single cell, `None` when missing or when the column is unknown
    #[must_use]
    pub fn cell(&self, rowid: RowId, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(&rowid)?.get(idx)?.as_ref()
    }

    /// Iterate over `(rowid, row)` pairs in insertion order
    pub fn rows(&self) -> impl Iterator<Item = (RowId, &[Option<Value>])> {
        self.rows.iter().map(|(id, row)| (*id, row.as_slice()))
    }

    /// All values of one column, missing cells included
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ColumnNotFound` for an unknown column
    pub fn column_values(&self, column: &str) -> Result<Vec<Option<&Value>>> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| ComposerError::ColumnNotFound(format!("{}.{column}", self.name)))?;
        Ok(self.rows.values().map(|row| row[idx].as_ref()).collect())
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table holds no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rows_and_cells() {
        let table = Table::new("Satellites", &["Perigee", "Class"])
            .with_row(1, vec![Some(Value::Number(500.0)), Some("LEO".into())])
            .unwrap()
            .with_row(2, vec![None, Some("GEO".into())])
            .unwrap();

        assert_eq!(table.name(), "satellites");
        assert_eq!(table.column_index("CLASS"), Some(1));
        assert_eq!(table.cell(1, "perigee"), Some(&Value::Number(500.0)));
        assert_eq!(table.cell(2, "perigee"), None);
        assert_eq!(table.column_values("class").unwrap().len(), 2);
    }

    #[test]
    fn test_missing_row_and_bad_width() {
        let mut table = Table::new("t", &["a"]);
        assert!(matches!(
            table.require_row(9),
            Err(ComposerError::RowNotFound { rowid: 9, .. })
        ));
        assert!(table.insert_row(1, vec![None, None]).is_err());
    }
}
