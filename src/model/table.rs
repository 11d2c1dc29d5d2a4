//! Result tables produced by multi-value calculations

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::parameter::RangeSel;

/// Identifier of a result table within a [`crate::model::ModelArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A named, headered rectangular numeric table.
///
/// Tables are the materialized results of multi-value evaluation.
/// Parameters do not store matrices themselves; they point into
/// tables via [`crate::model::TablePointer`].
#[derive(Debug, Clone)]
pub struct ResultTable {
    id: TableId,

    /// Display name of the table
    pub name: String,

    row_headers: Vec<String>,
    col_headers: Vec<String>,
    values: Array2<f64>,
}

impl ResultTable {
    /// Create a table with default positional headers.
    pub fn new(id: TableId, name: &str, values: Array2<f64>) -> Self {
        let row_headers = (1..=values.nrows()).map(|i| format!("Row {}", i)).collect();
        let col_headers = (1..=values.ncols()).map(|j| format!("Col {}", j)).collect();
        Self {
            id,
            name: name.to_string(),
            row_headers,
            col_headers,
            values,
        }
    }

    /// Create a table with explicit headers.
    ///
    /// Header lists shorter than the value extent are padded with
    /// positional names; longer lists are truncated.
    pub fn with_headers(
        id: TableId,
        name: &str,
        values: Array2<f64>,
        row_headers: Vec<String>,
        col_headers: Vec<String>,
    ) -> Self {
        let mut table = Self::new(id, name, values);
        for (i, header) in row_headers.into_iter().enumerate().take(table.values.nrows()) {
            table.row_headers[i] = header;
        }
        for (j, header) in col_headers.into_iter().enumerate().take(table.values.ncols()) {
            table.col_headers[j] = header;
        }
        table
    }

    /// The table's identifier.
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Number of rows and columns.
    pub fn dims(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// All values.
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Row header labels.
    pub fn row_headers(&self) -> &[String] {
        &self.row_headers
    }

    /// Column header labels.
    pub fn col_headers(&self) -> &[String] {
        &self.col_headers
    }

    /// Replace the values in place, keeping identity and headers.
    ///
    /// Only shape-compatible replacements are accepted; anything else
    /// must go through a fresh table so headers stay meaningful.
    pub fn replace_values(&mut self, values: Array2<f64>) -> bool {
        if values.dim() != self.values.dim() {
            return false;
        }
        self.values = values;
        true
    }

    /// Copy out a clamped sub-range of the values.
    pub fn value_range(&self, rows: &RangeSel, cols: &RangeSel) -> Array2<f64> {
        let (r0, r1) = rows.resolve(self.values.nrows());
        let (c0, c1) = cols.resolve(self.values.ncols());
        Array2::from_shape_fn((r1 - r0, c1 - c0), |(r, c)| self.values[[r0 + r, c0 + c]])
    }
}
