use std::collections::HashMap;
use thiserror::Error;

/// A single value of a [`ColumnTable`].
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Cell::Number(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ColumnError {
    #[error("Required column '{0}' is missing")]
    Missing(String),
    #[error("Column '{column}' has a non-numeric value '{value}' in row {row}")]
    NotNumeric {
        column: String,
        row: usize,
        value: String,
    },
}

/// Format-neutral table: named columns, ordered rows and header attributes.
///
/// Column lookup is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnTable {
    pub headers: HashMap<String, Cell>,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl ColumnTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            headers: HashMap::new(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn header(&self, name: &str) -> Option<&Cell> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn text_column(&self, name: &str) -> Result<Vec<String>, ColumnError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| ColumnError::Missing(name.to_string()))?;
        Ok(self
            .rows
            .iter()
            .map(|row| row.get(idx).map(Cell::as_text).unwrap_or_default())
            .collect())
    }

    pub fn number_column(&self, name: &str) -> Result<Vec<f64>, ColumnError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| ColumnError::Missing(name.to_string()))?;
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let cell = row.get(idx);
                cell.and_then(Cell::as_f64)
                    .ok_or_else(|| ColumnError::NotNumeric {
                        column: name.to_string(),
                        row: i + 1,
                        value: cell.map(Cell::as_text).unwrap_or_default(),
                    })
            })
            .collect()
    }

    /// Like [`number_column`](Self::number_column) but `None` when the column is absent.
    pub fn optional_number_column(&self, name: &str) -> Result<Option<Vec<f64>>, ColumnError> {
        if self.has_column(name) {
            self.number_column(name).map(Some)
        } else {
            Ok(None)
        }
    }
}
