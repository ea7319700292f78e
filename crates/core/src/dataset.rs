//! Column-oriented tabular snapshot consumed by the quality engine.
//!
//! A [`Dataset`] is built by a collaborator (the warehouse repository or a
//! test) and is immutable once constructed. Construction checks that every
//! column has the same length and that each cell matches its column kind.

use serde::Serialize;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }
}

/// A single cell. `Null` is valid in any column.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Timestamp(Timestamp),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric view of the cell, `None` for nulls and non-numeric cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(v) => Some(*v as f64),
            CellValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            CellValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    fn fits(&self, kind: ColumnKind) -> bool {
        matches!(
            (self, kind),
            (CellValue::Null, _)
                | (CellValue::Integer(_), ColumnKind::Integer)
                | (CellValue::Float(_), ColumnKind::Float)
                | (CellValue::Text(_), ColumnKind::Text)
                | (CellValue::Boolean(_), ColumnKind::Boolean)
                | (CellValue::Timestamp(_), ColumnKind::Timestamp)
        )
    }
}

/// A named, typed column of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    values: Vec<CellValue>,
}

impl Column {
    /// Create a column, rejecting cells that do not match `kind`.
    pub fn new(
        name: impl Into<String>,
        kind: ColumnKind,
        values: Vec<CellValue>,
    ) -> Result<Self, CoreError> {
        let name = name.into();
        if let Some(idx) = values.iter().position(|v| !v.fits(kind)) {
            return Err(CoreError::MalformedDataset(format!(
                "column '{name}' is {kind:?} but row {idx} holds {:?}",
                values[idx]
            )));
        }
        Ok(Self { name, kind, values })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// Latest non-null timestamp in the column.
    pub fn max_timestamp(&self) -> Option<Timestamp> {
        self.values.iter().filter_map(CellValue::as_timestamp).max()
    }
}

/// An immutable table snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    /// Assemble a dataset from columns of equal length with unique names.
    pub fn new(columns: Vec<Column>) -> Result<Self, CoreError> {
        let row_count = columns.first().map(Column::len).unwrap_or(0);

        for (i, column) in columns.iter().enumerate() {
            if column.len() != row_count {
                return Err(CoreError::MalformedDataset(format!(
                    "column '{}' has {} rows, expected {row_count}",
                    column.name(),
                    column.len()
                )));
            }
            if columns[..i].iter().any(|c| c.name() == column.name()) {
                return Err(CoreError::MalformedDataset(format!(
                    "duplicate column '{}'",
                    column.name()
                )));
            }
        }

        Ok(Self { columns, row_count })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }
}
