use thiserror::Error;

/// Structural problems when assembling a [`ResultTable`](crate::data::model::ResultTable).
#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("row {row} has {found} cells but the table has {expected} columns")]
    RowWidth {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
}

/// A request that cannot be applied to a table.  Aborts one figure, never a batch.
#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("{keys} select keys but {values} select values")]
    MismatchedSelect { keys: usize, values: usize },
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("row {row}: column '{column}' has {found} elements but '{reference}' has {expected}")]
    RaggedPayload {
        row: usize,
        column: String,
        found: usize,
        reference: String,
        expected: usize,
    },
    #[error("invalid range ({lo}, {hi})")]
    InvalidRange { lo: f64, hi: f64 },
    #[error("percentile {0} outside [0, 100]")]
    InvalidPercentile(f64),
}

/// Two sequences that must pair up element by element differ in length.
#[derive(Debug, Error, PartialEq)]
#[error("x has {x} points but y has {y}")]
pub struct ShapeError {
    pub x: usize,
    pub y: usize,
}

#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("unknown fit function '{0}'")]
    UnknownFunction(String),
    #[error("fit function '{name}' takes {expected} parameters, got {found}")]
    ParameterCount {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error(transparent)]
    Shape(#[from] ShapeError),
}
