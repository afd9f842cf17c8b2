use thiserror::Error;

/// Errors raised while building, reading or writing worksheets
#[derive(Error, Debug)]
pub enum SheetError {
    #[error(
        "Inconsistent formula in {sheet}.{column}: row {row} has '{conflicting}', expected '{first}'"
    )]
    InconsistentColumnFormula {
        sheet: String,
        column: String,
        first: String,
        conflicting: String,
        row: usize,
    },

    #[error("Duplicate column name in {sheet}: {name}")]
    DuplicateColumnName { sheet: String, name: String },

    #[error("Empty column name in {sheet} at position {index}")]
    EmptyColumnName { sheet: String, index: usize },

    #[error("Column not found in {sheet}: {name}")]
    ColumnNotFound { sheet: String, name: String },

    #[error("Sheet not found: {name}")]
    SheetNotFound { name: String },

    #[error("Sheet already exists: {name}")]
    SheetAlreadyExists { name: String },

    #[error("Data length mismatch for column {column}: expected {expected}, got {actual}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Row {row} of {sheet} has {actual} cells, header has {expected}")]
    RowWidthMismatch {
        sheet: String,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Excel error: {0}")]
    Xlsx(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SheetError>;
