//! Error types for recalculation.

use recalc_dag::DagError;
use recalc_formulas::FormulaError;
use recalc_sheet::SheetError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from building or ordering the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Node or edge error from the underlying graph.
    #[error(transparent)]
    Dag(#[from] DagError),

    /// A translated formula belongs to a different sheet than the one
    /// being registered.
    #[error("Formula for {node} does not belong to sheet {sheet}")]
    ForeignFormula { node: String, sheet: String },
}

/// Errors from the evaluation engine. Any of these aborts the whole pass.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or empty input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Result shape cannot be stored as one column.
    #[error("Shape mismatch in {formula}: {message}")]
    ShapeMismatch { formula: String, message: String },

    /// Evaluating a formula failed.
    #[error("Error evaluating formula {formula}: {message}")]
    Evaluation { formula: String, message: String },

    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Worker pool could not be created.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

/// Configuration errors, naming the offending key.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Session-level error wrapping every stage.
#[derive(Debug, Error)]
pub enum RecalcError {
    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error(transparent)]
    Sheet(#[from] SheetError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Validation failed and the configuration asks to stop before output.
    #[error("Validation failed: {}", errors.join("; "))]
    ValidationFailed { errors: Vec<String> },
}

pub type Result<T> = std::result::Result<T, RecalcError>;
