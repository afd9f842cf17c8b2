//! Column-wise interpretation of formula expression trees.
//!
//! Every column reference evaluates to the whole column, so one pass over
//! the tree computes the formula for every row at once.

mod context;
pub mod functions;
pub mod helpers;
mod interpreter;
mod value;

pub use context::EvalContext;
pub use interpreter::evaluate;
pub use value::{map_cells, Value};

use thiserror::Error;

/// Structural failures while evaluating. Cell-level problems such as
/// division by zero are error values, not `EvalError`s.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("unknown sheet: {0}")]
    UnknownSheet(String),

    #[error("unknown column {column} in sheet {sheet}")]
    UnknownColumn { sheet: String, column: String },
}
