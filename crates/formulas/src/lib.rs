//! # recalc-formulas
//!
//! Turns the formula text shared by a whole column into a typed
//! expression tree.
//!
//! - [`refs`] extracts and resolves cell, range and column tokens.
//! - [`parser`] builds the expression tree, resolving references as it goes.
//! - [`functions`] is the fixed table of supported functions.
//! - [`translator`] wraps the above into a [`Formula`] with its category and
//!   dependency set.

mod error;
pub mod expr;
pub mod functions;
pub mod parser;
pub mod refs;
pub mod translator;

pub use error::{FormulaError, Result};
pub use expr::{BinaryOperator, ColumnRef, FormulaExpr, RangeRef, SheetScope, UnaryOperator};
pub use functions::Function;
pub use refs::{extract_references, ColumnKey, RefTarget, Reference, ReferenceResolver, SheetCatalog};
pub use translator::{Formula, FormulaCategory, FormulaTranslator};
