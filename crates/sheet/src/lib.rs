//! # recalc-sheet
//!
//! Worksheet and workbook model for column recalculation, plus the I/O at
//! its edges:
//!
//! - [`Table`] holds ordered, equal-length named columns.
//! - [`Worksheet`] pairs a table with its input and formula columns and
//!   enforces one formula text per formula column.
//! - [`Workbook`] keeps worksheets in workbook order.
//! - [`xlsx`] reads workbooks with `calamine` and writes them with
//!   `rust_xlsxwriter`; [`csv`] and [`output`] write recomputed tables.
//!
//! ```
//! use recalc_primitives::CellValue;
//! use recalc_sheet::Worksheet;
//!
//! let sheet = Worksheet::from_grid(
//!     "Sheet1",
//!     vec!["A".into(), "B".into()],
//!     vec![vec![CellValue::Int(1), CellValue::Null]],
//!     vec![vec![None, Some("=A*2".into())]],
//! )
//! .unwrap();
//! assert_eq!(sheet.formula("B"), Some("=A*2"));
//! ```

mod book;
pub mod csv;
mod error;
pub mod output;
mod table;
mod worksheet;
pub mod xlsx;

pub use book::Workbook;
pub use error::{Result, SheetError};
pub use output::{write_tables, OutputFormat};
pub use table::Table;
pub use worksheet::Worksheet;
