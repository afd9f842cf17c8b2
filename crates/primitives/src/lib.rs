//! # recalc-primitives
//!
//! Cell values, error literals, column-letter arithmetic and Excel serial
//! dates shared by every recalc crate.

pub mod address;
pub mod datetime;
mod value;

pub use address::{
    column_index_to_letter, column_letter_to_index, desanitize_sheet_name, sanitize_sheet_name,
    AddressError, CellAddress,
};
pub use value::{CellValue, ErrorValue};
