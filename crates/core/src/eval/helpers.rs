//! Helpers available to every function implementation.

use super::value::Value;
use recalc_primitives::{CellValue, ErrorValue};

/// Numeric coercion used by operators and math functions.
pub fn to_numeric(value: &CellValue) -> Result<f64, ErrorValue> {
    value.as_number()
}

/// Truncated integer argument. NaN, infinities and anything beyond the
/// `i32` range are `#NUM!`.
pub fn to_whole(value: &CellValue) -> Result<i64, ErrorValue> {
    let n = to_numeric(value)?.trunc();
    if !n.is_finite() || n < f64::from(i32::MIN) || n > f64::from(i32::MAX) {
        return Err(ErrorValue::Num);
    }
    Ok(n as i64)
}

/// Apply `reduce` to `values`, or return 0 when there is nothing to reduce.
pub fn aggregate_or_zero(values: &[f64], reduce: impl FnOnce(&[f64]) -> f64) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        reduce(values)
    }
}

/// First non-null value, or null.
pub fn coalesce<'a>(values: impl IntoIterator<Item = &'a CellValue>) -> CellValue {
    values
        .into_iter()
        .find(|value| !value.is_null())
        .cloned()
        .unwrap_or_default()
}

pub fn is_error(value: &CellValue) -> bool {
    value.is_error()
}

/// `fallback` when `value` is an error, `value` otherwise.
pub fn if_error(value: &CellValue, fallback: &CellValue) -> CellValue {
    if is_error(value) {
        fallback.clone()
    } else {
        value.clone()
    }
}

/// First error among `values`.
pub fn first_error<'a>(values: impl IntoIterator<Item = &'a CellValue>) -> Option<ErrorValue> {
    values.into_iter().find_map(|value| match value {
        CellValue::Error(e) => Some(*e),
        _ => None,
    })
}

/// Spread a scalar, or a column of length one, across `rows` rows.
/// Longer values and two-dimensional values are not broadcast.
pub fn broadcast(value: &Value, rows: usize) -> Option<Vec<CellValue>> {
    match value {
        Value::Scalar(cell) => Some(vec![cell.clone(); rows]),
        Value::Column(cells) if cells.len() == 1 => Some(vec![cells[0].clone(); rows]),
        _ => None,
    }
}
