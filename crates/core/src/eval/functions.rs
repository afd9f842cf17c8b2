//! Implementations of the supported spreadsheet functions.
//!
//! Dispatch is a `match` on [`Function`], so every function the translator
//! accepts has exactly one implementation here.

use super::helpers::{aggregate_or_zero, coalesce, if_error, is_error, to_numeric, to_whole};
use super::value::{map_cells, Value};
use chrono::{Days, Local, Months, NaiveDate, NaiveDateTime, NaiveTime};
use recalc_formulas::Function;
use recalc_primitives::{CellValue, ErrorValue};
use std::cmp::Ordering;

static BLANK: Value = Value::Scalar(CellValue::Null);
static FALSE: Value = Value::Scalar(CellValue::Bool(false));
static TRUE: Value = Value::Scalar(CellValue::Bool(true));
static ONE: Value = Value::Scalar(CellValue::Int(1));

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&BLANK)
}

fn arg_or<'a>(args: &'a [Value], index: usize, default: &'a Value) -> &'a Value {
    args.get(index).unwrap_or(default)
}

fn cell_result(result: Result<CellValue, ErrorValue>) -> CellValue {
    result.unwrap_or_else(CellValue::Error)
}

/// Call `function` with evaluated arguments.
pub fn call(function: Function, args: &[Value]) -> Value {
    match function {
        Function::Sum => aggregate(args, |values| values.iter().sum()),
        Function::Average => aggregate(args, |values| values.iter().sum::<f64>() / values.len() as f64),
        Function::Count => Value::Scalar(CellValue::Int(numeric_cells(args).len() as i64)),
        Function::Max => aggregate(args, |values| values.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        Function::Min => aggregate(args, |values| values.iter().copied().fold(f64::INFINITY, f64::min)),

        Function::If => map_cells(
            &[arg(args, 0), arg(args, 1), arg_or(args, 2, &FALSE)],
            |cells| match cells[0].as_bool() {
                Ok(true) => cells[1].clone(),
                Ok(false) => cells[2].clone(),
                Err(e) => CellValue::Error(e),
            },
        ),
        Function::And => logical_fold(args, true, |acc, b| acc && b),
        Function::Or => logical_fold(args, false, |acc, b| acc || b),
        Function::Not => map_cells(&[arg(args, 0)], |cells| {
            cell_result(cells[0].as_bool().map(|b| CellValue::Bool(!b)))
        }),
        Function::IfError => map_cells(&[arg(args, 0), arg(args, 1)], |cells| {
            if_error(cells[0], cells[1])
        }),
        Function::IsError => map_cells(&[arg(args, 0)], |cells| CellValue::Bool(is_error(cells[0]))),

        Function::VLookup => vlookup(args),
        Function::HLookup => hlookup(args),
        Function::Index => index(args),
        Function::Match => match_position(args),

        Function::Concatenate => {
            let refs: Vec<&Value> = args.iter().collect();
            map_cells(&refs, |cells| {
                cell_result(cells.iter().map(|cell| cell.as_text()).collect::<Result<String, _>>().map(CellValue::Text))
            })
        }
        Function::Left => map_cells(&[arg(args, 0), arg_or(args, 1, &ONE)], |cells| {
            cell_result(text_slice(cells[0], cells[1], |chars, n| chars.iter().take(n).collect()))
        }),
        Function::Right => map_cells(&[arg(args, 0), arg_or(args, 1, &ONE)], |cells| {
            cell_result(text_slice(cells[0], cells[1], |chars, n| {
                chars[chars.len().saturating_sub(n)..].iter().collect()
            }))
        }),
        Function::Mid => map_cells(&[arg(args, 0), arg(args, 1), arg(args, 2)], |cells| {
            cell_result(mid(cells[0], cells[1], cells[2]))
        }),
        Function::Len => map_cells(&[arg(args, 0)], |cells| {
            cell_result(cells[0].as_text().map(|text| CellValue::Int(text.chars().count() as i64)))
        }),

        Function::Date => map_cells(&[arg(args, 0), arg(args, 1), arg(args, 2)], |cells| {
            cell_result(date(cells[0], cells[1], cells[2]))
        }),
        Function::EDate => map_cells(&[arg(args, 0), arg(args, 1)], |cells| {
            cell_result(edate(cells[0], cells[1]))
        }),
        Function::Today => Value::Scalar(CellValue::Timestamp(
            Local::now().date_naive().and_time(NaiveTime::MIN),
        )),

        Function::Round => round_with(args, f64::round),
        Function::RoundUp => round_with(args, f64::ceil),
        Function::RoundDown => round_with(args, f64::floor),
    }
}

// Aggregates

fn numeric_cells(args: &[Value]) -> Vec<f64> {
    args.iter()
        .flat_map(Value::cells)
        .filter_map(CellValue::as_f64)
        .collect()
}

fn aggregate(args: &[Value], reduce: impl FnOnce(&[f64]) -> f64) -> Value {
    let values = numeric_cells(args);
    Value::Scalar(CellValue::number(aggregate_or_zero(&values, reduce)))
}

// Logical

fn fold_bools(cells: &[&CellValue], init: bool, op: fn(bool, bool) -> bool) -> CellValue {
    let mut acc = init;
    for cell in cells.iter().filter(|cell| !cell.is_null()) {
        match cell.as_bool() {
            Ok(b) => acc = op(acc, b),
            Err(e) => return CellValue::Error(e),
        }
    }
    CellValue::Bool(acc)
}

/// AND/OR: tables collapse per row first, then arguments combine
/// elementwise.
fn logical_fold(args: &[Value], init: bool, op: fn(bool, bool) -> bool) -> Value {
    let reduced: Vec<Value> = args
        .iter()
        .map(|value| value.reduce_rows(|cells| fold_bools(cells, init, op)))
        .collect();
    let refs: Vec<&Value> = reduced.iter().collect();
    map_cells(&refs, |cells| fold_bools(cells, init, op))
}

// Lookup

/// Positive whole-number position argument (1-based).
fn position(value: &CellValue) -> Result<usize, ErrorValue> {
    usize::try_from(to_whole(value)?)
        .ok()
        .filter(|n| *n >= 1)
        .ok_or(ErrorValue::Value)
}

fn exact_match<'a>(needle: &CellValue, candidates: impl IntoIterator<Item = &'a CellValue>) -> Option<usize> {
    candidates.into_iter().position(|candidate| candidate.loose_eq(needle))
}

/// Last position whose value is `<= needle` in ascending data, or
/// `>= needle` in descending data.
fn approximate_match<'a>(
    needle: &CellValue,
    candidates: impl IntoIterator<Item = &'a CellValue>,
    descending: bool,
) -> Option<usize> {
    let mut found = None;
    for (i, candidate) in candidates.into_iter().enumerate() {
        if candidate.is_null() {
            continue;
        }
        let Some(ordering) = candidate.compare(needle) else {
            continue;
        };
        let ordering = if descending { ordering.reverse() } else { ordering };
        match ordering {
            Ordering::Less => found = Some(i),
            Ordering::Equal => found = Some(i),
            Ordering::Greater => break,
        }
    }
    found
}

fn lookup_result(cell: Option<&CellValue>) -> CellValue {
    cell.map_or(CellValue::Error(ErrorValue::Ref), |value| {
        coalesce([value, &CellValue::Int(0)])
    })
}

fn vlookup(args: &[Value]) -> Value {
    let table = arg(args, 1);
    let (rows, cols) = table.shape();
    map_cells(
        &[arg(args, 0), arg(args, 2), arg_or(args, 3, &TRUE)],
        |cells| {
            cell_result((|| {
                if let CellValue::Error(e) = cells[0] {
                    return Err(*e);
                }
                let col = position(cells[1])?;
                if col > cols {
                    return Err(ErrorValue::Ref);
                }
                let keys = (0..rows).filter_map(|row| table.cell(row, 0));
                let found = if cells[2].as_bool()? {
                    approximate_match(cells[0], keys, false)
                } else {
                    exact_match(cells[0], keys)
                };
                let row = found.ok_or(ErrorValue::NA)?;
                Ok(lookup_result(table.cell(row, col.saturating_sub(1))))
            })())
        },
    )
}

fn hlookup(args: &[Value]) -> Value {
    let table = arg(args, 1);
    let (rows, cols) = table.shape();
    map_cells(
        &[arg(args, 0), arg(args, 2), arg_or(args, 3, &TRUE)],
        |cells| {
            cell_result((|| {
                if let CellValue::Error(e) = cells[0] {
                    return Err(*e);
                }
                let row = position(cells[1])?;
                if row > rows {
                    return Err(ErrorValue::Ref);
                }
                let keys = (0..cols).filter_map(|col| table.cell(0, col));
                let found = if cells[2].as_bool()? {
                    approximate_match(cells[0], keys, false)
                } else {
                    exact_match(cells[0], keys)
                };
                let col = found.ok_or(ErrorValue::NA)?;
                Ok(lookup_result(table.cell(row.saturating_sub(1), col)))
            })())
        },
    )
}

/// INDEX(array, row[, col]). With a single-row array and no column
/// argument the row argument selects the column.
fn index(args: &[Value]) -> Value {
    let array = arg(args, 0);
    let (rows, cols) = array.shape();
    let row_selects_column = args.len() < 3 && rows == 1 && cols > 1;
    map_cells(&[arg(args, 1), arg_or(args, 2, &ONE)], |cells| {
        cell_result((|| {
            let first = position(cells[0])?;
            let second = position(cells[1])?;
            let (row, col) = if row_selects_column { (1, first) } else { (first, second) };
            if row > rows || col > cols {
                return Err(ErrorValue::Ref);
            }
            let (row, col) = row.checked_sub(1).zip(col.checked_sub(1)).ok_or(ErrorValue::Ref)?;
            array.cell(row, col).cloned().ok_or(ErrorValue::Ref)
        })())
    })
}

/// MATCH(value, array[, type]): 1-based position, `#N/A` when absent.
fn match_position(args: &[Value]) -> Value {
    let array = arg(args, 1).vector();
    map_cells(&[arg(args, 0), arg_or(args, 2, &ONE)], |cells| {
        cell_result((|| {
            if let CellValue::Error(e) = cells[0] {
                return Err(*e);
            }
            let candidates = array.as_ref().ok_or(ErrorValue::NA)?;
            let kind = to_numeric(cells[1])?;
            let found = if kind == 0.0 {
                exact_match(cells[0], candidates.iter().copied())
            } else {
                approximate_match(cells[0], candidates.iter().copied(), kind < 0.0)
            };
            let pos = found.ok_or(ErrorValue::NA)?;
            Ok(CellValue::Int(pos as i64 + 1))
        })())
    })
}

// Text

fn char_count(value: &CellValue) -> Result<usize, ErrorValue> {
    usize::try_from(to_whole(value)?).map_err(|_| ErrorValue::Value)
}

fn text_slice(
    text: &CellValue,
    count: &CellValue,
    take: impl Fn(&[char], usize) -> String,
) -> Result<CellValue, ErrorValue> {
    let chars: Vec<char> = text.as_text()?.chars().collect();
    let n = char_count(count)?;
    Ok(CellValue::Text(take(&chars, n)))
}

fn mid(text: &CellValue, start: &CellValue, count: &CellValue) -> Result<CellValue, ErrorValue> {
    let text = text.as_text()?;
    let start = position(start)?;
    let n = char_count(count)?;
    Ok(CellValue::Text(text.chars().skip(start.saturating_sub(1)).take(n).collect()))
}

// Date

fn midnight(date: NaiveDate) -> CellValue {
    CellValue::Timestamp(NaiveDateTime::new(date, NaiveTime::MIN))
}

fn shift_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let amount = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        date.checked_add_months(amount)
    } else {
        date.checked_sub_months(amount)
    }
}

fn shift_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    let amount = Days::new(days.unsigned_abs());
    if days >= 0 {
        date.checked_add_days(amount)
    } else {
        date.checked_sub_days(amount)
    }
}

/// DATE(year, month, day) with month and day overflow rolling forward or
/// back; years below 1900 are offset by 1900.
fn date(year: &CellValue, month: &CellValue, day: &CellValue) -> Result<CellValue, ErrorValue> {
    let mut year = to_whole(year)?;
    let month = to_whole(month)?;
    let day = to_whole(day)?;
    if (0..1900).contains(&year) {
        year += 1900;
    }
    if !(0..=9999).contains(&year) {
        return Err(ErrorValue::Num);
    }

    let year = i32::try_from(year).map_err(|_| ErrorValue::Num)?;
    let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or(ErrorValue::Num)?;
    let date = month
        .checked_sub(1)
        .and_then(|months| shift_months(start, months))
        .zip(day.checked_sub(1))
        .and_then(|(d, days)| shift_days(d, days))
        .ok_or(ErrorValue::Num)?;
    Ok(midnight(date))
}

/// EDATE(start, months): same day `months` later, clamped to month end.
fn edate(start: &CellValue, months: &CellValue) -> Result<CellValue, ErrorValue> {
    let start = start.as_timestamp()?.date();
    let months = to_whole(months)?;
    shift_months(start, months).map(midnight).ok_or(ErrorValue::Num)
}

// Math

/// Scale by `10^digits`, apply `op` to the magnitude, keep the sign.
fn round_with(args: &[Value], op: fn(f64) -> f64) -> Value {
    map_cells(&[arg(args, 0), arg(args, 1)], |cells| {
        cell_result((|| {
            let value = to_numeric(cells[0])?;
            let digits = i32::try_from(to_whole(cells[1])?).map_err(|_| ErrorValue::Num)?;
            let factor = 10f64.powi(digits);
            Ok(CellValue::number(value.signum() * op(value.abs() * factor) / factor))
        })())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(value: impl Into<CellValue>) -> Value {
        Value::Scalar(value.into())
    }

    fn column(values: &[f64]) -> Value {
        Value::Column(values.iter().map(|v| CellValue::Float(*v)).collect())
    }

    fn single(value: Value) -> CellValue {
        match value {
            Value::Scalar(cell) => cell,
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[test]
    fn test_aggregates_ignore_text_and_default_to_zero() {
        let values = Value::Column(vec![1.into(), "x".into(), CellValue::Null, 2.5.into()]);
        assert_eq!(single(call(Function::Sum, &[values.clone()])), CellValue::Float(3.5));
        assert_eq!(single(call(Function::Count, &[values.clone()])), CellValue::Int(2));
        assert_eq!(single(call(Function::Average, &[values])), CellValue::Float(1.75));
        let empty = Value::Column(vec![]);
        assert_eq!(single(call(Function::Max, &[empty.clone()])), CellValue::Float(0.0));
        assert_eq!(single(call(Function::Average, &[empty])), CellValue::Float(0.0));
    }

    #[test]
    fn test_if_selects_elementwise() {
        let cond = Value::Column(vec![true.into(), false.into()]);
        let result = call(Function::If, &[cond.clone(), scalar("yes"), scalar("no")]);
        assert_eq!(result, Value::Column(vec!["yes".into(), "no".into()]));
        let result = call(Function::If, &[cond, scalar(1)]);
        assert_eq!(result, Value::Column(vec![1.into(), false.into()]));
    }

    #[test]
    fn test_and_or_not() {
        let a = Value::Column(vec![true.into(), true.into(), false.into()]);
        let b = Value::Column(vec![true.into(), false.into(), false.into()]);
        assert_eq!(
            call(Function::And, &[a.clone(), b.clone()]),
            Value::Column(vec![true.into(), false.into(), false.into()])
        );
        assert_eq!(
            call(Function::Or, &[a, b.clone()]),
            Value::Column(vec![true.into(), true.into(), false.into()])
        );
        assert_eq!(
            call(Function::Not, &[b]),
            Value::Column(vec![false.into(), true.into(), true.into()])
        );
        let table = Value::Table(vec![vec![true.into(), true.into()], vec![true.into(), false.into()]]);
        assert_eq!(
            call(Function::And, &[table]),
            Value::Column(vec![true.into(), false.into()])
        );
    }

    #[test]
    fn test_iferror_iserror() {
        let values = Value::Column(vec![CellValue::Error(ErrorValue::Div0), 4.into()]);
        assert_eq!(
            call(Function::IfError, &[values.clone(), scalar(0)]),
            Value::Column(vec![0.into(), 4.into()])
        );
        assert_eq!(
            call(Function::IsError, &[values]),
            Value::Column(vec![true.into(), false.into()])
        );
    }

    fn price_table() -> Value {
        Value::Table(vec![
            vec!["apple".into(), "banana".into(), "cherry".into()],
            vec![1.5.into(), CellValue::Null, 3.0.into()],
        ])
    }

    #[test]
    fn test_vlookup_exact_and_errors() {
        let keys = Value::Column(vec!["banana".into(), "CHERRY".into(), "kiwi".into()]);
        let result = call(Function::VLookup, &[keys, price_table(), scalar(2), scalar(false)]);
        assert_eq!(
            result,
            Value::Column(vec![0.into(), 3.0.into(), CellValue::Error(ErrorValue::NA)])
        );
        let too_wide = call(Function::VLookup, &[scalar("apple"), price_table(), scalar(3), scalar(false)]);
        assert_eq!(single(too_wide), CellValue::Error(ErrorValue::Ref));
    }

    #[test]
    fn test_vlookup_approximate() {
        let bands = Value::Table(vec![
            vec![0.into(), 10.into(), 20.into()],
            vec!["low".into(), "mid".into(), "high".into()],
        ]);
        let result = call(Function::VLookup, &[column(&[5.0, 10.0, 99.0, -1.0]), bands, scalar(2)]);
        assert_eq!(
            result,
            Value::Column(vec![
                "low".into(),
                "mid".into(),
                "high".into(),
                CellValue::Error(ErrorValue::NA)
            ])
        );
    }

    #[test]
    fn test_hlookup() {
        let table = Value::Table(vec![
            vec!["q1".into(), 100.into()],
            vec!["q2".into(), 200.into()],
        ]);
        let result = call(Function::HLookup, &[scalar("q2"), table, scalar(2), scalar(false)]);
        assert_eq!(single(result), CellValue::Int(200));
    }

    #[test]
    fn test_index_and_match() {
        let result = call(Function::Index, &[price_table(), scalar(3), scalar(2)]);
        assert_eq!(single(result), CellValue::Float(3.0));
        let out_of_range = call(Function::Index, &[price_table(), scalar(4), scalar(1)]);
        assert_eq!(single(out_of_range), CellValue::Error(ErrorValue::Ref));

        let names = Value::Table(vec![vec!["apple".into(), "banana".into(), "cherry".into()]]);
        let found = call(Function::Match, &[scalar("cherry"), names.clone(), scalar(0)]);
        assert_eq!(single(found), CellValue::Int(3));
        let missing = call(Function::Match, &[scalar("kiwi"), names, scalar(0)]);
        assert_eq!(single(missing), CellValue::Error(ErrorValue::NA));

        let sorted = column(&[10.0, 20.0, 30.0]);
        let approx = call(Function::Match, &[scalar(25), sorted]);
        assert_eq!(single(approx), CellValue::Int(2));
    }

    #[test]
    fn test_text_functions() {
        let text = scalar("Spreadsheet");
        assert_eq!(single(call(Function::Left, &[text.clone()])), CellValue::from("S"));
        assert_eq!(single(call(Function::Left, &[text.clone(), scalar(6)])), CellValue::from("Spread"));
        assert_eq!(single(call(Function::Right, &[text.clone(), scalar(5)])), CellValue::from("sheet"));
        assert_eq!(single(call(Function::Right, &[text.clone(), scalar(50)])), CellValue::from("Spreadsheet"));
        assert_eq!(
            single(call(Function::Mid, &[text.clone(), scalar(3), scalar(4)])),
            CellValue::from("read")
        );
        assert_eq!(single(call(Function::Len, &[text.clone()])), CellValue::Int(11));
        assert_eq!(
            single(call(Function::Left, &[text, scalar(-1)])),
            CellValue::Error(ErrorValue::Value)
        );
        assert_eq!(
            single(call(Function::Concatenate, &[scalar("a"), scalar(1), scalar(true)])),
            CellValue::from("a1TRUE")
        );
    }

    fn ymd(y: i32, m: u32, d: u32) -> CellValue {
        midnight(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_date_rolls_over() {
        assert_eq!(single(call(Function::Date, &[scalar(2024), scalar(2), scalar(30)])), ymd(2024, 3, 1));
        assert_eq!(single(call(Function::Date, &[scalar(2023), scalar(13), scalar(1)])), ymd(2024, 1, 1));
        assert_eq!(single(call(Function::Date, &[scalar(2024), scalar(1), scalar(0)])), ymd(2023, 12, 31));
        assert_eq!(single(call(Function::Date, &[scalar(99), scalar(1), scalar(1)])), ymd(1999, 1, 1));
        assert_eq!(
            single(call(Function::Date, &[scalar(10000), scalar(1), scalar(1)])),
            CellValue::Error(ErrorValue::Num)
        );
    }

    #[test]
    fn test_edate_clamps_to_month_end() {
        let start = Value::Scalar(ymd(2024, 1, 31));
        assert_eq!(single(call(Function::EDate, &[start.clone(), scalar(1)])), ymd(2024, 2, 29));
        assert_eq!(single(call(Function::EDate, &[start, scalar(-2)])), ymd(2023, 11, 30));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(single(call(Function::Round, &[scalar(2.345), scalar(1)])), CellValue::Float(2.3));
        assert_eq!(single(call(Function::Round, &[scalar(-2.5), scalar(0)])), CellValue::Float(-3.0));
        assert_eq!(single(call(Function::RoundUp, &[scalar(1.21), scalar(1)])), CellValue::Float(1.3));
        assert_eq!(single(call(Function::RoundDown, &[scalar(-1.29), scalar(1)])), CellValue::Float(-1.2));
        assert_eq!(single(call(Function::Round, &[scalar(1234.0), scalar(-2)])), CellValue::Float(1200.0));
    }

    #[test]
    fn test_non_finite_and_huge_arguments_are_errors() {
        let text = scalar("Spreadsheet");
        assert_eq!(
            single(call(Function::Mid, &[text.clone(), scalar("NaN"), scalar(1)])),
            CellValue::Error(ErrorValue::Value)
        );
        assert_eq!(
            single(call(Function::Mid, &[text.clone(), scalar(f64::NAN), scalar(1)])),
            CellValue::Error(ErrorValue::Num)
        );
        assert_eq!(
            single(call(Function::Right, &[text, scalar(f64::INFINITY)])),
            CellValue::Error(ErrorValue::Num)
        );
        assert_eq!(
            single(call(Function::Date, &[scalar(2020), scalar(1), scalar(-1e19)])),
            CellValue::Error(ErrorValue::Num)
        );
        assert_eq!(
            single(call(Function::Date, &[scalar(2020), scalar(i64::MIN), scalar(1)])),
            CellValue::Error(ErrorValue::Num)
        );
        assert_eq!(
            single(call(Function::Date, &[scalar(2020), scalar(1), scalar(-2_000_000_000)])),
            CellValue::Error(ErrorValue::Num)
        );
        assert_eq!(
            single(call(Function::Index, &[price_table(), scalar(f64::NAN), scalar(1)])),
            CellValue::Error(ErrorValue::Num)
        );
        assert_eq!(
            single(call(Function::VLookup, &[scalar(2), price_table(), scalar(1e300)])),
            CellValue::Error(ErrorValue::Num)
        );
        assert_eq!(
            single(call(Function::EDate, &[Value::Scalar(ymd(2024, 1, 31)), scalar(-1e19)])),
            CellValue::Error(ErrorValue::Num)
        );
        assert_eq!(
            single(call(Function::Round, &[scalar(1.5), scalar(f64::NAN)])),
            CellValue::Error(ErrorValue::Num)
        );
    }

    #[test]
    fn test_today_is_a_date() {
        assert!(matches!(single(call(Function::Today, &[])), CellValue::Timestamp(_)));
    }
}
