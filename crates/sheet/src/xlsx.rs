use crate::book::Workbook;
use crate::error::{Result, SheetError};
use crate::table::Table;
use crate::worksheet::Worksheet;
use calamine::{open_workbook, CellErrorType, Data, Range, Reader, Xlsx};
use indexmap::IndexMap;
use recalc_primitives::datetime::{datetime_to_serial, serial_to_datetime};
use recalc_primitives::{CellValue, ErrorValue};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, Worksheet as XlsxSheet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};

fn xlsx_error(err: impl std::fmt::Display) -> SheetError {
    SheetError::Xlsx(err.to_string())
}

/// Convert calamine Data to CellValue
fn data_to_cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Null,
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            serial_to_datetime(serial).map_or(CellValue::Float(serial), CellValue::Timestamp)
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Error(match e {
            CellErrorType::Div0 => ErrorValue::Div0,
            CellErrorType::NA => ErrorValue::NA,
            CellErrorType::Name => ErrorValue::Name,
            CellErrorType::Null => ErrorValue::Null,
            CellErrorType::Num => ErrorValue::Num,
            CellErrorType::Ref => ErrorValue::Ref,
            CellErrorType::Value | CellErrorType::GettingData => ErrorValue::Value,
        }),
    }
}

/// Read every sheet of an `.xlsx` file.
///
/// Row 1 holds the headers and every later row is data. Cached cell values
/// become the sheet data and formula text comes from the formula table.
/// Sheets with no used cells are skipped. The file handle is dropped
/// before returning, on success or failure.
pub fn read_workbook<P: AsRef<Path>>(path: P) -> Result<Workbook> {
    let path = path.as_ref();
    let mut excel: Xlsx<BufReader<File>> = open_workbook(path).map_err(xlsx_error)?;

    let sheet_names: Vec<String> = excel.sheet_names().iter().map(ToString::to_string).collect();
    let mut workbook = Workbook::new();
    for name in sheet_names {
        let values = excel.worksheet_range(&name).map_err(xlsx_error)?;
        let formulas = excel.worksheet_formula(&name).map_err(xlsx_error)?;
        match read_sheet(&name, &values, &formulas)? {
            Some(sheet) => {
                debug!(
                    sheet = %name,
                    rows = sheet.row_count(),
                    formulas = sheet.formulas().len(),
                    "read worksheet"
                );
                workbook.add_sheet(sheet)?;
            }
            None => warn!(sheet = %name, "skipping empty worksheet"),
        }
    }
    Ok(workbook)
}

/// Build one worksheet from absolute sheet coordinates, so that column
/// letters in formulas line up with header positions.
fn read_sheet(name: &str, values: &Range<Data>, formulas: &Range<String>) -> Result<Option<Worksheet>> {
    let Some((last_row, last_col)) = values.end() else {
        return Ok(None);
    };
    let last_col = formulas.end().map_or(last_col, |(_, col)| col.max(last_col));
    let last_row = formulas.end().map_or(last_row, |(row, _)| row.max(last_row));

    let headers: Vec<String> = (0..=last_col)
        .map(|col| match values.get_value((0, col)) {
            Some(Data::Empty) | None => format!("Column{}", col + 1),
            Some(data) => data_to_cell_value(data).to_string(),
        })
        .collect();

    let mut grid = Vec::new();
    let mut formula_grid = Vec::new();
    for row in 1..=last_row {
        grid.push(
            (0..=last_col)
                .map(|col| values.get_value((row, col)).map_or(CellValue::Null, data_to_cell_value))
                .collect(),
        );
        formula_grid.push(
            (0..=last_col)
                .map(|col| {
                    formulas
                        .get_value((row, col))
                        .filter(|text| !text.is_empty())
                        .map(|text| {
                            if text.starts_with('=') {
                                text.clone()
                            } else {
                                format!("={text}")
                            }
                        })
                })
                .collect(),
        );
    }

    Worksheet::from_grid(name, headers, grid, formula_grid).map(Some)
}

/// Sheet names of an `.xlsx` file, in workbook order.
pub fn sheet_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let excel: Xlsx<BufReader<File>> = open_workbook(path.as_ref()).map_err(xlsx_error)?;
    Ok(excel.sheet_names().iter().map(ToString::to_string).collect())
}

/// Write tables as one worksheet each, header row first.
pub fn write_workbook<P: AsRef<Path>>(path: P, tables: &IndexMap<String, Table>) -> Result<()> {
    let mut workbook = XlsxWorkbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    for (name, table) in tables {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name).map_err(xlsx_error)?;
        write_table(worksheet, table, &date_format)?;
    }

    workbook.save(path.as_ref()).map_err(xlsx_error)?;
    Ok(())
}

fn write_table(worksheet: &mut XlsxSheet, table: &Table, date_format: &Format) -> Result<()> {
    for (col_idx, (name, values)) in table.columns().enumerate() {
        let col = u16::try_from(col_idx).map_err(|_| xlsx_error("column index overflow"))?;
        worksheet.write_string(0, col, name).map_err(xlsx_error)?;

        for (row_idx, cell) in values.iter().enumerate() {
            let row = u32::try_from(row_idx + 1).map_err(|_| xlsx_error("row index overflow"))?;
            match cell {
                CellValue::Null => {}
                CellValue::Bool(b) => {
                    worksheet.write_boolean(row, col, *b).map_err(xlsx_error)?;
                }
                CellValue::Int(i) => {
                    worksheet.write_number(row, col, *i as f64).map_err(xlsx_error)?;
                }
                CellValue::Float(f) => {
                    worksheet.write_number(row, col, *f).map_err(xlsx_error)?;
                }
                CellValue::Text(s) => {
                    worksheet.write_string(row, col, s).map_err(xlsx_error)?;
                }
                CellValue::Timestamp(dt) => {
                    worksheet
                        .write_number_with_format(row, col, datetime_to_serial(*dt), date_format)
                        .map_err(xlsx_error)?;
                }
                CellValue::Error(e) => {
                    worksheet.write_string(row, col, e.label()).map_err(xlsx_error)?;
                }
            }
        }
    }
    Ok(())
}
