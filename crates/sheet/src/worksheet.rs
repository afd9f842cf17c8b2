use crate::error::{Result, SheetError};
use crate::table::Table;
use indexmap::{IndexMap, IndexSet};
use recalc_primitives::CellValue;

/// A named sheet: data, input columns and one formula per formula column.
///
/// A column is either an input or a formula column, never both, and a
/// formula column carries the same formula text in every data row.
#[derive(Debug, Clone, PartialEq)]
pub struct Worksheet {
    name: String,
    table: Table,
    input_columns: Vec<String>,
    formulas: IndexMap<String, String>,
}

impl Worksheet {
    /// Build from an existing table and its formula columns.
    pub fn new(name: impl Into<String>, table: Table, formulas: IndexMap<String, String>) -> Result<Self> {
        let name = name.into();
        if let Some(missing) = formulas.keys().find(|column| !table.has_column(column)) {
            return Err(SheetError::ColumnNotFound {
                sheet: name,
                name: missing.clone(),
            });
        }
        let input_columns = table
            .column_names()
            .into_iter()
            .filter(|column| !formulas.contains_key(*column))
            .map(str::to_string)
            .collect();
        Ok(Self {
            name,
            table,
            input_columns,
            formulas,
        })
    }

    /// Build from a header row and per-cell value / formula grids.
    ///
    /// `values[i]` and `formulas[i]` are data row `i` (spreadsheet row
    /// `i + 2`). Short rows are padded with nulls; missing formula rows
    /// mean "no formula". A column with a formula anywhere must carry the
    /// identical text in every data row.
    pub fn from_grid(
        name: impl Into<String>,
        headers: Vec<String>,
        values: Vec<Vec<CellValue>>,
        formulas: Vec<Vec<Option<String>>>,
    ) -> Result<Self> {
        let name = name.into();
        check_headers(&name, &headers)?;

        let width = headers.len();
        for (row, cells) in values.iter().enumerate() {
            if cells.len() > width {
                return Err(SheetError::RowWidthMismatch {
                    sheet: name,
                    row: row + 2,
                    expected: width,
                    actual: cells.len(),
                });
            }
        }

        let rows = values.len();
        let mut column_formulas = IndexMap::new();
        for (col, header) in headers.iter().enumerate() {
            let Some(first) = (0..rows).find_map(|row| formula_at(&formulas, row, col)) else {
                continue;
            };
            for row in 0..rows {
                let current = formula_at(&formulas, row, col);
                if current != Some(first) {
                    return Err(SheetError::InconsistentColumnFormula {
                        sheet: name,
                        column: header.clone(),
                        first: first.to_string(),
                        conflicting: current.unwrap_or("(no formula)").to_string(),
                        row: row + 2,
                    });
                }
            }
            column_formulas.insert(header.clone(), first.to_string());
        }

        let mut columns: Vec<Vec<CellValue>> = vec![Vec::with_capacity(rows); width];
        for mut cells in values {
            cells.resize(width, CellValue::Null);
            for (column, cell) in columns.iter_mut().zip(cells) {
                column.push(cell);
            }
        }
        let mut table = Table::new();
        for (header, column) in headers.into_iter().zip(columns) {
            table.push_column(header, column)?;
        }

        Self::new(name, table, column_formulas)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn input_columns(&self) -> &[String] {
        &self.input_columns
    }

    /// Formula column name to raw formula text, in column order.
    pub fn formulas(&self) -> &IndexMap<String, String> {
        &self.formulas
    }

    pub fn formula(&self, column: &str) -> Option<&str> {
        self.formulas.get(column).map(String::as_str)
    }

    pub fn is_formula_column(&self, column: &str) -> bool {
        self.formulas.contains_key(column)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.table.column_names().into_iter().map(str::to_string).collect()
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    /// Same sheet with its data replaced; used for recomputed output.
    #[must_use]
    pub fn with_table(&self, table: Table) -> Self {
        Self {
            name: self.name.clone(),
            table,
            input_columns: self.input_columns.clone(),
            formulas: self.formulas.clone(),
        }
    }
}

fn formula_at(formulas: &[Vec<Option<String>>], row: usize, col: usize) -> Option<&str> {
    formulas
        .get(row)
        .and_then(|cells| cells.get(col))
        .and_then(Option::as_deref)
        .filter(|text| !text.trim().is_empty())
}

fn check_headers(sheet: &str, headers: &[String]) -> Result<()> {
    let mut seen = IndexSet::new();
    for (index, header) in headers.iter().enumerate() {
        if header.trim().is_empty() {
            return Err(SheetError::EmptyColumnName {
                sheet: sheet.to_string(),
                index,
            });
        }
        if !seen.insert(header.as_str()) {
            return Err(SheetError::DuplicateColumnName {
                sheet: sheet.to_string(),
                name: header.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    fn formula(text: &str) -> Option<String> {
        Some(text.to_string())
    }

    #[test]
    fn test_from_grid_splits_inputs_and_formulas() {
        let sheet = Worksheet::from_grid(
            "Sheet1",
            headers(&["A", "B", "C"]),
            vec![
                vec![1.into(), 4.into(), CellValue::Null],
                vec![2.into(), 5.into(), CellValue::Null],
            ],
            vec![
                vec![None, None, formula("=A+B")],
                vec![None, None, formula("=A+B")],
            ],
        )
        .unwrap();
        assert_eq!(sheet.input_columns(), &["A".to_string(), "B".to_string()]);
        assert_eq!(sheet.formula("C"), Some("=A+B"));
        assert!(!sheet.is_formula_column("A"));
        assert_eq!(sheet.row_count(), 2);
    }

    #[test]
    fn test_inconsistent_formula_names_row() {
        let err = Worksheet::from_grid(
            "Sheet1",
            headers(&["A", "B"]),
            vec![vec![1.into()], vec![2.into()]],
            vec![vec![None, formula("=A*2")], vec![None, formula("=A*3")]],
        )
        .unwrap_err();
        match err {
            SheetError::InconsistentColumnFormula {
                sheet,
                column,
                first,
                conflicting,
                row,
            } => {
                assert_eq!(sheet, "Sheet1");
                assert_eq!(column, "B");
                assert_eq!(first, "=A*2");
                assert_eq!(conflicting, "=A*3");
                assert_eq!(row, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_partial_formula_column_is_inconsistent() {
        let err = Worksheet::from_grid(
            "S",
            headers(&["A", "B"]),
            vec![vec![1.into()], vec![2.into()]],
            vec![vec![None, formula("=A*2")]],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SheetError::InconsistentColumnFormula { row: 3, .. }
        ));
    }

    #[test]
    fn test_header_checks() {
        let dup = Worksheet::from_grid("S", headers(&["A", "A"]), vec![], vec![]).unwrap_err();
        assert!(matches!(dup, SheetError::DuplicateColumnName { .. }));
        let empty = Worksheet::from_grid("S", headers(&["A", " "]), vec![], vec![]).unwrap_err();
        assert!(matches!(empty, SheetError::EmptyColumnName { index: 1, .. }));
    }

    #[test]
    fn test_new_rejects_unknown_formula_column() {
        let table = Table::from_columns([("A", vec![CellValue::Int(1)])]).unwrap();
        let mut formulas = IndexMap::new();
        formulas.insert("Z".to_string(), "=A*2".to_string());
        assert!(matches!(
            Worksheet::new("S", table, formulas),
            Err(SheetError::ColumnNotFound { .. })
        ));
    }
}
