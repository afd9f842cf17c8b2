use super::value::Value;
use super::EvalError;
use indexmap::IndexMap;
use recalc_formulas::{ColumnRef, RangeRef, SheetScope};
use recalc_primitives::CellValue;
use recalc_sheet::Table;

/// What a formula can see while it is evaluated: every sheet by name and
/// the owning sheet's rows. In chunked mode `current` is a slice of the
/// owning sheet rather than the whole table.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    tables: &'a IndexMap<String, Table>,
    sheet: &'a str,
    current: &'a Table,
}

impl<'a> EvalContext<'a> {
    pub fn new(tables: &'a IndexMap<String, Table>, sheet: &'a str, current: &'a Table) -> Self {
        Self {
            tables,
            sheet,
            current,
        }
    }

    /// Table a scope refers to.
    pub fn table(&self, scope: &SheetScope) -> Result<&'a Table, EvalError> {
        match scope {
            SheetScope::Current => Ok(self.current),
            SheetScope::Named(name) if name == self.sheet => Ok(self.current),
            SheetScope::Named(name) => self
                .tables
                .get(name)
                .ok_or_else(|| EvalError::UnknownSheet(name.clone())),
        }
    }

    fn sheet_name<'s>(&'s self, scope: &'s SheetScope) -> &'s str {
        match scope {
            SheetScope::Current => self.sheet,
            SheetScope::Named(name) => name,
        }
    }

    fn column_values(
        &self,
        table: &'a Table,
        scope: &SheetScope,
        index: usize,
        name: &str,
    ) -> Result<&'a [CellValue], EvalError> {
        table
            .column(name)
            .or_else(|| table.column_at(index).map(|(_, values)| values))
            .ok_or_else(|| EvalError::UnknownColumn {
                sheet: self.sheet_name(scope).to_string(),
                column: name.to_string(),
            })
    }

    /// Whole column as a [`Value::Column`].
    pub fn column(&self, column: &ColumnRef) -> Result<Value, EvalError> {
        let table = self.table(&column.scope)?;
        let values = self.column_values(table, &column.scope, column.index, &column.name)?;
        Ok(Value::Column(values.to_vec()))
    }

    /// Block of whole columns as a [`Value::Table`].
    pub fn range(&self, range: &RangeRef) -> Result<Value, EvalError> {
        let table = self.table(&range.scope)?;
        range
            .columns
            .iter()
            .zip(&range.names)
            .map(|(index, name)| {
                self.column_values(table, &range.scope, *index, name)
                    .map(<[CellValue]>::to_vec)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Table)
    }
}
